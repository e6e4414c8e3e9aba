//! # Questline - quest progress, region triggers, and timed prompts
//!
//! Questline is the scripting core of a game server plugin. It tracks each
//! player's progress through a tree of quests, runs scripted handlers when
//! players cross region boundaries (filtered by the quests they are on), and
//! manages short-lived "type /accept" prompts that expire on their own.
//!
//! ## Modules
//!
//! - [`quest`] - Quest tree, per-player status, and the active-quest index
//! - [`region`] - Region triggers and the region manager
//! - [`request`] - Expiring request queue and its timed set
//! - [`script`] - The API surface scripts use to drive everything above
//! - [`storage`] - Sled-backed record store for quest and region records
//! - [`host`] - Types and traits shared with the embedding host
//! - [`config`] - TOML configuration
//! - [`validation`] - Name validation
//! - [`metrics`] - Process-wide counters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use questline::config::Config;
//! use questline::host::PlayerId;
//! use questline::quest::QuestRegistry;
//! use questline::storage::DataStoreBuilder;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let store = Arc::new(DataStoreBuilder::new(&config.storage.data_dir).open()?);
//!     let registry = QuestRegistry::open(store, config.quests.clone())?;
//!
//!     let main = registry.create("main", "The Main Quest")?;
//!     let chapter = main.create_child("chapter1", "Chapter One")?;
//!
//!     let alice = PlayerId::from("alice");
//!     chapter.accept(&alice);
//!     assert_eq!(registry.active_quests(&alice).len(), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod host;
pub mod metrics;
pub mod quest;
pub mod region;
pub mod request;
pub mod script;
pub mod storage;
pub mod validation;
