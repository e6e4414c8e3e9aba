//! Quest hierarchy and per-player progress.
//!
//! Primary quests live in the [`QuestRegistry`]; each may own a tree of
//! sub-quests addressed by dotted paths (`main.chapter1`). Progress is tracked
//! per player as a [`QuestStatus`], and the [`ActiveQuestIndex`] answers
//! "which quests is this player on" for region triggers.

pub mod index;
pub mod node;
pub mod registry;
pub mod status;

pub use index::{ActiveQuestIndex, QuestPathSet};
pub use node::{AcceptOutcome, Quest, QuestKind};
pub use registry::{QuestRegistry, DISPLAY_KEY, QUESTS_PATH};
pub use status::{CompletionStatus, CurrentStatus, QuestStatus, StatusStore};
