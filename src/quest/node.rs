//! A single node in the quest tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use log::{debug, info};

use super::index::ActiveQuestIndex;
use super::status::{QuestStatus, StatusStore};
use crate::errors::QuestError;
use crate::host::PlayerId;
use crate::metrics;
use crate::validation::{validate_quest_name, PATH_SEPARATOR};

/// Where a quest sits in the hierarchy.
#[derive(Debug, Clone)]
pub enum QuestKind {
    /// Top-level quest owned by the registry.
    Primary,
    /// Nested quest owned by its parent.
    Sub { parent: Weak<Quest> },
}

/// Result of [`Quest::accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Started,
    AlreadyInProgress,
    /// Completed and not repeatable; nothing changed.
    AlreadyCompleted,
    /// Completed and repeatable; progress started over.
    Restarted,
}

impl AcceptOutcome {
    /// True when the player is now on the quest because of this call.
    pub fn started(&self) -> bool {
        matches!(self, AcceptOutcome::Started | AcceptOutcome::Restarted)
    }
}

pub struct Quest {
    name: String,
    path: String,
    display_name: RwLock<String>,
    kind: QuestKind,
    statuses: StatusStore,
    children: RwLock<HashMap<String, Arc<Quest>>>,
    repeatable: AtomicBool,
    max_name_length: usize,
    index: Arc<ActiveQuestIndex>,
}

impl fmt::Debug for Quest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Quest")
            .field("path", &self.path)
            .field("display_name", &self.display_name())
            .field("primary", &self.is_primary())
            .field("repeatable", &self.is_repeatable())
            .finish()
    }
}

impl Quest {
    pub(crate) fn primary(
        name: String,
        display_name: impl Into<String>,
        repeatable: bool,
        max_name_length: usize,
        index: Arc<ActiveQuestIndex>,
    ) -> Arc<Quest> {
        Arc::new(Quest {
            path: name.clone(),
            name,
            display_name: RwLock::new(display_name.into()),
            kind: QuestKind::Primary,
            statuses: StatusStore::new(),
            children: RwLock::new(HashMap::new()),
            repeatable: AtomicBool::new(repeatable),
            max_name_length,
            index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root, e.g. `main.chapter1`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn display_name(&self) -> String {
        self.display_name
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Change the display name in memory. Use
    /// [`QuestRegistry::set_display_name`](super::QuestRegistry::set_display_name)
    /// to also persist it for primary quests.
    pub fn set_display_name(&self, display_name: impl Into<String>) {
        *self
            .display_name
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = display_name.into();
    }

    pub fn kind(&self) -> &QuestKind {
        &self.kind
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.kind, QuestKind::Primary)
    }

    /// Parent quest, if this is a sub-quest whose parent is still alive.
    pub fn parent(&self) -> Option<Arc<Quest>> {
        match &self.kind {
            QuestKind::Primary => None,
            QuestKind::Sub { parent } => parent.upgrade(),
        }
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable.load(Ordering::Relaxed)
    }

    /// Allow players to take the quest again after completing it.
    pub fn set_repeatable(&self, repeatable: bool) {
        self.repeatable.store(repeatable, Ordering::Relaxed);
    }

    /// Status for `player`; never absent.
    pub fn status(&self, player: &PlayerId) -> QuestStatus {
        self.statuses.get(player)
    }

    pub fn is_in_progress(&self, player: &PlayerId) -> bool {
        self.status(player).is_in_progress()
    }

    pub fn has_completed(&self, player: &PlayerId) -> bool {
        self.status(player).is_completed()
    }

    /// Put `player` on this quest.
    pub fn accept(&self, player: &PlayerId) -> AcceptOutcome {
        let repeatable = self.is_repeatable();
        let outcome = self.statuses.update(player, |status| {
            let outcome = if status.is_completed() {
                if !repeatable {
                    return AcceptOutcome::AlreadyCompleted;
                }
                status.restart();
                AcceptOutcome::Restarted
            } else if status.start() {
                AcceptOutcome::Started
            } else {
                AcceptOutcome::AlreadyInProgress
            };
            self.index.insert(player, &self.path);
            outcome
        });

        if outcome.started() {
            metrics::inc_quests_accepted();
            debug!("{} accepted quest {} ({:?})", player, self.path, outcome);
        }
        outcome
    }

    /// Mark the quest completed for `player`. Returns false if it already was.
    pub fn finish(&self, player: &PlayerId) -> bool {
        let finished = self.statuses.update(player, |status| {
            if !status.complete() {
                return false;
            }
            self.index.remove(player, &self.path);
            true
        });

        if finished {
            metrics::inc_quests_finished();
            debug!("{} finished quest {}", player, self.path);
        }
        finished
    }

    /// Forget all progress `player` has made on this quest.
    pub fn reset(&self, player: &PlayerId) -> bool {
        self.statuses.remove_with(player, |removed| {
            self.index.remove(player, &self.path);
            removed.is_some()
        })
    }

    /// Create a sub-quest, or return the existing child of that name unchanged.
    pub fn create_child(
        self: &Arc<Self>,
        name: &str,
        display_name: impl Into<String>,
    ) -> Result<Arc<Quest>, QuestError> {
        let name = validate_quest_name(name, self.max_name_length)?;

        let mut children = self
            .children
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = children.get(&name) {
            return Ok(Arc::clone(existing));
        }

        let child = Arc::new(Quest {
            path: format!("{}{}{}", self.path, PATH_SEPARATOR, name),
            name: name.clone(),
            display_name: RwLock::new(display_name.into()),
            kind: QuestKind::Sub {
                parent: Arc::downgrade(self),
            },
            statuses: StatusStore::new(),
            children: RwLock::new(HashMap::new()),
            repeatable: AtomicBool::new(self.is_repeatable()),
            max_name_length: self.max_name_length,
            index: Arc::clone(&self.index),
        });
        children.insert(name, Arc::clone(&child));
        info!("Created sub-quest {}", child.path);
        Ok(child)
    }

    /// Case-insensitive child lookup.
    pub fn child(&self, name: &str) -> Option<Arc<Quest>> {
        self.children
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Detach a child (and its subtree). Returns whether it existed.
    pub fn remove_child(&self, name: &str) -> bool {
        let removed = self
            .children
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&name.to_ascii_lowercase());
        match removed {
            Some(child) => {
                self.index.forget_quest(child.path());
                info!("Removed sub-quest {}", child.path());
                true
            }
            None => false,
        }
    }

    /// Direct children sorted by name.
    pub fn children(&self) -> Vec<Arc<Quest>> {
        let mut children: Vec<Arc<Quest>> = self
            .children
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }
}
