//! Per-player quest status records.
//!
//! One [`QuestStatus`] exists per (quest, player) pair, created lazily in the
//! initial NotStarted/NotCompleted state the first time it is looked at.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::PlayerId;

/// Whether the player has taken the quest on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrentStatus {
    NotStarted,
    InProgress,
}

/// Whether the player has finished the quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionStatus {
    NotCompleted,
    Completed,
}

impl CurrentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrentStatus::NotStarted => "not_started",
            CurrentStatus::InProgress => "in_progress",
        }
    }
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::NotCompleted => "not_completed",
            CompletionStatus::Completed => "completed",
        }
    }
}

/// Status of one quest for one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestStatus {
    pub current: CurrentStatus,
    pub completion: CompletionStatus,
    /// When the quest was (last) started
    pub started_at: Option<DateTime<Utc>>,
    /// When the quest was completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for QuestStatus {
    fn default() -> Self {
        Self {
            current: CurrentStatus::NotStarted,
            completion: CompletionStatus::NotCompleted,
            started_at: None,
            completed_at: None,
        }
    }
}

impl QuestStatus {
    pub fn is_in_progress(&self) -> bool {
        self.current == CurrentStatus::InProgress && !self.is_completed()
    }

    pub fn is_completed(&self) -> bool {
        self.completion == CompletionStatus::Completed
    }

    /// Move to InProgress. Returns false if already started.
    pub fn start(&mut self) -> bool {
        if self.current == CurrentStatus::InProgress {
            return false;
        }
        self.current = CurrentStatus::InProgress;
        self.started_at = Some(Utc::now());
        true
    }

    /// Mark completed, starting first if the quest was never taken on so that
    /// completion is always preceded by progress. Returns false if already completed.
    pub fn complete(&mut self) -> bool {
        if self.is_completed() {
            return false;
        }
        self.start();
        self.completion = CompletionStatus::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Clear completion and begin again (repeatable quests only).
    pub fn restart(&mut self) {
        self.current = CurrentStatus::InProgress;
        self.completion = CompletionStatus::NotCompleted;
        self.started_at = Some(Utc::now());
        self.completed_at = None;
    }

    /// Duration in seconds between start and completion (or now).
    pub fn duration_secs(&self) -> Option<i64> {
        self.started_at.map(|start| {
            let end = self.completed_at.unwrap_or_else(Utc::now);
            (end - start).num_seconds()
        })
    }
}

/// Status records of every player for a single quest.
#[derive(Debug, Default)]
pub struct StatusStore {
    records: Mutex<HashMap<PlayerId, QuestStatus>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PlayerId, QuestStatus>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current status for `player`, materializing the initial record if needed.
    pub fn get(&self, player: &PlayerId) -> QuestStatus {
        *self.lock().entry(player.clone()).or_default()
    }

    /// Mutate the player's record while holding the store lock.
    ///
    /// Anything that must stay consistent with the record (such as the
    /// active-quest index) should be updated inside `f`.
    pub fn update<R>(&self, player: &PlayerId, f: impl FnOnce(&mut QuestStatus) -> R) -> R {
        let mut guard = self.lock();
        let status = guard.entry(player.clone()).or_default();
        f(status)
    }

    /// Remove the player's record while holding the store lock.
    pub fn remove_with<R>(&self, player: &PlayerId, f: impl FnOnce(Option<QuestStatus>) -> R) -> R {
        let mut guard = self.lock();
        let removed = guard.remove(player);
        f(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
