//! Index of which quests each player currently has in progress.
//!
//! Written by [`Quest::accept`](super::Quest::accept) and
//! [`Quest::finish`](super::Quest::finish), read by region triggers on every
//! boundary crossing. Each player's set lives behind an `Arc` and is replaced
//! copy-on-write, so a reader holding a snapshot never observes a half-applied
//! update.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::host::PlayerId;
use crate::validation::PATH_SEPARATOR;

pub type QuestPathSet = Arc<BTreeSet<String>>;

#[derive(Debug, Default)]
pub struct ActiveQuestIndex {
    players: RwLock<HashMap<PlayerId, QuestPathSet>>,
}

impl ActiveQuestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PlayerId, QuestPathSet>> {
        self.players
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PlayerId, QuestPathSet>> {
        self.players
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that `player` is on the quest at `path`. Returns false if already recorded.
    pub fn insert(&self, player: &PlayerId, path: &str) -> bool {
        let mut players = self.write();
        let set = players.entry(player.clone()).or_default();
        if set.contains(path) {
            return false;
        }
        Arc::make_mut(set).insert(path.to_string())
    }

    /// Forget that `player` is on the quest at `path`.
    pub fn remove(&self, player: &PlayerId, path: &str) -> bool {
        let mut players = self.write();
        let Some(set) = players.get_mut(player) else {
            return false;
        };
        if !set.contains(path) {
            return false;
        }
        Arc::make_mut(set).remove(path);
        if set.is_empty() {
            players.remove(player);
        }
        true
    }

    /// Immutable snapshot of the quest paths `player` is currently on.
    pub fn snapshot(&self, player: &PlayerId) -> QuestPathSet {
        self.read().get(player).cloned().unwrap_or_default()
    }

    pub fn contains(&self, player: &PlayerId, path: &str) -> bool {
        self.read()
            .get(player)
            .map(|set| set.contains(path))
            .unwrap_or(false)
    }

    /// Drop the quest at `path` and every sub-quest beneath it for all players.
    pub fn forget_quest(&self, path: &str) -> usize {
        let nested_prefix = format!("{}{}", path, PATH_SEPARATOR);
        let is_affected = |p: &String| p == path || p.starts_with(&nested_prefix);

        let mut players = self.write();
        let mut removed = 0;
        for set in players.values_mut() {
            if set.iter().any(is_affected) {
                let set = Arc::make_mut(set);
                let before = set.len();
                set.retain(|p| !is_affected(p));
                removed += before - set.len();
            }
        }
        players.retain(|_, set| !set.is_empty());
        removed
    }

    /// Number of players with at least one quest in progress.
    pub fn player_count(&self) -> usize {
        self.read().len()
    }
}
