//! Owner of all primary quests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use super::index::{ActiveQuestIndex, QuestPathSet};
use super::node::{Quest, QuestKind};
use crate::config::QuestsConfig;
use crate::errors::QuestError;
use crate::host::PlayerId;
use crate::storage::DataStore;
use crate::validation::{split_quest_path, validate_quest_name, PATH_SEPARATOR};

/// Parent path of every persisted primary quest record.
pub const QUESTS_PATH: &str = "quests";
/// Field of a quest record holding its display name.
pub const DISPLAY_KEY: &str = "display";

type QuestMap = HashMap<String, Arc<Quest>>;

/// Primary quests, split into the ones declared this session ("current") and
/// every durable record ("created").
///
/// Scripts re-declare their quest tree on reload, so `create` is idempotent
/// and [`clear_current`](Self::clear_current) only forgets the live set.
pub struct QuestRegistry {
    store: Arc<DataStore>,
    index: Arc<ActiveQuestIndex>,
    settings: QuestsConfig,
    current: RwLock<QuestMap>,
    created: RwLock<QuestMap>,
}

fn read(map: &RwLock<QuestMap>) -> RwLockReadGuard<'_, QuestMap> {
    map.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(map: &RwLock<QuestMap>) -> RwLockWriteGuard<'_, QuestMap> {
    map.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record_path(name: &str) -> String {
    format!("{}{}{}", QUESTS_PATH, PATH_SEPARATOR, name)
}

fn sorted(map: &QuestMap) -> Vec<Arc<Quest>> {
    let mut quests: Vec<Arc<Quest>> = map.values().cloned().collect();
    quests.sort_by(|a, b| a.name().cmp(b.name()));
    quests
}

impl QuestRegistry {
    /// Open the registry, re-hydrating the created set from stored records.
    pub fn open(store: Arc<DataStore>, settings: QuestsConfig) -> Result<Self, QuestError> {
        let index = Arc::new(ActiveQuestIndex::new());
        let mut created = QuestMap::new();

        for name in store.children(QUESTS_PATH)? {
            let name = match validate_quest_name(&name, settings.max_name_length) {
                Ok(name) => name,
                Err(e) => {
                    warn!("Skipping stored quest record '{}': {}", name, e);
                    continue;
                }
            };
            let node = store.load(&record_path(&name))?;
            let display = node.get_or(DISPLAY_KEY, &name).to_string();
            let quest = Quest::primary(
                name.clone(),
                display,
                settings.repeatable_by_default,
                settings.max_name_length,
                Arc::clone(&index),
            );
            created.insert(name, quest);
        }
        info!("Loaded {} stored quest record(s)", created.len());

        Ok(Self {
            store,
            index,
            settings,
            current: RwLock::new(QuestMap::new()),
            created: RwLock::new(created),
        })
    }

    /// Declare a primary quest.
    ///
    /// Returns the existing current quest unchanged if one has this name. A
    /// quest known only from its stored record is promoted back to current,
    /// keeping player progress, with its record updated to `display_name`.
    pub fn create(&self, name: &str, display_name: &str) -> Result<Arc<Quest>, QuestError> {
        let name = validate_quest_name(name, self.settings.max_name_length)?;
        if let Some(existing) = read(&self.current).get(&name) {
            return Ok(Arc::clone(existing));
        }

        let mut current = write(&self.current);
        if let Some(existing) = current.get(&name) {
            return Ok(Arc::clone(existing));
        }

        let mut created = write(&self.created);
        let quest = match created.get(&name) {
            Some(stored) => {
                stored.set_display_name(display_name);
                Arc::clone(stored)
            }
            None => Quest::primary(
                name.clone(),
                display_name,
                self.settings.repeatable_by_default,
                self.settings.max_name_length,
                Arc::clone(&self.index),
            ),
        };

        let mut node = self.store.load(&record_path(&name))?;
        node.set(DISPLAY_KEY, display_name);
        self.store.save(&mut node)?;

        created.insert(name.clone(), Arc::clone(&quest));
        current.insert(name.clone(), Arc::clone(&quest));
        info!("Created quest {} ({})", name, display_name);
        Ok(quest)
    }

    /// Remove a quest. Primary quests lose their stored record too; sub-quests
    /// are detached from their parent.
    pub fn dispose(&self, quest: &Quest) -> Result<bool, QuestError> {
        match quest.kind() {
            QuestKind::Primary => {
                let name = quest.name();
                self.store.remove(&record_path(name))?;
                let was_current = write(&self.current).remove(name).is_some();
                let was_created = write(&self.created).remove(name).is_some();
                self.index.forget_quest(quest.path());
                info!("Disposed quest {}", name);
                Ok(was_current || was_created)
            }
            QuestKind::Sub { parent } => match parent.upgrade() {
                Some(parent) => Ok(parent.remove_child(quest.name())),
                None => {
                    debug!("Sub-quest {} already detached", quest.path());
                    Ok(false)
                }
            },
        }
    }

    /// Look up a current quest by name or dotted path, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Arc<Quest>> {
        if !name.contains(PATH_SEPARATOR) {
            return read(&self.current)
                .get(&name.to_ascii_lowercase())
                .cloned();
        }

        let segments = split_quest_path(name)?;
        let (first, rest) = segments.split_first()?;
        let mut quest = read(&self.current).get(first).cloned()?;
        for segment in rest {
            quest = quest.child(segment)?;
        }
        Some(quest)
    }

    /// Quests declared this session, sorted by name.
    pub fn list(&self) -> Vec<Arc<Quest>> {
        sorted(&read(&self.current))
    }

    /// Every quest with a stored record, sorted by name.
    pub fn list_created(&self) -> Vec<Arc<Quest>> {
        sorted(&read(&self.created))
    }

    /// Quests (primary or sub) that `player` currently has in progress.
    pub fn active_quests(&self, player: &PlayerId) -> Vec<Arc<Quest>> {
        self.index
            .snapshot(player)
            .iter()
            .filter_map(|path| self.get(path))
            .collect()
    }

    /// Paths of the quests `player` currently has in progress.
    pub fn active_paths(&self, player: &PlayerId) -> QuestPathSet {
        self.index.snapshot(player)
    }

    /// Rename a quest, persisting the new name for primary quests.
    pub fn set_display_name(&self, quest: &Quest, display_name: &str) -> Result<(), QuestError> {
        quest.set_display_name(display_name);
        if quest.is_primary() {
            let mut node = self.store.load(&record_path(quest.name()))?;
            node.set(DISPLAY_KEY, display_name);
            self.store.save(&mut node)?;
        }
        Ok(())
    }

    /// Forget the live quest set ahead of a script reload. Stored records and
    /// player progress are kept.
    pub fn clear_current(&self) {
        let cleared = {
            let mut current = write(&self.current);
            let count = current.len();
            current.clear();
            count
        };
        debug!("Cleared {} current quest(s)", cleared);
    }

    pub fn index(&self) -> &Arc<ActiveQuestIndex> {
        &self.index
    }

    pub fn settings(&self) -> &QuestsConfig {
        &self.settings
    }
}
