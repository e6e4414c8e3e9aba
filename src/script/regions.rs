//! Region handler registration for scripts, by region name.

use std::sync::Arc;

use log::warn;

use crate::region::{RegionEvent, RegionManager, RegionTrigger};

pub struct RegionsApi {
    regions: Arc<RegionManager>,
}

impl RegionsApi {
    pub fn new(regions: Arc<RegionManager>) -> Self {
        Self { regions }
    }

    fn region(&self, name: &str) -> Option<Arc<RegionTrigger>> {
        let region = self.regions.get(name);
        if region.is_none() {
            warn!("Script referenced unknown region '{}'", name);
        }
        region
    }

    /// Run `handler` whenever a player enters `region`. False if the region is unknown.
    pub fn on_enter<F>(&self, region: &str, handler: F) -> bool
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        match self.region(region) {
            Some(trigger) => {
                trigger.add_global_enter(handler);
                true
            }
            None => false,
        }
    }

    pub fn on_leave<F>(&self, region: &str, handler: F) -> bool
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        match self.region(region) {
            Some(trigger) => {
                trigger.add_global_leave(handler);
                true
            }
            None => false,
        }
    }

    /// Run `handler` when a player on `quest` enters `region`. False if either is unknown.
    pub fn on_quest_enter<F>(&self, region: &str, quest: &str, handler: F) -> bool
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.region(region)
            .map(|trigger| trigger.add_quest_enter(quest, handler))
            .unwrap_or(false)
    }

    pub fn on_quest_leave<F>(&self, region: &str, quest: &str, handler: F) -> bool
    where
        F: Fn(&RegionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.region(region)
            .map(|trigger| trigger.add_quest_leave(quest, handler))
            .unwrap_or(false)
    }

    /// Drop every handler scripts registered, as when scripts are reloaded.
    pub fn reset(&self) {
        self.regions.clear_all_handlers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuestsConfig;
    use crate::host::{EnterReason, PlayerId};
    use crate::quest::QuestRegistry;
    use crate::region::BlockPos;
    use crate::storage::DataStoreBuilder;
    use tempfile::TempDir;

    #[test]
    fn registration_by_name() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DataStoreBuilder::new(dir.path()).open().unwrap());
        let registry =
            Arc::new(QuestRegistry::open(Arc::clone(&store), QuestsConfig::default()).unwrap());
        let manager = Arc::new(RegionManager::open(store, Arc::clone(&registry)).unwrap());
        manager
            .add_from_anchor("gate", "world", BlockPos::new(0, 0, 0), 2)
            .unwrap();
        registry.create("main", "Main").unwrap();
        let api = RegionsApi::new(Arc::clone(&manager));

        assert!(api.on_enter("gate", |_| Ok(())));
        assert!(!api.on_enter("nowhere", |_| Ok(())));
        assert!(api.on_quest_enter("gate", "main", |_| Ok(())));
        assert!(!api.on_quest_enter("gate", "missing", |_| Ok(())));

        let alice = PlayerId::from("alice");
        registry.get("main").unwrap().accept(&alice);
        let outcome = manager
            .on_player_enter("gate", &alice, EnterReason::Move)
            .unwrap()
            .expect("known region");
        assert_eq!(outcome.globals_fired, 1);
        assert_eq!(outcome.quest_handler.as_deref(), Some("main"));

        api.reset();
        assert!(!manager.get("gate").unwrap().is_listening());
    }
}
