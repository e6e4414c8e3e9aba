//! Named regions, persisted under `regions.<name>`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use super::bounds::{BlockPos, Bounds};
use super::trigger::{DispatchOutcome, RegionTrigger};
use crate::errors::QuestError;
use crate::host::{EnterReason, LeaveReason, PlayerId};
use crate::quest::QuestRegistry;
use crate::storage::DataStore;
use crate::validation::{validate_region_name, PATH_SEPARATOR};

pub const REGIONS_PATH: &str = "regions";

type RegionMap = HashMap<String, Arc<RegionTrigger>>;

fn record_path(name: &str) -> String {
    format!("{}{}{}", REGIONS_PATH, PATH_SEPARATOR, name)
}

pub struct RegionManager {
    store: Arc<DataStore>,
    registry: Arc<QuestRegistry>,
    regions: RwLock<RegionMap>,
}

impl RegionManager {
    /// Open the manager, restoring every stored region with no handlers.
    pub fn open(store: Arc<DataStore>, registry: Arc<QuestRegistry>) -> Result<Self, QuestError> {
        let mut regions = RegionMap::new();
        for name in store.children(REGIONS_PATH)? {
            let node = store.load(&record_path(&name))?;
            match Bounds::read_from(&node) {
                Some(bounds) => {
                    let trigger = RegionTrigger::new(name.clone(), bounds, Arc::clone(&registry));
                    regions.insert(name, Arc::new(trigger));
                }
                None => warn!("Skipping region record '{}': malformed bounds", name),
            }
        }
        info!("Loaded {} stored region(s)", regions.len());

        Ok(Self {
            store,
            registry,
            regions: RwLock::new(regions),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, RegionMap> {
        self.regions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegionMap> {
        self.regions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Define a region. An existing region of the same name is returned unchanged.
    pub fn add(&self, name: &str, bounds: Bounds) -> Result<Arc<RegionTrigger>, QuestError> {
        let name = validate_region_name(name)?;
        let mut regions = self.write();
        if let Some(existing) = regions.get(&name) {
            return Ok(Arc::clone(existing));
        }

        let mut node = self.store.load(&record_path(&name))?;
        bounds.write_to(&mut node);
        self.store.save(&mut node)?;

        let trigger = Arc::new(RegionTrigger::new(
            name.clone(),
            bounds,
            Arc::clone(&self.registry),
        ));
        regions.insert(name.clone(), Arc::clone(&trigger));
        info!("Added region {}", name);
        Ok(trigger)
    }

    /// Define a cubic region around `anchor`.
    pub fn add_from_anchor(
        &self,
        name: &str,
        world: &str,
        anchor: BlockPos,
        diameter: u32,
    ) -> Result<Arc<RegionTrigger>, QuestError> {
        self.add(name, Bounds::from_anchor(world, anchor, diameter))
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegionTrigger>> {
        self.read().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Delete a region and its record. Returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool, QuestError> {
        let name = name.to_ascii_lowercase();
        self.store.remove(&record_path(&name))?;
        match self.write().remove(&name) {
            Some(trigger) => {
                trigger.clear_handlers();
                info!("Removed region {}", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All regions sorted by name.
    pub fn list(&self) -> Vec<Arc<RegionTrigger>> {
        let mut regions: Vec<Arc<RegionTrigger>> = self.read().values().cloned().collect();
        regions.sort_by(|a, b| a.name().cmp(b.name()));
        regions
    }

    /// Drop the handlers of every region, leaving the regions themselves in place.
    pub fn clear_all_handlers(&self) {
        for trigger in self.read().values() {
            trigger.clear_handlers();
        }
    }

    /// Forward a host enter event. `None` if the region is unknown.
    pub fn on_player_enter(
        &self,
        region: &str,
        player: &PlayerId,
        reason: EnterReason,
    ) -> anyhow::Result<Option<DispatchOutcome>> {
        match self.get(region) {
            Some(trigger) => Ok(Some(trigger.on_player_enter(player, reason)?)),
            None => Ok(None),
        }
    }

    /// Forward a host leave event. `None` if the region is unknown.
    pub fn on_player_leave(
        &self,
        region: &str,
        player: &PlayerId,
        reason: LeaveReason,
    ) -> anyhow::Result<Option<DispatchOutcome>> {
        match self.get(region) {
            Some(trigger) => Ok(Some(trigger.on_player_leave(player, reason)?)),
            None => Ok(None),
        }
    }
}
