//! Test utilities & fixtures.
//! Builds a complete engine over a throwaway store.

use std::sync::Arc;
use std::time::Duration;

use questline::config::QuestsConfig;
use questline::quest::QuestRegistry;
use questline::region::RegionManager;
use questline::request::RequestQueue;
use questline::storage::{DataStore, DataStoreBuilder};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<DataStore>,
    pub registry: Arc<QuestRegistry>,
    pub regions: Arc<RegionManager>,
    pub requests: Arc<RequestQueue>,
}

pub fn fixture() -> Fixture {
    fixture_with(QuestsConfig::default())
}

#[allow(dead_code)] // not every test binary needs custom settings
pub fn fixture_with(settings: QuestsConfig) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(DataStoreBuilder::new(dir.path()).open().expect("store"));
    let registry = Arc::new(QuestRegistry::open(Arc::clone(&store), settings).expect("registry"));
    let regions = Arc::new(
        RegionManager::open(Arc::clone(&store), Arc::clone(&registry)).expect("regions"),
    );
    let requests = Arc::new(RequestQueue::with_limits(20, Duration::from_secs(30)));
    Fixture {
        dir,
        store,
        registry,
        regions,
        requests,
    }
}

/// Reopen the registry and regions over the same directory, as after a restart.
#[allow(dead_code)]
pub fn reopen(fixture: Fixture) -> Fixture {
    let Fixture {
        dir,
        store,
        registry,
        regions,
        requests,
    } = fixture;
    // every holder of the database must go before it can be opened again
    drop(requests);
    drop(regions);
    drop(registry);
    drop(store);
    let store = Arc::new(DataStoreBuilder::new(dir.path()).open().expect("reopen store"));
    let registry = Arc::new(
        QuestRegistry::open(Arc::clone(&store), QuestsConfig::default()).expect("registry"),
    );
    let regions = Arc::new(
        RegionManager::open(Arc::clone(&store), Arc::clone(&registry)).expect("regions"),
    );
    let requests = Arc::new(RequestQueue::with_limits(20, Duration::from_secs(30)));
    Fixture {
        dir,
        store,
        registry,
        regions,
        requests,
    }
}
