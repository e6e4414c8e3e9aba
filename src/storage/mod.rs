//! # Record Storage
//!
//! Sled-backed key-value persistence for quest and region records. Every record
//! is a [`DataNode`] addressed by a dotted path (`quests.main`, `regions.gate`).
//! Paths are case-insensitive and stored lowercase.
//!
//! ```rust,no_run
//! use questline::storage::DataStoreBuilder;
//!
//! # fn main() -> Result<(), questline::errors::QuestError> {
//! let store = DataStoreBuilder::new("data/questline").open()?;
//! let mut node = store.load("quests.main")?;
//! node.set("display", "The Main Quest");
//! store.save(&mut node)?;
//! assert_eq!(store.children("quests")?, vec!["main".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod node;

use std::path::{Path, PathBuf};

use log::debug;
use sled::IVec;

use crate::errors::QuestError;

pub use node::{DataNode, NODE_SCHEMA_VERSION};

const TREE_NODES: &str = "questline_nodes";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct DataStoreBuilder {
    path: PathBuf,
}

impl DataStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<DataStore, QuestError> {
        DataStore::open(self.path)
    }
}

/// Hierarchical record store.
pub struct DataStore {
    _db: sled::Db,
    nodes: sled::Tree,
}

impl DataStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QuestError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::Config::new().path(path_ref).open()?;
        let nodes = db.open_tree(TREE_NODES)?;
        debug!("Opened record store at {:?}", path_ref);
        Ok(Self { _db: db, nodes })
    }

    fn node_key(path: &str) -> Vec<u8> {
        path.to_ascii_lowercase().into_bytes()
    }

    fn serialize(node: &DataNode) -> Result<Vec<u8>, QuestError> {
        Ok(bincode::serialize(node)?)
    }

    fn deserialize(bytes: IVec) -> Result<DataNode, QuestError> {
        let node: DataNode = bincode::deserialize(&bytes)?;
        if node.schema_version != NODE_SCHEMA_VERSION {
            return Err(QuestError::SchemaMismatch {
                entity: "node",
                expected: NODE_SCHEMA_VERSION,
                found: node.schema_version,
            });
        }
        Ok(node)
    }

    /// Fetch the node stored at `path`, if any.
    pub fn get(&self, path: &str) -> Result<Option<DataNode>, QuestError> {
        match self.nodes.get(Self::node_key(path))? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    /// Load the node at `path`, returning an empty node when nothing is stored yet.
    pub fn load(&self, path: &str) -> Result<DataNode, QuestError> {
        Ok(self.get(path)?.unwrap_or_else(|| DataNode::new(path)))
    }

    pub fn exists(&self, path: &str) -> Result<bool, QuestError> {
        Ok(self.nodes.contains_key(Self::node_key(path))?)
    }

    /// Insert or replace a node and flush it to disk.
    pub fn save(&self, node: &mut DataNode) -> Result<(), QuestError> {
        node.schema_version = NODE_SCHEMA_VERSION;
        node.touch();
        let bytes = Self::serialize(node)?;
        self.nodes.insert(Self::node_key(&node.path), bytes)?;
        self.nodes.flush()?;
        Ok(())
    }

    /// Remove the node at `path` together with every node beneath it.
    ///
    /// Returns whether the node itself existed.
    pub fn remove(&self, path: &str) -> Result<bool, QuestError> {
        let key = Self::node_key(path);
        let existed = self.nodes.remove(&key)?.is_some();

        let mut prefix = key;
        prefix.push(b'.');
        let nested: Vec<IVec> = self
            .nodes
            .scan_prefix(&prefix)
            .keys()
            .collect::<Result<_, _>>()?;
        for nested_key in nested {
            self.nodes.remove(nested_key)?;
        }

        self.nodes.flush()?;
        Ok(existed)
    }

    /// Names of the nodes stored directly beneath `parent` (one level deep).
    pub fn children(&self, parent: &str) -> Result<Vec<String>, QuestError> {
        let mut prefix = Self::node_key(parent);
        prefix.push(b'.');

        let mut names = Vec::new();
        for key in self.nodes.scan_prefix(&prefix).keys() {
            let key = key?;
            let text = String::from_utf8_lossy(&key[prefix.len()..]).to_string();
            if !text.is_empty() && !text.contains('.') {
                names.push(text);
            }
        }
        Ok(names)
    }
}
