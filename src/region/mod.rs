//! Region triggers.
//!
//! A region is a named cuboid in a host world. The host reports players
//! crossing its boundary; the [`RegionTrigger`] turns each crossing into
//! handler calls, choosing per-quest handlers from the player's active quests.

pub mod bounds;
pub mod manager;
pub mod trigger;

pub use bounds::{BlockPos, Bounds};
pub use manager::{RegionManager, REGIONS_PATH};
pub use trigger::{Crossing, DispatchOutcome, RegionEvent, RegionHandler, RegionTrigger};
