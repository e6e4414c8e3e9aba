use serde::{Deserialize, Serialize};

use crate::storage::DataNode;

/// Block position in a host world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
        )
    }
}

/// Cuboid a region covers. Containment checks belong to the host; this only
/// records the corners so they can be persisted and handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub world: String,
    pub min: BlockPos,
    pub max: BlockPos,
}

impl Bounds {
    /// Bounds spanning two arbitrary corners.
    pub fn new(world: impl Into<String>, a: BlockPos, b: BlockPos) -> Self {
        Self {
            world: world.into(),
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Cube extending `diameter` blocks from `anchor` along every axis.
    pub fn from_anchor(world: impl Into<String>, anchor: BlockPos, diameter: u32) -> Self {
        let d = i32::try_from(diameter).unwrap_or(i32::MAX);
        Self::new(world, anchor.offset(d, d, d), anchor.offset(-d, -d, -d))
    }

    pub(crate) fn write_to(&self, node: &mut DataNode) {
        node.set("world", self.world.as_str());
        node.set("x1", self.min.x.to_string());
        node.set("y1", self.min.y.to_string());
        node.set("z1", self.min.z.to_string());
        node.set("x2", self.max.x.to_string());
        node.set("y2", self.max.y.to_string());
        node.set("z2", self.max.z.to_string());
    }

    /// Read bounds back from a region record; `None` if any field is missing or malformed.
    pub(crate) fn read_from(node: &DataNode) -> Option<Self> {
        let coord = |key: &str| node.get(key)?.parse::<i32>().ok();
        let min = BlockPos::new(coord("x1")?, coord("y1")?, coord("z1")?);
        let max = BlockPos::new(coord("x2")?, coord("y2")?, coord("z2")?);
        Some(Self::new(node.get("world")?, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let bounds = Bounds::new("world", BlockPos::new(10, 0, -5), BlockPos::new(-2, 64, 3));
        assert_eq!(bounds.min, BlockPos::new(-2, 0, -5));
        assert_eq!(bounds.max, BlockPos::new(10, 64, 3));
    }

    #[test]
    fn from_anchor_spans_both_directions() {
        let bounds = Bounds::from_anchor("world", BlockPos::new(100, 64, 100), 5);
        assert_eq!(bounds.min, BlockPos::new(95, 59, 95));
        assert_eq!(bounds.max, BlockPos::new(105, 69, 105));
    }

    #[test]
    fn node_round_trip_and_malformed_record() {
        let bounds = Bounds::from_anchor("nether", BlockPos::new(0, 0, 0), 3);
        let mut node = DataNode::new("regions.gate");
        bounds.write_to(&mut node);
        assert_eq!(Bounds::read_from(&node), Some(bounds));

        node.set("y2", "not-a-number");
        assert_eq!(Bounds::read_from(&node), None);
    }
}
