//! Octree node keys and their two textual dialects

use std::fmt;

use crate::math::morton;

/// Textual encoding of node keys, fixed per dataset by its manifest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum KeyDialect {
    /// `D-X-Y-Z`: depth followed by cell coordinates
    #[default]
    Span,
    /// `0-o1-o2-...`: root followed by one octant digit per level
    Morton,
}

impl KeyDialect {
    /// Resolve a manifest dialect name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "span" | "dxyz" => Some(KeyDialect::Span),
            "morton" | "octant" => Some(KeyDialect::Morton),
            _ => None,
        }
    }

    /// Parse a key string in this dialect
    pub fn parse(self, text: &str) -> Option<NodeKey> {
        match self {
            KeyDialect::Span => {
                let mut parts = text.split('-').map(|p| p.parse::<u32>().ok());
                let depth = parts.next()??;
                let x = parts.next()??;
                let y = parts.next()??;
                let z = parts.next()??;
                if parts.next().is_some() {
                    return None;
                }
                NodeKey::new(depth, x, y, z)
            }
            KeyDialect::Morton => {
                let mut parts = text.split('-');
                if parts.next()? != "0" {
                    return None;
                }
                let octants = parts
                    .map(|p| p.parse::<u8>().ok())
                    .collect::<Option<Vec<_>>>()?;
                let (x, y, z) = morton::cell_from_octants(&octants)?;
                NodeKey::new(octants.len() as u32, x, y, z)
            }
        }
    }

    /// Format a key in this dialect
    pub fn format(self, key: NodeKey) -> String {
        match self {
            KeyDialect::Span => key.to_string(),
            KeyDialect::Morton => {
                let mut text = String::from("0");
                for octant in morton::octants_from_cell(key.depth, key.x, key.y, key.z) {
                    text.push('-');
                    text.push(char::from(b'0' + octant));
                }
                text
            }
        }
    }
}

/// Octree cell identity: depth plus cell coordinates at that depth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub depth: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl NodeKey {
    pub const ROOT: NodeKey = NodeKey { depth: 0, x: 0, y: 0, z: 0 };

    /// Create a key, rejecting coordinates outside the grid at `depth`
    pub fn new(depth: u32, x: u32, y: u32, z: u32) -> Option<Self> {
        if depth > morton::MAX_AXIS_BITS {
            return None;
        }
        let extent = 1u32 << depth;
        if x >= extent || y >= extent || z >= extent {
            return None;
        }
        Some(Self { depth, x, y, z })
    }

    pub fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Morton index of the cell within its level
    pub fn morton(&self) -> u64 {
        morton::interleave(self.x, self.y, self.z)
    }

    /// Bounds of this cell inside the dataset cube `[minx, miny, minz, maxx, maxy, maxz]`
    pub fn bounds(&self, root: [f64; 6]) -> [f64; 6] {
        let cells = (1u64 << self.depth) as f64;
        let mut out = [0.0; 6];
        for (axis, index) in [self.x, self.y, self.z].into_iter().enumerate() {
            let step = (root[axis + 3] - root[axis]) / cells;
            out[axis] = root[axis] + step * index as f64;
            out[axis + 3] = out[axis] + step;
        }
        out
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.depth, self.x, self.y, self.z)
    }
}
