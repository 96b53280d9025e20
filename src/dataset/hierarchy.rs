//! Hierarchy discovery: merging fragment files into the set of octree nodes
//!
//! A fragment is a JSON object mapping key strings to point counts. A count
//! of `-1` means the node's subtree lives in its own fragment file, named
//! after the node key.

use std::collections::{HashMap, HashSet};

use crate::core::{Error, Result};
use crate::dataset::key::{KeyDialect, NodeKey};
use crate::dataset::manifest::Manifest;
use crate::streaming::source::ByteSource;

/// Fragment value meaning "expand via nested fragment"
pub const EXPAND_SENTINEL: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HierarchyEntry {
    /// Node holds this many points
    Points(u64),
    /// Node's subtree is described by a nested fragment
    Expand,
}

/// Parse a fragment into (key, entry) pairs.
///
/// Keys that do not parse in `dialect` and negative counts other than the
/// sentinel are skipped.
pub fn parse_fragment(bytes: &[u8], dialect: KeyDialect) -> Result<Vec<(NodeKey, HierarchyEntry)>> {
    let raw: HashMap<String, i64> = serde_json::from_slice(bytes)?;
    let mut entries = Vec::with_capacity(raw.len());
    for (name, count) in raw {
        let Some(key) = dialect.parse(&name) else {
            log::warn!("Skipping unparsable hierarchy key {:?}", name);
            continue;
        };
        let entry = match count {
            EXPAND_SENTINEL => HierarchyEntry::Expand,
            n if n >= 0 => HierarchyEntry::Points(n as u64),
            n => {
                log::warn!("Skipping hierarchy key {} with invalid count {}", name, n);
                continue;
            }
        };
        entries.push((key, entry));
    }
    Ok(entries)
}

/// Accumulated hierarchy of one dataset
#[derive(Clone, Debug, Default)]
pub struct NodeKeySet {
    entries: HashMap<NodeKey, HierarchyEntry>,
    fetched: Vec<NodeKey>,
}

impl NodeKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one entry. A concrete count replaces an earlier sentinel, never
    /// the other way round.
    pub fn merge(&mut self, key: NodeKey, entry: HierarchyEntry) {
        match entry {
            HierarchyEntry::Points(_) => {
                self.entries.insert(key, entry);
            }
            HierarchyEntry::Expand => {
                self.entries.entry(key).or_insert(entry);
            }
        }
    }

    pub fn get(&self, key: &NodeKey) -> Option<HierarchyEntry> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, HierarchyEntry)> + '_ {
        self.entries.iter().map(|(k, e)| (*k, *e))
    }

    /// Keys whose fragments were fetched, in fetch order
    pub fn fragments_fetched(&self) -> &[NodeKey] {
        &self.fetched
    }

    /// Keys worth fetching point data for: every key except non-root nodes
    /// known to be empty
    pub fn data_keys(&self) -> Vec<NodeKey> {
        self.iter()
            .filter(|(key, entry)| key.is_root() || *entry != HierarchyEntry::Points(0))
            .map(|(key, _)| key)
            .collect()
    }

    /// Sum of known point counts
    pub fn point_count(&self) -> u64 {
        self.entries
            .values()
            .map(|e| match e {
                HierarchyEntry::Points(n) => *n,
                HierarchyEntry::Expand => 0,
            })
            .sum()
    }
}

/// Walk the hierarchy from `root`, fetching each fragment at most once and
/// never descending below `max_depth`.
///
/// Fragment fetch or parse failures are logged and treated as empty
/// fragments; discovery itself never fails. The root key is always present
/// in the result and no returned key is deeper than `max_depth`.
pub async fn discover<S: ByteSource>(root: NodeKey, manifest: &Manifest, source: &S, max_depth: u32) -> NodeKeySet {
    let mut keys = NodeKeySet::new();
    let mut visited: HashSet<NodeKey> = HashSet::new();
    let mut worklist = vec![root];

    while let Some(key) = worklist.pop() {
        if key.depth > max_depth || !visited.insert(key) {
            continue;
        }
        keys.fetched.push(key);

        let entries = match fetch_fragment(manifest, source, key).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Hierarchy fragment {} unavailable, treating as empty: {}", manifest.key_name(key), e);
                continue;
            }
        };
        log::debug!("Fragment {}: {} entries", manifest.key_name(key), entries.len());

        for (child, entry) in entries {
            keys.merge(child, entry);
            if entry == HierarchyEntry::Expand && child.depth <= max_depth && !visited.contains(&child) {
                worklist.push(child);
            }
        }
    }

    keys.entries.retain(|key, _| key.depth <= max_depth);
    keys.entries.entry(root).or_insert(HierarchyEntry::Points(0));

    log::info!(
        "Discovered {} nodes ({} points) from {} fragments, max depth {}",
        keys.len(),
        keys.point_count(),
        keys.fetched.len(),
        max_depth
    );
    keys
}

async fn fetch_fragment<S: ByteSource>(
    manifest: &Manifest,
    source: &S,
    key: NodeKey,
) -> Result<Vec<(NodeKey, HierarchyEntry)>> {
    let bytes = source.fetch(&manifest.hierarchy_path(key)).await.map_err(|source| Error::Fetch {
        key: manifest.key_name(key),
        source,
    })?;
    parse_fragment(&bytes, manifest.dialect)
}
