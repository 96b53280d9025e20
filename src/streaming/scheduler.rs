//! Tile scheduling: coarse-to-fine ordering and a bounded fetch/decode pool

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::core::{DeliveryOrder, Error, Result};
use crate::dataset::key::NodeKey;
use crate::decode::tile::DecodedTile;

/// One decoded tile handed to the consumer
#[derive(Debug)]
pub struct TileEvent {
    pub key: NodeKey,
    /// Position of the key in the schedule
    pub index: usize,
    /// Number of scheduled keys in the batch
    pub total: usize,
    pub tile: DecodedTile,
}

/// Per-batch bookkeeping
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub scheduled: usize,
    pub delivered: usize,
    /// Nodes whose payload held no decodable records
    pub empty: usize,
    /// Nodes whose fetch or decode failed
    pub failed: Vec<NodeKey>,
    /// Nodes whose payload was a storage placeholder
    pub placeholders: Vec<NodeKey>,
    /// Tasks that panicked
    pub lost: usize,
}

impl BatchReport {
    /// Every scheduled node accounted for
    pub fn attempted(&self) -> usize {
        self.delivered + self.empty + self.failed.len() + self.placeholders.len() + self.lost
    }
}

/// Order keys for progressive delivery: root first, then by depth and
/// Morton index. Duplicates are removed.
pub fn schedule(keys: impl IntoIterator<Item = NodeKey>) -> Vec<NodeKey> {
    let mut ordered: Vec<NodeKey> = keys.into_iter().collect();
    ordered.sort_unstable_by_key(|k| (k.depth, k.morton(), *k));
    ordered.dedup();
    if let Some(pos) = ordered.iter().position(NodeKey::is_root) {
        let root = ordered.remove(pos);
        ordered.insert(0, root);
    }
    ordered
}

/// Routes settled tasks to the consumer in the configured order
struct Delivery<C> {
    order: DeliveryOrder,
    total: usize,
    next: usize,
    settled: BTreeMap<usize, Option<(NodeKey, DecodedTile)>>,
    on_tile: C,
}

impl<C: FnMut(TileEvent)> Delivery<C> {
    fn new(order: DeliveryOrder, total: usize, on_tile: C) -> Self {
        Self { order, total, next: 0, settled: BTreeMap::new(), on_tile }
    }

    fn settle(&mut self, index: usize, key: NodeKey, outcome: Result<Option<DecodedTile>>, report: &mut BatchReport) {
        let tile = match outcome {
            Ok(Some(tile)) => Some(tile),
            Ok(None) => {
                log::debug!("Node {} has no decodable records", key);
                report.empty += 1;
                None
            }
            Err(Error::Integrity(name)) => {
                log::debug!("Node {} is a placeholder payload", name);
                report.placeholders.push(key);
                None
            }
            Err(e) => {
                if e.is_fatal() {
                    log::error!("Node {} failed with a dataset-level error: {}", key, e);
                } else {
                    log::warn!("Node {} skipped: {}", key, e);
                }
                report.failed.push(key);
                None
            }
        };
        self.advance(index, tile.map(|t| (key, t)), report);
    }

    /// Record a task that panicked
    fn lose(&mut self, index: usize, report: &mut BatchReport) {
        report.lost += 1;
        self.advance(index, None, report);
    }

    fn advance(&mut self, index: usize, entry: Option<(NodeKey, DecodedTile)>, report: &mut BatchReport) {
        match self.order {
            DeliveryOrder::Completion => {
                if let Some((key, tile)) = entry {
                    self.emit(index, key, tile, report);
                }
            }
            DeliveryOrder::Dispatch => {
                self.settled.insert(index, entry);
                while let Some(entry) = self.settled.remove(&self.next) {
                    if let Some((key, tile)) = entry {
                        self.emit(self.next, key, tile, report);
                    }
                    self.next += 1;
                }
            }
        }
    }

    /// Release anything still buffered
    fn finish(mut self, report: &mut BatchReport) {
        let remaining = std::mem::take(&mut self.settled);
        for (index, entry) in remaining {
            if let Some((key, tile)) = entry {
                self.emit(index, key, tile, report);
            }
        }
    }

    fn emit(&mut self, index: usize, key: NodeKey, tile: DecodedTile, report: &mut BatchReport) {
        report.delivered += 1;
        (self.on_tile)(TileEvent { key, index, total: self.total, tile });
    }
}

/// Fetch and decode every key with at most `concurrency` tasks in flight.
///
/// A leading root key is fetched and settled before any other task is
/// spawned. The remaining keys are spawned in schedule order as slots free
/// up. Per-node errors are logged and recorded in the report, never
/// propagated; each key is attempted exactly once.
pub async fn run<F, Fut, C>(
    keys: &[NodeKey],
    concurrency: usize,
    order: DeliveryOrder,
    fetch_decode: F,
    on_tile: C,
) -> BatchReport
where
    F: Fn(NodeKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<DecodedTile>>> + Send + 'static,
    C: FnMut(TileEvent),
{
    let total = keys.len();
    let concurrency = concurrency.max(1);
    let mut report = BatchReport { scheduled: total, ..Default::default() };
    let mut delivery = Delivery::new(order, total, on_tile);

    let fetch_decode = Arc::new(fetch_decode);
    let mut active_tasks = JoinSet::new();
    let mut pending = keys.iter().copied().enumerate().peekable();

    // A leading root runs alone; the pool opens once it has settled
    let mut slots = match pending.peek() {
        Some((_, key)) if key.is_root() => 1,
        _ => concurrency,
    };

    loop {
        while active_tasks.len() < slots {
            let Some((index, key)) = pending.next() else { break };
            let fetch_decode = Arc::clone(&fetch_decode);
            // The inner task isolates panics so the key stays known
            active_tasks.spawn(async move {
                let outcome = tokio::spawn(async move { fetch_decode(key).await }).await;
                (index, key, outcome)
            });
        }

        match active_tasks.join_next().await {
            Some(Ok((index, key, Ok(outcome)))) => delivery.settle(index, key, outcome, &mut report),
            Some(Ok((index, key, Err(e)))) => {
                log::error!("Tile task for node {} panicked: {}", key, e);
                delivery.lose(index, &mut report);
            }
            Some(Err(e)) => {
                log::error!("Tile task failed: {}", e);
                report.lost += 1;
            }
            None => break,
        }
        slots = concurrency;
    }

    delivery.finish(&mut report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Vec3;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn key(depth: u32, x: u32, y: u32, z: u32) -> NodeKey {
        NodeKey::new(depth, x, y, z).expect("valid key")
    }

    fn tile_for(key: NodeKey) -> DecodedTile {
        DecodedTile {
            positions: vec![Vec3::splat(key.depth as f32)],
            ..Default::default()
        }
    }

    fn decoded(key: NodeKey) -> Result<Option<DecodedTile>> {
        Ok(Some(tile_for(key)))
    }

    /// Every cell down to `depth`, in reverse order
    fn all_keys(depth: u32) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        for d in 0..=depth {
            let n = 1 << d;
            for x in 0..n {
                for y in 0..n {
                    for z in 0..n {
                        keys.push(key(d, x, y, z));
                    }
                }
            }
        }
        keys.reverse();
        keys
    }

    #[test]
    fn test_schedule_order() {
        let ordered = schedule(all_keys(3));

        assert_eq!(ordered.len(), 1 + 8 + 64 + 512);
        assert_eq!(ordered[0], NodeKey::ROOT);
        for pair in ordered.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.depth <= b.depth, "{a} before {b}");
            if a.depth == b.depth {
                assert!(a.morton() < b.morton(), "{a} before {b}");
            }
        }
    }

    #[test]
    fn test_schedule_without_root_and_duplicates() {
        let ordered = schedule(vec![key(2, 3, 3, 3), key(1, 1, 0, 0), key(1, 0, 0, 0), key(1, 1, 0, 0)]);
        assert_eq!(ordered, vec![key(1, 0, 0, 0), key(1, 1, 0, 0), key(2, 3, 3, 3)]);
        assert!(schedule(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_root_delivered_before_pool_starts() {
        let keys = schedule(all_keys(1));
        let root_done = Arc::new(AtomicBool::new(false));
        let early_start = Arc::new(AtomicBool::new(false));

        let (done, early) = (Arc::clone(&root_done), Arc::clone(&early_start));
        let fetch = move |k: NodeKey| {
            let (done, early) = (Arc::clone(&done), Arc::clone(&early));
            async move {
                if k.is_root() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    done.store(true, Ordering::SeqCst);
                } else if !done.load(Ordering::SeqCst) {
                    early.store(true, Ordering::SeqCst);
                }
                decoded(k)
            }
        };

        let mut seen = Vec::new();
        let report = run(&keys, 4, DeliveryOrder::Completion, fetch, |e| seen.push(e.key)).await;

        assert!(!early_start.load(Ordering::SeqCst));
        assert_eq!(seen[0], NodeKey::ROOT);
        assert_eq!(seen.len(), 9);
        assert_eq!(report.delivered, 9);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let keys = schedule(all_keys(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (flight, top) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let fetch = move |k: NodeKey| {
            let (flight, top) = (Arc::clone(&flight), Arc::clone(&top));
            async move {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                top.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                flight.fetch_sub(1, Ordering::SeqCst);
                decoded(k)
            }
        };

        let report = run(&keys, 3, DeliveryOrder::Completion, fetch, |_| {}).await;

        assert_eq!(report.delivered, keys.len());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_batch() {
        let keys = schedule(all_keys(1));
        let fetch = |k: NodeKey| async move {
            match k.x + k.y + k.z {
                1 => Err(Error::Decode { key: k.to_string(), reason: "corrupt".into() }),
                2 => Ok(None),
                3 => Err(Error::Integrity(k.to_string())),
                _ => decoded(k),
            }
        };

        let mut totals = Vec::new();
        let report = run(&keys, 2, DeliveryOrder::Completion, fetch, |e| totals.push(e.total)).await;

        // root and (0,0,0) at depth 1
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed.len(), 3);
        assert_eq!(report.empty, 3);
        assert_eq!(report.placeholders, vec![key(1, 1, 1, 1)]);
        assert_eq!(report.attempted(), keys.len());
        assert!(totals.iter().all(|&t| t == 9));
    }

    #[tokio::test]
    async fn test_each_key_attempted_once() {
        let keys = schedule(all_keys(2));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&calls);
        let fetch = move |k: NodeKey| {
            log.lock().unwrap().push(k);
            async move { Err::<Option<DecodedTile>, _>(Error::Decode { key: k.to_string(), reason: "always".into() }) }
        };

        let report = run(&keys, 4, DeliveryOrder::Completion, fetch, |_| {}).await;

        let mut attempted = calls.lock().unwrap().clone();
        attempted.sort();
        let mut expected = keys.clone();
        expected.sort();
        assert_eq!(attempted, expected);
        assert_eq!(report.failed.len(), keys.len());
    }

    #[tokio::test]
    async fn test_dispatch_order_delivery() {
        let keys = schedule(all_keys(1));
        // Later keys finish first
        let fetch = |k: NodeKey| async move {
            let delay = 20 - (k.morton() as u64) * 2;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if k == NodeKey::new(1, 1, 0, 0).expect("valid key") {
                return Ok(None);
            }
            decoded(k)
        };

        let mut seen = Vec::new();
        run(&keys, 8, DeliveryOrder::Dispatch, fetch, |e| seen.push(e.index)).await;

        assert_eq!(seen, vec![0, 1, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_panicking_nodes_are_counted_as_lost() {
        let keys = schedule(all_keys(1));
        let fetch = |k: NodeKey| async move {
            if k.is_root() || k == NodeKey::new(1, 1, 1, 1).expect("valid key") {
                panic!("decoder crashed on {k}");
            }
            decoded(k)
        };

        let mut seen = Vec::new();
        let report = run(&keys, 3, DeliveryOrder::Dispatch, fetch, |e| seen.push(e.index)).await;

        assert_eq!(report.lost, 2);
        assert_eq!(report.delivered, 7);
        assert_eq!(report.attempted(), keys.len());
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = run(&[], 4, DeliveryOrder::Completion, |k: NodeKey| async move { decoded(k) }, |_| {}).await;
        assert_eq!(report, BatchReport::default());
    }
}
