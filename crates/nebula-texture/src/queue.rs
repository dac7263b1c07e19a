//! Load batch tracking and the deferred paint queue.
//!
//! A [`BatchJoin`] completes once every image it is waiting on has arrived
//! (or failed). Paint calls made while any batch is open are parked in the
//! [`PaintQueue`] and replayed in call order after the last batch rebuilds
//! the atlas.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::expand::{ExpandedMaterial, MaterialSpec};
use crate::mesh::SharedMesh;

/// Handle of one `load`/`sprite` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub u64);

/// All-of combinator over the image fetches of one batch.
#[derive(Debug)]
pub(crate) struct BatchJoin {
    /// Resolved paths still in flight.
    pending: HashSet<String>,
    /// Materials the batch contributed to the registry.
    pub materials: Vec<ExpandedMaterial>,
    /// Set once `pending` is empty.
    settle_deadline: Option<Instant>,
}

impl BatchJoin {
    pub fn new(materials: Vec<ExpandedMaterial>) -> Self {
        Self {
            pending: HashSet::new(),
            materials,
            settle_deadline: None,
        }
    }

    /// Registers a fetch the batch must wait for.
    pub fn wait_for(&mut self, path: String) {
        self.pending.insert(path);
    }

    /// Marks a fetch as finished, successfully or not.
    pub fn complete(&mut self, path: &str) {
        self.pending.remove(path);
    }

    /// Returns `true` when no fetch is outstanding.
    pub fn is_joined(&self) -> bool {
        self.pending.is_empty()
    }

    /// Starts the settle window the first time the batch is seen joined.
    pub fn arm(&mut self, now: Instant, settle: Duration) {
        if self.is_joined() && self.settle_deadline.is_none() {
            self.settle_deadline = Some(now + settle);
        }
    }

    /// Returns `true` once the batch is joined and its settle window elapsed.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.settle_deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// A paint call captured while the atlas was loading.
pub struct PaintRequest {
    pub mesh: SharedMesh,
    pub spec: Option<MaterialSpec>,
}

/// FIFO of deferred paint calls.
#[derive(Default)]
pub struct PaintQueue {
    requests: VecDeque<PaintRequest>,
}

impl PaintQueue {
    pub fn push(&mut self, request: PaintRequest) {
        self.requests.push_back(request);
    }

    /// Removes and returns every queued request in call order.
    pub fn drain(&mut self) -> Vec<PaintRequest> {
        self.requests.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::QuadMesh;

    #[test]
    fn test_batch_joins_after_every_fetch() {
        let mut batch = BatchJoin::new(Vec::new());
        batch.wait_for("a.png".into());
        batch.wait_for("b.png".into());
        assert!(!batch.is_joined());

        batch.complete("a.png");
        assert!(!batch.is_joined());
        batch.complete("b.png");
        assert!(batch.is_joined());
    }

    #[test]
    fn test_settle_window_starts_when_joined() {
        let now = Instant::now();
        let mut batch = BatchJoin::new(Vec::new());
        batch.wait_for("a.png".into());

        batch.arm(now, Duration::from_millis(100));
        assert!(!batch.is_ready(now + Duration::from_secs(1)));

        batch.complete("a.png");
        batch.arm(now, Duration::from_millis(100));
        assert!(!batch.is_ready(now));
        assert!(batch.is_ready(now + Duration::from_millis(100)));
    }

    #[test]
    fn test_rearming_keeps_first_deadline() {
        let now = Instant::now();
        let mut batch = BatchJoin::new(Vec::new());
        batch.arm(now, Duration::ZERO);
        batch.arm(now + Duration::from_secs(10), Duration::from_secs(10));
        assert!(batch.is_ready(now));
    }

    #[test]
    fn test_paint_queue_is_fifo() {
        let mut queue = PaintQueue::default();
        for i in 0..3 {
            queue.push(PaintRequest {
                mesh: QuadMesh::voxel(i).into_shared(),
                spec: Some(MaterialSpec::Name(format!("t{i}"))),
            });
        }
        let drained = queue.drain();
        assert!(queue.is_empty());
        let names: Vec<_> = drained
            .iter()
            .map(|r| match &r.spec {
                Some(MaterialSpec::Name(n)) => n.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(names, ["t0", "t1", "t2"]);
    }
}
