//! Page replacement policies for the buffer pool.

use std::collections::{BTreeMap, HashMap};

use super::frame::FrameId;

/// Chooses which unpinned frame the pool reuses next.
///
/// The pool reports pin count transitions: `unpin` when a frame's count
/// drops to zero, `pin` when it rises from zero, `remove` when the page in
/// an evictable frame is freed. A frame is never reported twice in a row.
pub trait Replacer: Send + Sync {
    /// Makes a frame evictable.
    fn unpin(&mut self, frame_id: FrameId);

    /// Withdraws a frame from eviction.
    fn pin(&mut self, frame_id: FrameId);

    /// Forgets an evictable frame whose page was dropped from the pool.
    fn remove(&mut self, frame_id: FrameId) {
        self.pin(frame_id);
    }

    /// Picks and withdraws a victim, or `None` if every frame is pinned.
    fn evict(&mut self) -> Option<FrameId>;

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;
}

/// Least-recently-unpinned replacement.
///
/// Each unpin stamps the frame with a logical clock; eviction takes the
/// oldest stamp. Pinning and removal are `O(log n)`.
pub struct LruReplacer {
    /// Unpin stamp -> frame, oldest first.
    order: BTreeMap<u64, FrameId>,
    /// Frame -> its stamp in `order`.
    stamps: HashMap<FrameId, u64>,
    clock: u64,
}

impl LruReplacer {
    /// Creates an empty replacer sized for `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            order: BTreeMap::new(),
            stamps: HashMap::with_capacity(capacity),
            clock: 0,
        }
    }
}

impl Replacer for LruReplacer {
    fn unpin(&mut self, frame_id: FrameId) {
        let stamp = self.clock;
        self.clock += 1;
        let previous = self.stamps.insert(frame_id, stamp);
        debug_assert!(previous.is_none(), "frame {frame_id} unpinned twice");
        if let Some(previous) = previous {
            self.order.remove(&previous);
        }
        self.order.insert(stamp, frame_id);
    }

    fn pin(&mut self, frame_id: FrameId) {
        let stamp = self.stamps.remove(&frame_id);
        debug_assert!(stamp.is_some(), "frame {frame_id} pinned while not evictable");
        if let Some(stamp) = stamp {
            self.order.remove(&stamp);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let (_, frame_id) = self.order.pop_first()?;
        self.stamps.remove(&frame_id);
        Some(frame_id)
    }

    fn size(&self) -> usize {
        self.order.len()
    }
}
