use parking_lot::Mutex;

use crate::common::FrameId;

const NIL: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    prev: usize,
    next: usize,
    queued: bool,
}

impl Node {
    fn detached() -> Self {
        Self {
            prev: NIL,
            next: NIL,
            queued: false,
        }
    }
}

/// Queue of unpinned frames, most recently unpinned at the front. Frame ids
/// are bounded by the pool size, so the list links through a fixed node
/// array indexed by frame id, which doubles as the position index for O(1)
/// removal on pin.
struct LruState {
    nodes: Vec<Node>,
    head: usize,
    tail: usize,
    len: usize,
}

impl LruState {
    fn push_front(&mut self, idx: usize) {
        self.nodes[idx] = Node {
            prev: NIL,
            next: self.head,
            queued: true,
        };
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
        self.len += 1;
    }

    fn detach(&mut self, idx: usize) {
        let Node { prev, next, .. } = self.nodes[idx];
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
        self.nodes[idx] = Node::detached();
        self.len -= 1;
    }
}

/// LRU replacement policy over the set of unpinned frames.
///
/// A frame enters the queue when its pin count drops to zero and leaves it
/// when it is pinned again or chosen as the eviction victim. The victim is
/// always the least recently unpinned frame. There is no aging or frequency
/// tracking.
pub struct LruReplacer {
    state: Mutex<LruState>,
}

impl LruReplacer {
    /// Creates a replacer able to track `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                nodes: vec![Node::detached(); num_frames],
                head: NIL,
                tail: NIL,
                len: 0,
            }),
        }
    }

    /// Removes and returns the least recently unpinned frame.
    /// Returns None without changing any state when the queue is empty.
    pub fn victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.tail == NIL {
            return None;
        }
        let idx = state.tail;
        state.detach(idx);
        Some(FrameId::new(idx as u32))
    }

    /// Removes the frame from the queue; no-op if it is not queued.
    pub fn pin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let idx = frame_id.as_usize();
        if idx >= state.nodes.len() || !state.nodes[idx].queued {
            return;
        }
        state.detach(idx);
    }

    /// Queues the frame at the front; no-op if it is already queued.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let idx = frame_id.as_usize();
        if idx >= state.nodes.len() || state.nodes[idx].queued {
            return;
        }
        state.push_front(idx);
    }

    /// Number of frames currently eligible for eviction.
    pub fn size(&self) -> usize {
        self.state.lock().len
    }
}
