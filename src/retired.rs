//! Thread-local retirement lists.
//!
//! An unlinked node is not freed immediately: it is pushed onto the
//! retiring thread's local list together with a type-erased deleter. Once
//! the list grows past the scan threshold, the thread snapshots every
//! published hazard and frees the retirees nobody protects; survivors stay
//! on the list for the next scan.

use crate::slot::registry;

/// Type-erased deallocation function stored with each retired node.
pub(crate) type Deleter = unsafe fn(*mut u8);

/// A node awaiting reclamation.
pub(crate) struct Retired {
    pub(crate) ptr: *mut u8,
    pub(crate) drop_fn: Deleter,
}

// SAFETY: a retired node is unreachable from shared state; the raw pointer
// is only ever dereferenced by the deleter, once.
unsafe impl Send for Retired {}

/// Scan threshold floor. Small lists are not worth a full hazard snapshot.
const MIN_SCAN_THRESHOLD: usize = 8;

pub(crate) struct RetiredList {
    nodes: Vec<Retired>,
}

impl RetiredList {
    pub(crate) const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Appends a node and scans when the threshold is reached.
    pub(crate) fn retire(&mut self, ptr: *mut u8, drop_fn: Deleter) {
        self.nodes.push(Retired { ptr, drop_fn });
        if self.nodes.len() >= scan_threshold() {
            self.scan();
        }
    }

    /// Frees every retired node no hazard slot currently protects.
    ///
    /// Returns the number of nodes reclaimed.
    pub(crate) fn scan(&mut self) -> usize {
        registry().take_orphans(&mut self.nodes);
        if self.nodes.is_empty() {
            return 0;
        }

        let mut hazards = Vec::new();
        registry().snapshot_hazards(&mut hazards);

        let mut reclaimable = Vec::new();
        self.nodes.retain(|node| {
            if hazards.binary_search(&node.ptr).is_ok() {
                true
            } else {
                reclaimable.push(Retired {
                    ptr: node.ptr,
                    drop_fn: node.drop_fn,
                });
                false
            }
        });

        // Deleters run after the retain pass so a Drop impl may itself
        // retire further nodes.
        let freed = reclaimable.len();
        for node in reclaimable {
            // SAFETY: the node was retired (unreachable from shared state)
            // and no hazard slot protects its address.
            unsafe { (node.drop_fn)(node.ptr) };
        }
        freed
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Moves the remaining nodes out, for hand-off to the registry when
    /// the owning thread exits.
    pub(crate) fn take_all(&mut self) -> Vec<Retired> {
        std::mem::take(&mut self.nodes)
    }
}

/// Retire-list length that triggers a scan: twice the number of hazard
/// slots ever allocated, with a floor of [`MIN_SCAN_THRESHOLD`].
fn scan_threshold() -> usize {
    (2 * registry().slot_count()).max(MIN_SCAN_THRESHOLD)
}
