//! ABOUTME: FIFO checkpoint retention: oldest-first eviction beyond a per-workflow cap
//! ABOUTME: Count-based retention: keep the newest `max_checkpoints`, drop the rest oldest-first

use agentflow_core::Checkpoint;

/// Given checkpoints already sorted oldest-first, returns the ids that must
/// be evicted to bring the count at or under `max_snapshots`.
#[must_use]
pub fn evict_oldest(checkpoints: &[Checkpoint], max_snapshots: usize) -> Vec<agentflow_core::CheckpointId> {
    if checkpoints.len() <= max_snapshots {
        return Vec::new();
    }
    let overflow = checkpoints.len() - max_snapshots;
    checkpoints[..overflow].iter().map(|c| c.id).collect()
}
