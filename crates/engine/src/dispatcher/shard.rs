use std::hash::{Hash, Hasher};

/// Worker index for a device. `DefaultHasher::new()` uses fixed keys, so the
/// mapping is stable for the lifetime of the process.
pub fn shard_for(device_id: &str, shards: usize) -> usize {
    let mut hasher = std::hash::DefaultHasher::new();
    device_id.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}
