// Misc functions for interface
// Locks, shared pointers, time

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use dashmap::DashMap as RustHashMap;
pub use parking_lot::{Mutex as RustMutex, RwLock as RustLock};
pub use std::sync::Arc as RustRfc;

// Guest timestamps are signed seconds since the epoch
pub fn secs_to_systime(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}
