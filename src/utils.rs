//!
//! Generally useful functions.
//!

use std::time::{SystemTime, UNIX_EPOCH};

use crate::common::UnixTimestamp;

/// Returns the current UNIX timestamp in whole seconds.
///
/// Saturates to `0` if the system clock is set before the epoch.
pub fn unix_ts() -> UnixTimestamp {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_) => 0,
    }
}

/// Returns the name of this binary, used to scope the logger's level filter.
pub fn binary_name() -> String {
    module_path!()
        .split("::")
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_ts_monotonic_ish() {
        let a = unix_ts();
        let b = unix_ts();
        assert!(b >= a);
    }
}
