//!
//! Types shared throughout the project.
//!

/// Seconds since the UNIX epoch. Not required to be monotonic: it is a
/// wall-clock stamp, refreshed by `put`/`kktakethis` and compared against by
/// the collector.
pub type UnixTimestamp = u64;

/// Longest hash/ip token we accept. The C original allocates exactly
/// `strlen()` bytes for these fields (one short of the NUL terminator it
/// then writes) and otherwise enforces no bound at all; we don't have that
/// bug to reproduce, but we do adopt the conservative cap the spec calls
/// for on stored field length, rejecting anything longer with `BadArgument`.
pub const MAX_FIELD_LEN: usize = 128;

/// One DHT record: a hash, the IP of a peer advertising it, and the instant
/// it was last inserted or refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub hash: String,
    pub ip: String,
    pub timestamp: UnixTimestamp,
}

impl Record {
    /// True once `now - timestamp > GARBAGE_COL_TIME` (invariant 5: evictable).
    pub fn is_evictable(&self, now: UnixTimestamp, garbage_col_time: UnixTimestamp) -> bool {
        now.saturating_sub(self.timestamp) > garbage_col_time
    }

    /// True while `now - timestamp <= HASH_DEPRECATION_TIME` (invariant 6: returnable).
    pub fn is_fresh(&self, now: UnixTimestamp, hash_deprecation_time: UnixTimestamp) -> bool {
        now.saturating_sub(self.timestamp) <= hash_deprecation_time
    }
}
