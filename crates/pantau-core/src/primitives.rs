//! # Primitives
//!
//! Fixed runtime constants for the Pantau core.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Anything an operator may want to tune (TTLs, timeouts, refresh interval)
//! lives in the app configuration instead.

/// Magic bytes for the Pantau snapshot format header.
///
/// - File Header = Magic Bytes ("PNTU") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"PNTU";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot layout.
pub const FORMAT_VERSION: u8 = 1;

/// Number of encoded payload bytes that feed a content hash.
///
/// Hashing stops after this many bytes (the total encoded length is still
/// mixed in). Two payloads with equal length and an identical 64 KiB prefix
/// produce the same hash; the cache treats them as unchanged.
pub const HASH_BYTE_LIMIT: usize = 64 * 1024;

/// Default length of the "top regions by budget" ranking.
pub const TOP_BUDGET_LIMIT: usize = 10;

/// Default length of the "top regions by proposal count" ranking.
pub const TOP_COUNT_LIMIT: usize = 15;

/// Default page size for paginated views.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Upper bound for a requested page size.
pub const MAX_PAGE_SIZE: usize = 500;

/// Filter value meaning "no restriction" (e.g. every kecamatan).
pub const ALL_FILTER: &str = "all";

/// Display label for records whose region is not in the roster.
pub const UNKNOWN_REGION_LABEL: &str = "Wilayah tidak dikenal";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of proposal records accepted in one dataset.
pub const MAX_RECORDS: usize = 200_000;

/// Maximum number of roster entries accepted in one roster.
pub const MAX_ROSTER_ENTRIES: usize = 20_000;

/// Default number of stage transitions a [`crate::TransitionLog`] retains.
pub const DEFAULT_TRANSITION_CAP: usize = 10_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"PNTU");
    }

    #[test]
    fn rankings_have_distinct_defaults() {
        assert_eq!(TOP_BUDGET_LIMIT, 10);
        assert_eq!(TOP_COUNT_LIMIT, 15);
    }
}
