//! Credential comparison helpers.
//!
//! Every externally supplied key goes through [`timing_safe_eq`] before it is
//! allowed to touch a guarded endpoint.

/// Timing-safe string equality.
///
/// For equal-length inputs the comparison always walks the full string and
/// accumulates differences with XOR, so the time taken does not depend on the
/// position of the first mismatched byte. Unequal lengths return false
/// immediately; leaking the *length* of the configured key is accepted as a
/// narrower guarantee than full constant-time comparison.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut out = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        out |= x ^ y;
    }
    out == 0
}
