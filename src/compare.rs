use subtle::ConstantTimeEq;

/// Compare two byte strings in constant time.
///
/// Length is not treated as secret: a length mismatch returns `false`
/// immediately. Equal-length inputs are compared with an accumulated
/// XOR/OR over the whole length, so the running time does not depend on
/// where the first differing byte occurs.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
