//! Helper functions that don't particularly belong to any concrete module.

/// Rounds `to_be_aligned` up to a multiple of `alignment`, which must be a
/// power of two. Returns `None` on overflow.
///
/// This is how request sizes are brought to the allocator's alignment unit.
pub fn align(to_be_aligned: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    Some(to_be_aligned.checked_add(alignment - 1)? & !(alignment - 1))
}
