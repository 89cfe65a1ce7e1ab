use std::ops::Range;

/// Round `value` up to a multiple of `align`.
/// `align` must be a power of two.
pub(crate) fn aligned(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two(), "Alignment must be a power of two");
    if value == 0 {
        0
    } else {
        1u64 + ((value - 1u64) | (align - 1u64))
    }
}

/// Check whether memory type `index` is allowed by `mask`.
pub(crate) fn mask_allows(mask: u32, index: u32) -> bool {
    index < 32 && mask & (1u32 << index) != 0
}

/// Check if two ranges have at least one common byte.
pub(crate) fn overlaps(a: Range<u64>, b: Range<u64>) -> bool {
    a.start < b.end && b.start < a.end
}

#[cfg(target_pointer_width = "64")]
pub(crate) fn fits_usize(_value: u64) -> bool {
    true
}

#[cfg(not(target_pointer_width = "64"))]
pub(crate) fn fits_usize(value: u64) -> bool {
    value <= usize::max_value() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_rounds_up() {
        assert_eq!(aligned(0, 16), 0);
        assert_eq!(aligned(1, 16), 16);
        assert_eq!(aligned(16, 16), 16);
        assert_eq!(aligned(17, 16), 32);
        assert_eq!(aligned(100, 1), 100);
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        assert!(!overlaps(0..64, 64..128));
        assert!(overlaps(0..65, 64..128));
        assert!(overlaps(10..20, 0..128));
        assert!(!overlaps(0..0, 0..10));
    }

    #[test]
    fn mask() {
        assert!(mask_allows(0b101, 0));
        assert!(!mask_allows(0b101, 1));
        assert!(mask_allows(!0, 31));
        assert!(!mask_allows(!0, 32));
    }
}
