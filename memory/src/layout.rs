use std::ops::Range;

/// Used byte range inside one memory block.
/// `size` includes alignment padding, `used_size` is what was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    /// Offset from the beginning of the block.
    pub offset: u64,
    /// Size reserved for the allocation.
    pub size: u64,
    /// Bytes actually requested.
    pub used_size: u64,
}

impl Layout {
    /// End of the reserved range.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Reserved range.
    pub fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// Padding bytes reserved but not requested.
    pub fn unused(&self) -> u64 {
        self.size - self.used_size
    }
}
