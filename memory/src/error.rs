use crate::usage::MemoryType;

/// Typical memory error - out of available memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, failure::Fail)]
pub enum OutOfMemoryError {
    /// Host memory exhausted.
    #[fail(display = "Out of host memory")]
    OutOfHostMemory,

    /// Device memory exhausted.
    #[fail(display = "Out of device memory")]
    OutOfDeviceMemory,
}

/// Possible cause of mapping failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, failure::Fail)]
pub enum MappingError {
    /// Attempt to map memory without host-visible property.
    #[fail(display = "Memory is not HOST_VISIBLE and can't be mapped")]
    HostInvisible,

    /// Unable to allocate an appropriately sized contiguous virtual address range.
    #[fail(display = "Virtual memory allocation failed")]
    MappingFailed,

    /// Unmap requested for memory that has no outstanding mapping.
    #[fail(display = "Memory is not mapped")]
    NotMapped,

    /// Out of either host or device memory.
    #[fail(display = "{}", _0)]
    OutOfMemoryError(OutOfMemoryError),
}

impl From<OutOfMemoryError> for MappingError {
    fn from(error: OutOfMemoryError) -> Self {
        MappingError::OutOfMemoryError(error)
    }
}

/// Possible cause of allocation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, failure::Fail)]
pub enum AllocationError {
    /// Out of either host or device memory.
    #[fail(display = "{}", _0)]
    OutOfMemoryError(OutOfMemoryError),

    /// Implementation doesn't allow to create more memory objects.
    #[fail(display = "Can't allocate more memory objects")]
    TooManyObjects,

    /// No memory type allowed by `mask` has the properties `memory_type` requires.
    #[fail(display = "No memory type among ({:#b}) suits '{}'", mask, memory_type)]
    NoSuitableMemory {
        /// Bitmask of acceptable memory type indices.
        mask: u32,
        /// Requested memory type.
        memory_type: MemoryType,
    },

    /// Request targets memory type the allocator doesn't serve.
    #[fail(display = "Allocator serves '{}' but '{}' was requested", expected, found)]
    WrongMemoryType {
        /// Memory type of the allocator.
        expected: MemoryType,
        /// Memory type of the request.
        found: MemoryType,
    },

    /// Linear allocator has not enough space left.
    #[fail(
        display = "Linear allocation of {} bytes at {} exceeds capacity {}",
        size, offset, capacity
    )]
    LinearExhausted {
        /// Aligned size requested.
        size: u64,
        /// Offset the allocation would start at.
        offset: u64,
        /// Capacity of the linear block.
        capacity: u64,
    },

    /// Request can't be placed even into a fresh block.
    #[fail(display = "Allocation of {} bytes can't fit into block of {} bytes", size, block_size)]
    TooLarge {
        /// Aligned size requested.
        size: u64,
        /// Size of the blocks.
        block_size: u64,
    },
}

impl From<OutOfMemoryError> for AllocationError {
    fn from(error: OutOfMemoryError) -> Self {
        AllocationError::OutOfMemoryError(error)
    }
}

/// Generic memory error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, failure::Fail)]
pub enum MemoryError {
    /// Error occurred during allocation.
    #[fail(display = "{}", _0)]
    AllocationError(AllocationError),

    /// Error occurred during mapping operation.
    #[fail(display = "{}", _0)]
    MappingError(MappingError),

    /// View doesn't belong to any block of the allocator.
    #[fail(display = "View {}..{} of '{}' is unknown to the allocator", offset, end, memory_type)]
    UnknownView {
        /// Offset of the view.
        offset: u64,
        /// End of the view range.
        end: u64,
        /// Memory type of the view.
        memory_type: MemoryType,
    },

    /// Allocator index is vacant.
    #[fail(display = "Allocator {} not found", _0)]
    UnknownAllocator(usize),
}

impl From<OutOfMemoryError> for MemoryError {
    fn from(error: OutOfMemoryError) -> Self {
        MemoryError::AllocationError(error.into())
    }
}

impl From<AllocationError> for MemoryError {
    fn from(error: AllocationError) -> Self {
        MemoryError::AllocationError(error)
    }
}

impl From<MappingError> for MemoryError {
    fn from(error: MappingError) -> Self {
        MemoryError::MappingError(error)
    }
}
