use {
    crate::{
        error::{AllocationError, MappingError},
        memory::Properties,
    },
    std::{fmt::Debug, ops::Range, ptr::NonNull},
};

/// Backend operations the allocators are built upon.
pub trait Device {
    /// Raw memory object handle.
    /// Handles are compared to find the block a view belongs to.
    type Memory: Copy + Eq + Debug;

    /// Properties of the memory types, indexed by memory type index.
    fn memory_types(&self) -> &[Properties];

    /// Minimal separation between linear and non-linear resources
    /// sharing one memory object.
    fn buffer_image_granularity(&self) -> u64;

    /// Allocate memory object.
    ///
    /// # Parameters
    /// `index` - memory type index.
    /// `size`  - size of the memory object to allocate.
    unsafe fn allocate(&self, index: u32, size: u64) -> Result<Self::Memory, AllocationError>;

    /// Free memory object.
    unsafe fn free(&self, memory: Self::Memory);

    /// Map memory range.
    /// Only one range for the given memory object can be mapped.
    unsafe fn map(&self, memory: &Self::Memory, range: Range<u64>)
        -> Result<NonNull<u8>, MappingError>;

    /// Unmap memory.
    unsafe fn unmap(&self, memory: &Self::Memory);
}
