use {
    crate::{device::Device, error::*, usage::MemoryType, util::fits_usize},
    relevant::Relevant,
    std::{fmt::Debug, ptr::NonNull},
};

bitflags::bitflags! {
    /// Memory property flags.
    /// Bit values match Vulkan's `VkMemoryPropertyFlagBits`.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Properties: u32 {
        /// Device local memory. Fastest device access.
        const DEVICE_LOCAL = 0x1;

        /// Memory can be mapped to host address space.
        const HOST_VISIBLE = 0x2;

        /// Host writes are visible to the device without explicit flush.
        const HOST_COHERENT = 0x4;

        /// Memory is cached on the host.
        const HOST_CACHED = 0x8;

        /// Only device access is allowed, backing may be allocated lazily.
        const LAZILY_ALLOCATED = 0x10;
    }
}

/// Memory object obtained from the device.
///
/// Keeps track of host mappings: the object is mapped as a whole
/// on the first `map` call and unmapped when the last mapping is released.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct Memory<T> {
    raw: T,
    size: u64,
    index: u32,
    memory_type: MemoryType,
    properties: Properties,
    mapping: Option<NonNull<u8>>,
    map_count: u32,
    #[derivative(Debug = "ignore")]
    relevant: Relevant,
}

impl<T> Memory<T>
where
    T: Copy + Debug,
{
    /// Allocate memory object of `size` bytes from memory type `index`.
    pub(crate) fn allocate<D>(
        device: &D,
        memory_type: MemoryType,
        index: u32,
        size: u64,
    ) -> Result<Self, AllocationError>
    where
        D: Device<Memory = T>,
    {
        let properties = device.memory_types()[index as usize];
        let raw = unsafe {
            // Size is non-zero and index is taken from the device.
            device.allocate(index, size)?
        };
        log::trace!(
            "Allocated {} bytes of '{}' memory from type {}",
            size,
            memory_type,
            index
        );
        Ok(unsafe { Self::from_raw(raw, size, index, memory_type, properties) })
    }

    /// Create memory from raw object.
    ///
    /// # Safety
    ///
    /// `raw` must be a live memory object of `size` bytes
    /// allocated from memory type `index` with `properties`.
    pub unsafe fn from_raw(
        raw: T,
        size: u64,
        index: u32,
        memory_type: MemoryType,
        properties: Properties,
    ) -> Self {
        Memory {
            raw,
            size,
            index,
            memory_type,
            properties,
            mapping: None,
            map_count: 0,
            relevant: Relevant,
        }
    }

    /// Get raw memory.
    pub fn raw(&self) -> T {
        self.raw
    }

    /// Get memory size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get memory type index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get memory type this object serves.
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Get memory properties.
    pub fn properties(&self) -> Properties {
        self.properties
    }

    /// Check if this memory is host-visible and can be mapped.
    pub fn host_visible(&self) -> bool {
        self.properties.contains(Properties::HOST_VISIBLE)
    }

    /// Check if this memory is host-coherent and doesn't require invalidating or flushing.
    pub fn host_coherent(&self) -> bool {
        self.properties.contains(Properties::HOST_COHERENT)
    }

    /// Number of outstanding mappings.
    pub fn map_count(&self) -> u32 {
        self.map_count
    }

    /// Pointer to the beginning of the mapped memory, if mapped.
    pub fn mapping(&self) -> Option<NonNull<u8>> {
        self.mapping
    }

    /// Map the memory object and return pointer to `offset` byte.
    /// Only the first of nested calls actually maps memory.
    pub(crate) fn map<D>(&mut self, device: &D, offset: u64) -> Result<NonNull<u8>, MappingError>
    where
        D: Device<Memory = T>,
    {
        assert!(offset <= self.size, "Mapping offset is out of memory bounds");
        if !self.host_visible() {
            return Err(MappingError::HostInvisible);
        }

        let base = match self.mapping {
            Some(ptr) => ptr,
            None => {
                assert!(fits_usize(self.size), "Memory size must fit in usize");
                let ptr = unsafe { device.map(&self.raw, 0..self.size)? };
                log::trace!("Mapped '{}' memory {:?}", self.memory_type, self.raw);
                self.mapping = Some(ptr);
                ptr
            }
        };

        self.map_count += 1;
        Ok(unsafe {
            // Mapping covers whole memory object and `offset` is within it.
            NonNull::new_unchecked(base.as_ptr().wrapping_add(offset as usize))
        })
    }

    /// Release one mapping. Memory is unmapped when no mappings are left.
    pub(crate) fn unmap<D>(&mut self, device: &D) -> Result<(), MappingError>
    where
        D: Device<Memory = T>,
    {
        if self.map_count == 0 {
            return Err(MappingError::NotMapped);
        }

        self.map_count -= 1;
        if self.map_count == 0 && self.mapping.take().is_some() {
            unsafe {
                device.unmap(&self.raw);
            }
            log::trace!("Unmapped '{}' memory {:?}", self.memory_type, self.raw);
        }
        Ok(())
    }

    /// Return memory object to the device.
    pub(crate) fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        let Memory {
            raw,
            mapping,
            map_count,
            relevant,
            ..
        } = self;

        unsafe {
            if mapping.is_some() {
                log::warn!("Memory {:?} is freed with {} mapping(s) outstanding", raw, map_count);
                device.unmap(&raw);
            }
            device.free(raw);
        }
        relevant.dispose();
    }

    /// Drop memory without returning it to the device.
    pub(crate) fn leak(self) {
        self.relevant.dispose();
    }
}
