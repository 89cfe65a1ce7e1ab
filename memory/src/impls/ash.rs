use {
    crate::{
        allocator::AllocateInfo,
        device::Device,
        error::*,
        memory::Properties,
        usage::MemoryType,
    },
    ::ash::vk,
    std::{ops::Range, ptr::NonNull},
};

impl From<vk::Result> for OutOfMemoryError {
    fn from(result: vk::Result) -> OutOfMemoryError {
        match result {
            vk::Result::SUCCESS => panic!("Unexpected success"),
            vk::Result::ERROR_OUT_OF_HOST_MEMORY => OutOfMemoryError::OutOfHostMemory,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => OutOfMemoryError::OutOfDeviceMemory,
            _ => panic!("unexpected error"),
        }
    }
}

impl From<vk::Result> for MappingError {
    fn from(result: vk::Result) -> MappingError {
        match result {
            vk::Result::ERROR_MEMORY_MAP_FAILED => MappingError::MappingFailed,
            result => OutOfMemoryError::from(result).into(),
        }
    }
}

impl From<vk::Result> for AllocationError {
    fn from(result: vk::Result) -> AllocationError {
        match result {
            vk::Result::ERROR_TOO_MANY_OBJECTS => AllocationError::TooManyObjects,
            result => OutOfMemoryError::from(result).into(),
        }
    }
}

/// `Device` implementation on top of `ash::Device`.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub struct AshDevice {
    #[derivative(Debug = "ignore")]
    device: ::ash::Device,
    memory_types: Vec<Properties>,
    granularity: u64,
}

impl AshDevice {
    /// Wrap logical device created from `physical`.
    ///
    /// # Safety
    ///
    /// `device` must be created from `physical` enumerated by `instance`.
    pub unsafe fn new(
        instance: &::ash::Instance,
        physical: vk::PhysicalDevice,
        device: ::ash::Device,
    ) -> Self {
        let memory_properties = instance.get_physical_device_memory_properties(physical);
        let limits = instance.get_physical_device_properties(physical).limits;

        let memory_types = memory_properties
            .memory_types_as_slice()
            .iter()
            .map(|memory_type| Properties::from_bits_truncate(memory_type.property_flags.as_raw()))
            .collect::<Vec<_>>();

        log::info!(
            "Memory types: {:#?}, buffer-image granularity: {}",
            memory_types,
            limits.buffer_image_granularity
        );

        AshDevice {
            device,
            memory_types,
            granularity: limits.buffer_image_granularity,
        }
    }

    /// Get wrapped device.
    pub fn device(&self) -> &::ash::Device {
        &self.device
    }

    /// Allocation request for a buffer with given memory requirements.
    pub fn buffer_info(
        &self,
        memory_type: MemoryType,
        requirements: vk::MemoryRequirements,
    ) -> AllocateInfo {
        AllocateInfo::new(memory_type, requirements.size, requirements.alignment)
            .with_type_mask(requirements.memory_type_bits)
    }

    /// Allocation request for an image with given memory requirements.
    /// Images with optimal tiling are non-linear.
    pub fn image_info(
        &self,
        memory_type: MemoryType,
        requirements: vk::MemoryRequirements,
        tiling: vk::ImageTiling,
    ) -> AllocateInfo {
        let info = self.buffer_info(memory_type, requirements);
        if tiling == vk::ImageTiling::OPTIMAL {
            info.non_linear()
        } else {
            info
        }
    }
}

impl Device for AshDevice {
    type Memory = vk::DeviceMemory;

    fn memory_types(&self) -> &[Properties] {
        &self.memory_types
    }

    fn buffer_image_granularity(&self) -> u64 {
        self.granularity
    }

    unsafe fn allocate(&self, index: u32, size: u64) -> Result<vk::DeviceMemory, AllocationError> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(index);
        Ok(self.device.allocate_memory(&info, None)?)
    }

    unsafe fn free(&self, memory: vk::DeviceMemory) {
        self.device.free_memory(memory, None);
    }

    unsafe fn map(
        &self,
        memory: &vk::DeviceMemory,
        range: Range<u64>,
    ) -> Result<NonNull<u8>, MappingError> {
        let ptr = self.device.map_memory(
            *memory,
            range.start,
            range.end - range.start,
            vk::MemoryMapFlags::empty(),
        )?;
        NonNull::new(ptr as *mut u8).ok_or(MappingError::MappingFailed)
    }

    unsafe fn unmap(&self, memory: &vk::DeviceMemory) {
        self.device.unmap_memory(*memory)
    }
}
