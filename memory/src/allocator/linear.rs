use {
    crate::{
        allocator::{AllocateInfo, Allocator, Kind},
        device::Device,
        error::*,
        layout::Layout,
        memory::Memory,
        usage::{find_memory_type, MemoryType},
        util::{aligned, mask_allows},
        utilization::{AllocatorUtilization, BlockUtilization},
        view::View,
    },
    std::{collections::BTreeMap, fmt::Debug, ptr::NonNull},
};

/// Config for `LinearAllocator`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearConfig {
    /// Size of the linear memory object.
    /// Must be multiple of buffer-image granularity.
    pub linear_size: u64,
}

/// Linear allocator that returns memory from single memory object sequentially.
///
/// Only the most recent allocation can be returned.
/// Freeing any other view is ignored and its space stays blocked
/// until everything allocated after it was freed in reverse order.
/// The memory object never grows.
///
/// This allocator suites best short-lived allocations with stack discipline.
#[derive(Debug)]
pub struct LinearAllocator<T> {
    memory: Memory<T>,
    head: u64,
    page_size: u64,
    layouts: BTreeMap<u64, Layout>,
}

impl<T> LinearAllocator<T>
where
    T: Copy + Eq + Debug,
{
    /// Create new `LinearAllocator` for `memory_type`
    /// allocating its memory object from the device.
    pub fn new<D>(device: &D, memory_type: MemoryType, config: LinearConfig) -> Result<Self, MemoryError>
    where
        D: Device<Memory = T>,
    {
        log::info!(
            "Create new 'linear' allocator: type: '{}', config: '{:#?}'",
            memory_type,
            config
        );

        let page_size = device.buffer_image_granularity().max(1);
        assert!(config.linear_size > 0, "Linear size must be non-zero");
        assert_eq!(
            config.linear_size % page_size,
            0,
            "Linear size must be multiple of buffer-image granularity"
        );

        let index = find_memory_type(device.memory_types(), !0, memory_type.properties()).ok_or(
            AllocationError::NoSuitableMemory {
                mask: !0,
                memory_type,
            },
        )?;

        Ok(LinearAllocator {
            memory: Memory::allocate(device, memory_type, index, config.linear_size)?,
            head: 0,
            page_size,
            layouts: BTreeMap::new(),
        })
    }

    /// Offset next allocation will be placed at (before alignment).
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Size of the memory object.
    pub fn capacity(&self) -> u64 {
        self.memory.size()
    }

    /// Memory type this allocator serves.
    pub fn memory_type(&self) -> MemoryType {
        self.memory.memory_type()
    }

    /// Ranges currently blocked, ordered by offset.
    pub fn layouts(&self) -> impl Iterator<Item = &Layout> + '_ {
        self.layouts.values()
    }
}

impl<T> Allocator<T> for LinearAllocator<T>
where
    T: Copy + Eq + Debug,
{
    fn kind(&self) -> Kind {
        Kind::Linear
    }

    fn allocate<D>(&mut self, _device: &D, info: AllocateInfo) -> Result<View<T>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        if info.memory_type != self.memory.memory_type() {
            return Err(AllocationError::WrongMemoryType {
                expected: self.memory.memory_type(),
                found: info.memory_type,
            }
            .into());
        }

        if !mask_allows(info.type_mask, self.memory.index()) {
            return Err(AllocationError::NoSuitableMemory {
                mask: info.type_mask,
                memory_type: info.memory_type,
            }
            .into());
        }

        let align = info.alignment(self.page_size);
        let size = aligned(info.size, align);
        let offset = aligned(self.head, align);
        let capacity = self.memory.size();

        if offset.checked_add(size).map_or(true, |end| end > capacity) {
            return Err(AllocationError::LinearExhausted {
                size,
                offset,
                capacity,
            }
            .into());
        }

        self.layouts.insert(
            offset,
            Layout {
                offset,
                size,
                used_size: info.size,
            },
        );
        self.head = offset + size;
        log::trace!(
            "Linear allocation {}..{} of '{}'",
            offset,
            self.head,
            info.memory_type
        );

        Ok(View::weak(
            self.memory.raw(),
            info.memory_type,
            offset,
            size,
        ))
    }

    fn free<D>(&mut self, _device: &D, view: View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        let known = view.raw() == self.memory.raw()
            && !view.is_dedicated()
            && self
                .layouts
                .get(&view.offset())
                .map_or(false, |layout| layout.size == view.size());

        if !known {
            return Err(view.reject());
        }

        let range = view.range();
        let memory = view.release();
        debug_assert!(memory.is_none());

        if range.end == self.head {
            self.layouts.remove(&range.start);
            // Alignment gap below the freed range is not recorded.
            self.head = self.layouts.values().next_back().map_or(0, Layout::end);
            log::trace!("Linear range {}..{} freed", range.start, range.end);
        } else {
            log::debug!(
                "Linear range {}..{} is not on top ({}) and stays blocked",
                range.start,
                range.end,
                self.head
            );
        }
        Ok(())
    }

    fn map<D>(&mut self, device: &D, view: &mut View<T>) -> Result<NonNull<u8>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        if view.raw() != self.memory.raw() {
            return Err(view.unknown());
        }
        Ok(self.memory.map(device, view.offset())?)
    }

    fn unmap<D>(&mut self, device: &D, view: &mut View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        if view.raw() != self.memory.raw() {
            return Err(view.unknown());
        }
        Ok(self.memory.unmap(device)?)
    }

    fn utilization(&self) -> AllocatorUtilization {
        AllocatorUtilization {
            kind: Kind::Linear,
            blocks: vec![BlockUtilization::from_layouts(
                self.memory.memory_type(),
                self.memory.size(),
                self.layouts.values(),
            )],
        }
    }

    fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        if !self.layouts.is_empty() {
            log::error!(
                "Layouts are not empty during allocator disposal. Layouts: {:#?}",
                self.layouts
            );
        }
        self.memory.dispose(device);
    }
}
