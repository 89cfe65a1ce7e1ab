use {
    crate::{
        allocator::{AllocateInfo, Allocator, Kind},
        device::Device,
        error::*,
        layout::Layout,
        memory::Memory,
        usage::{find_memory_type, MemoryType},
        util::{aligned, mask_allows, overlaps},
        utilization::{AllocatorUtilization, BlockUtilization},
        view::View,
    },
    std::{collections::BTreeMap, fmt::Debug, ptr::NonNull},
};

/// Config for `PoolAllocator`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Size of each memory object the pool allocates.
    pub block_size: u64,
}

/// Memory object owned by a pool together with ranges placed in it.
#[derive(Debug)]
pub struct PoolBlock<T> {
    memory: Memory<T>,
    layouts: BTreeMap<u64, Layout>,
}

impl<T> PoolBlock<T>
where
    T: Copy + Debug,
{
    /// Memory object of the block.
    pub fn memory(&self) -> &Memory<T> {
        &self.memory
    }

    /// Ranges placed in the block, ordered by offset.
    pub fn layouts(&self) -> impl Iterator<Item = &Layout> + '_ {
        self.layouts.values()
    }

    /// First-fit search for `size` bytes aligned to `align`.
    fn try_place(&self, size: u64, align: u64) -> Option<u64> {
        let mut candidate = 0;
        for layout in self.layouts.values() {
            if layout.offset >= candidate + size {
                break;
            }
            if overlaps(candidate..candidate + size, layout.range()) {
                candidate = aligned(layout.end(), align);
            }
        }

        if candidate + size <= self.memory.size() {
            Some(candidate)
        } else {
            None
        }
    }

    fn place(&mut self, offset: u64, size: u64, used_size: u64) {
        self.layouts.insert(
            offset,
            Layout {
                offset,
                size,
                used_size,
            },
        );
    }
}

/// Pool allocator places ranges into a growing list of equally sized memory objects.
///
/// Placement is first-fit: blocks are scanned in creation order and
/// the first gap big enough is taken.
/// Memory objects are allocated on demand and kept until the allocator is disposed.
#[derive(Debug)]
pub struct PoolAllocator<T> {
    memory_type: MemoryType,
    index: u32,
    block_size: u64,
    granularity: u64,
    blocks: Vec<PoolBlock<T>>,
}

impl<T> PoolAllocator<T>
where
    T: Copy + Eq + Debug,
{
    /// Create new `PoolAllocator` for `memory_type`.
    /// No memory is allocated until the first request.
    pub fn new<D>(device: &D, memory_type: MemoryType, config: PoolConfig) -> Result<Self, MemoryError>
    where
        D: Device<Memory = T>,
    {
        log::info!(
            "Create new 'pool' allocator: type: '{}', config: '{:#?}'",
            memory_type,
            config
        );

        assert!(config.block_size > 0, "Block size must be non-zero");

        let index = find_memory_type(device.memory_types(), !0, memory_type.properties()).ok_or(
            AllocationError::NoSuitableMemory {
                mask: !0,
                memory_type,
            },
        )?;

        Ok(PoolAllocator {
            memory_type,
            index,
            block_size: config.block_size,
            granularity: device.buffer_image_granularity().max(1),
            blocks: Vec::new(),
        })
    }

    /// Memory type this pool serves.
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Size of each block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Blocks allocated so far, in creation order.
    pub fn blocks(&self) -> &[PoolBlock<T>] {
        &self.blocks
    }

    fn block_of(&mut self, view: &View<T>) -> Option<&mut PoolBlock<T>> {
        let raw = view.raw();
        self.blocks
            .iter_mut()
            .find(|block| block.memory.raw() == raw)
    }
}

impl<T> Allocator<T> for PoolAllocator<T>
where
    T: Copy + Eq + Debug,
{
    fn kind(&self) -> Kind {
        Kind::Pool
    }

    fn allocate<D>(&mut self, device: &D, info: AllocateInfo) -> Result<View<T>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        if info.memory_type != self.memory_type {
            return Err(AllocationError::WrongMemoryType {
                expected: self.memory_type,
                found: info.memory_type,
            }
            .into());
        }

        if !mask_allows(info.type_mask, self.index) {
            return Err(AllocationError::NoSuitableMemory {
                mask: info.type_mask,
                memory_type: info.memory_type,
            }
            .into());
        }

        let align = info.alignment(self.granularity);
        let size = aligned(info.size, align);

        if size > self.block_size {
            return Err(AllocationError::TooLarge {
                size,
                block_size: self.block_size,
            }
            .into());
        }

        let found = self
            .blocks
            .iter()
            .enumerate()
            .find_map(|(index, block)| block.try_place(size, align).map(|offset| (index, offset)));

        let (index, offset) = match found {
            Some(found) => found,
            None => {
                let memory = Memory::allocate(device, self.memory_type, self.index, self.block_size)?;
                log::debug!(
                    "Pool of '{}' grows to {} blocks",
                    self.memory_type,
                    self.blocks.len() + 1
                );
                self.blocks.push(PoolBlock {
                    memory,
                    layouts: BTreeMap::new(),
                });
                let index = self.blocks.len() - 1;
                let offset = self.blocks[index].try_place(size, align).ok_or(
                    AllocationError::TooLarge {
                        size,
                        block_size: self.block_size,
                    },
                )?;
                (index, offset)
            }
        };

        let block = &mut self.blocks[index];
        block.place(offset, size, info.size);
        log::trace!(
            "Pool allocation {}..{} in block {} of '{}'",
            offset,
            offset + size,
            index,
            self.memory_type
        );

        Ok(View::weak(block.memory.raw(), self.memory_type, offset, size))
    }

    fn free<D>(&mut self, _device: &D, view: View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        let removed = if view.is_dedicated() {
            false
        } else {
            let (offset, size) = (view.offset(), view.size());
            match self.block_of(&view) {
                Some(block) => match block.layouts.get(&offset) {
                    Some(layout) if layout.size == size => {
                        block.layouts.remove(&offset);
                        true
                    }
                    _ => false,
                },
                None => false,
            }
        };

        if !removed {
            return Err(view.reject());
        }

        log::trace!(
            "Pool range {}..{} of '{}' freed",
            view.offset(),
            view.range().end,
            self.memory_type
        );
        let memory = view.release();
        debug_assert!(memory.is_none());
        Ok(())
    }

    fn map<D>(&mut self, device: &D, view: &mut View<T>) -> Result<NonNull<u8>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        let unknown = view.unknown();
        let offset = view.offset();
        let block = self.block_of(view).ok_or(unknown)?;
        Ok(block.memory.map(device, offset)?)
    }

    fn unmap<D>(&mut self, device: &D, view: &mut View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        let unknown = view.unknown();
        let block = self.block_of(view).ok_or(unknown)?;
        Ok(block.memory.unmap(device)?)
    }

    fn utilization(&self) -> AllocatorUtilization {
        AllocatorUtilization {
            kind: Kind::Pool,
            blocks: self
                .blocks
                .iter()
                .map(|block| {
                    BlockUtilization::from_layouts(
                        self.memory_type,
                        block.memory.size(),
                        block.layouts.values(),
                    )
                })
                .collect(),
        }
    }

    fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        for block in self.blocks {
            if !block.layouts.is_empty() {
                log::error!(
                    "Block of '{}' is disposed with {} allocation(s) left",
                    self.memory_type,
                    block.layouts.len()
                );
            }
            block.memory.dispose(device);
        }
    }
}
