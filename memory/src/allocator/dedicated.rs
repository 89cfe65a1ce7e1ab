use {
    crate::{
        allocator::{AllocateInfo, Allocator, Kind},
        device::Device,
        error::*,
        memory::Memory,
        usage::{find_memory_type, MemoryType},
        utilization::{AllocatorUtilization, BlockUtilization},
        view::View,
    },
    std::{collections::BTreeMap, fmt::Debug, ptr::NonNull},
};

/// Dedicated memory allocator that uses memory object per allocation requested.
///
/// This allocator suites best huge allocations
/// and resources that are mapped for their whole lifetime.
/// Views it returns own their memory objects.
#[derive(Debug)]
pub struct DedicatedAllocator<T> {
    used: BTreeMap<MemoryType, (u64, usize)>,
    live: Vec<T>,
}

impl<T> Default for DedicatedAllocator<T> {
    fn default() -> Self {
        DedicatedAllocator {
            used: BTreeMap::new(),
            live: Vec::new(),
        }
    }
}

impl<T> DedicatedAllocator<T> {
    /// Create new `DedicatedAllocator`.
    pub fn new() -> Self {
        DedicatedAllocator::default()
    }

    /// Total size of memory objects allocated and not yet freed.
    pub fn used(&self) -> u64 {
        self.used.values().map(|&(size, _)| size).sum()
    }
}

impl<T> Allocator<T> for DedicatedAllocator<T>
where
    T: Copy + Eq + Debug,
{
    fn kind(&self) -> Kind {
        Kind::Dedicated
    }

    fn allocate<D>(&mut self, device: &D, info: AllocateInfo) -> Result<View<T>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        assert!(info.size > 0, "Allocation size must be non-zero");
        let index = find_memory_type(
            device.memory_types(),
            info.type_mask,
            info.memory_type.properties(),
        )
        .ok_or(AllocationError::NoSuitableMemory {
            mask: info.type_mask,
            memory_type: info.memory_type,
        })?;

        let memory = Memory::allocate(device, info.memory_type, index, info.size)?;

        let used = self.used.entry(info.memory_type).or_insert((0, 0));
        used.0 += info.size;
        used.1 += 1;
        self.live.push(memory.raw());

        Ok(View::dedicated(memory))
    }

    fn free<D>(&mut self, device: &D, view: View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        let raw = view.raw();
        let position = match self.live.iter().position(|&live| live == raw) {
            Some(position) if view.is_dedicated() => position,
            _ => return Err(view.reject()),
        };
        self.live.swap_remove(position);

        let memory_type = view.memory_type();
        if let Some(memory) = view.release() {
            if let Some(used) = self.used.get_mut(&memory_type) {
                used.0 -= memory.size();
                used.1 -= 1;
            }
            memory.dispose(device);
        }
        Ok(())
    }

    fn map<D>(&mut self, device: &D, view: &mut View<T>) -> Result<NonNull<u8>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        let unknown = view.unknown();
        if !self.live.contains(&view.raw()) {
            return Err(unknown);
        }
        let memory = view.memory_mut().ok_or(unknown)?;
        Ok(memory.map(device, 0)?)
    }

    fn unmap<D>(&mut self, device: &D, view: &mut View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        let unknown = view.unknown();
        if !self.live.contains(&view.raw()) {
            return Err(unknown);
        }
        let memory = view.memory_mut().ok_or(unknown)?;
        Ok(memory.unmap(device)?)
    }

    fn utilization(&self) -> AllocatorUtilization {
        AllocatorUtilization {
            kind: Kind::Dedicated,
            blocks: self
                .used
                .iter()
                .filter(|(_, used)| used.1 > 0)
                .map(|(&memory_type, &(size, count))| BlockUtilization {
                    memory_type,
                    size,
                    blocked: size,
                    used: size,
                    allocations: count,
                })
                .collect(),
        }
    }

    fn dispose<D>(self, _device: &D)
    where
        D: Device<Memory = T>,
    {
        let used = Allocator::<T>::utilization(&self);
        if !used.blocks.is_empty() {
            log::warn!(
                "Dedicated allocator disposed with memory still in use: {:#?}",
                used.blocks
            );
        }
    }
}
