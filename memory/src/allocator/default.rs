use {
    crate::{
        allocator::{AllocateInfo, Allocator, Kind, PoolAllocator, PoolConfig},
        device::Device,
        error::MemoryError,
        usage::MemoryType,
        utilization::AllocatorUtilization,
        view::View,
    },
    std::{
        collections::{hash_map::Entry, HashMap},
        fmt::Debug,
        ptr::NonNull,
    },
};

/// Config for `DefaultAllocator`.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DefaultConfig {
    /// Block size of the pools created for each memory type.
    pub block_size: u64,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        DefaultConfig {
            block_size: 500 * 1024 * 1024,
        }
    }
}

/// General purpose allocator.
/// Keeps one `PoolAllocator` per memory type, created on first request.
#[derive(Debug)]
pub struct DefaultAllocator<T> {
    config: DefaultConfig,
    pools: HashMap<MemoryType, PoolAllocator<T>>,
}

impl<T> Default for DefaultAllocator<T> {
    fn default() -> Self {
        DefaultAllocator {
            config: DefaultConfig::default(),
            pools: HashMap::new(),
        }
    }
}

impl<T> DefaultAllocator<T>
where
    T: Copy + Eq + Debug,
{
    /// Create new `DefaultAllocator`.
    pub fn new(config: DefaultConfig) -> Self {
        log::info!("Create new 'default' allocator: config: '{:#?}'", config);
        DefaultAllocator {
            config,
            pools: HashMap::new(),
        }
    }

    /// Get pool serving `memory_type` if it was created.
    pub fn pool(&self, memory_type: MemoryType) -> Option<&PoolAllocator<T>> {
        self.pools.get(&memory_type)
    }

    fn pool_of(&mut self, view: &View<T>) -> Result<&mut PoolAllocator<T>, MemoryError> {
        let unknown = view.unknown();
        self.pools.get_mut(&view.memory_type()).ok_or(unknown)
    }
}

impl<T> Allocator<T> for DefaultAllocator<T>
where
    T: Copy + Eq + Debug,
{
    fn kind(&self) -> Kind {
        Kind::Default
    }

    fn allocate<D>(&mut self, device: &D, mut info: AllocateInfo) -> Result<View<T>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        let pool = match self.pools.entry(info.memory_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(PoolAllocator::new(
                device,
                info.memory_type,
                PoolConfig {
                    block_size: self.config.block_size,
                },
            )?),
        };

        info.alignment = info.alignment(device.buffer_image_granularity());
        pool.allocate(device, info)
    }

    fn free<D>(&mut self, device: &D, view: View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        match self.pools.get_mut(&view.memory_type()) {
            Some(pool) => pool.free(device, view),
            None => Err(view.reject()),
        }
    }

    fn map<D>(&mut self, device: &D, view: &mut View<T>) -> Result<NonNull<u8>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        self.pool_of(view)?.map(device, view)
    }

    fn unmap<D>(&mut self, device: &D, view: &mut View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        self.pool_of(view)?.unmap(device, view)
    }

    fn utilization(&self) -> AllocatorUtilization {
        let mut pools: Vec<_> = self.pools.iter().collect();
        pools.sort_by_key(|&(memory_type, _)| *memory_type);

        AllocatorUtilization {
            kind: Kind::Default,
            blocks: pools
                .into_iter()
                .flat_map(|(_, pool)| pool.utilization().blocks)
                .collect(),
        }
    }

    fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        for (_, pool) in self.pools {
            pool.dispose(device);
        }
    }
}
