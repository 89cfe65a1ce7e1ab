use {
    super::mock::MockDevice,
    crate::{
        allocator::{
            AllocateInfo, Allocator, DedicatedAllocator, DefaultAllocator, DefaultConfig,
            LinearAllocator, LinearConfig, PoolAllocator, PoolConfig,
        },
        error::{AllocationError, MemoryError, OutOfMemoryError},
        registry::Allocators,
        usage::MemoryType,
        util::overlaps,
        view::View,
    },
    rand::{rngs::StdRng, Rng, SeedableRng},
};

const BLOCK_SIZE: u64 = 4096;
const GRANULARITY: u64 = 256;

#[derive(Debug)]
struct Allocation {
    info: AllocateInfo,
}

impl Allocation {
    fn random(rng: &mut StdRng) -> Self {
        let memory_type = MemoryType::ALL[rng.gen_range(0, MemoryType::ALL.len())];
        let size = rng.gen_range(1u64, 1024);
        let alignment = 1u64 << rng.gen_range(0u32, 9);
        let info = AllocateInfo::new(memory_type, size, alignment);
        Allocation {
            info: if rng.gen() { info.non_linear() } else { info },
        }
    }

    fn check(&self, view: &View<u64>) {
        assert!(view.size() >= self.info.size);
        assert_eq!(view.memory_type(), self.info.memory_type);
        assert_eq!(
            view.offset() % self.info.alignment,
            0,
            "View: {:#?} allocated without requested alignment {}",
            view,
            self.info.alignment
        );
        if self.info.non_linear {
            assert_eq!(view.offset() % GRANULARITY, 0);
        }
        assert!(view.range().end <= BLOCK_SIZE);
    }
}

fn check_layouts(allocator: &DefaultAllocator<u64>) {
    for &memory_type in MemoryType::ALL.iter() {
        let pool = match allocator.pool(memory_type) {
            Some(pool) => pool,
            None => continue,
        };
        for block in pool.blocks() {
            let layouts: Vec<_> = block.layouts().collect();
            for pair in layouts.windows(2) {
                assert!(
                    !overlaps(pair[0].range(), pair[1].range()),
                    "Overlapping layouts: {:#?}",
                    pair
                );
            }
            assert!(layouts.iter().all(|layout| layout.end() <= block.memory().size()));
        }
    }
}

#[test]
fn random_sequence_keeps_layouts_disjoint() {
    let device = MockDevice::new().with_granularity(GRANULARITY);
    let mut allocator = DefaultAllocator::new(DefaultConfig {
        block_size: BLOCK_SIZE,
    });
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut views = Vec::new();

    for _ in 0..512 {
        if views.is_empty() || rng.gen_range(0u32, 3) > 0 {
            let allocation = Allocation::random(&mut rng);
            match allocator.allocate(&device, allocation.info) {
                Ok(view) => {
                    allocation.check(&view);
                    views.push(view);
                }
                Err(err) => {
                    panic!("Error({}) occurred for {:#?}", err, allocation);
                }
            }
        } else {
            let index = rng.gen_range(0, views.len());
            let view = views.swap_remove(index);
            allocator.free(&device, view).unwrap();
        }
        check_layouts(&allocator);
    }

    for (index, a) in views.iter().enumerate() {
        for b in &views[index + 1..] {
            assert!(
                a.raw() != b.raw() || !overlaps(a.range(), b.range()),
                "Views overlap: {:#?} and {:#?}",
                a,
                b
            );
        }
    }

    for view in views.drain(..) {
        allocator.free(&device, view).unwrap();
    }
    let utilization = allocator.utilization();
    assert!(utilization.blocks.iter().all(|block| block.allocations == 0));
    assert_eq!(utilization.blocked(), 0);

    allocator.dispose(&device);
    assert_eq!(device.live(), 0);
}

#[test]
fn views_land_in_requested_memory_type() {
    let device = MockDevice::new();
    let mut allocator = DefaultAllocator::new(DefaultConfig { block_size: 1024 });

    let expected = [
        (MemoryType::DeviceLocal, 0),
        (MemoryType::CpuAccessible, 1),
        (MemoryType::CpuCoherent, 1),
        (MemoryType::CpuCached, 2),
        (MemoryType::CpuCoherentAndCached, 3),
    ];
    let mut views = Vec::new();
    for &(memory_type, index) in expected.iter() {
        let view = allocator
            .allocate(&device, AllocateInfo::new(memory_type, 8, 8))
            .unwrap();
        assert_eq!(device.index_of(view.raw()), Some(index));
        views.push(view);
    }

    for view in views {
        allocator.free(&device, view).unwrap();
    }
    allocator.dispose(&device);
}

#[test]
fn out_of_device_memory_is_propagated() {
    let device = MockDevice::new().with_capacity(1024);
    let mut pool =
        PoolAllocator::new(&device, MemoryType::DeviceLocal, PoolConfig { block_size: 1024 }).unwrap();
    let info = AllocateInfo::new(MemoryType::DeviceLocal, 1024, 1);

    let view = pool.allocate(&device, info).unwrap();
    assert_eq!(
        pool.allocate(&device, info).unwrap_err(),
        MemoryError::AllocationError(AllocationError::OutOfMemoryError(
            OutOfMemoryError::OutOfDeviceMemory
        ))
    );
    assert_eq!(pool.blocks().len(), 1);

    pool.free(&device, view).unwrap();
    pool.dispose(&device);

    let mut dedicated = DedicatedAllocator::new();
    let big = AllocateInfo::new(MemoryType::CpuCoherent, 2048, 1);
    assert!(Allocator::<u64>::allocate(&mut dedicated, &device, big).is_err());
    assert_eq!(dedicated.used(), 0);
}

#[test]
fn linear_capacity_follows_granularity() {
    let device = MockDevice::new().with_granularity(GRANULARITY);
    let linear = LinearAllocator::new(
        &device,
        MemoryType::CpuCoherent,
        LinearConfig {
            linear_size: 4 * GRANULARITY,
        },
    )
    .unwrap();
    assert_eq!(linear.capacity(), 1024);
    linear.dispose(&device);
}

#[test]
#[should_panic]
fn linear_capacity_must_be_multiple_of_granularity() {
    let device = MockDevice::new().with_granularity(GRANULARITY);
    let _ = LinearAllocator::new(
        &device,
        MemoryType::CpuCoherent,
        LinearConfig {
            linear_size: GRANULARITY + 1,
        },
    );
}

#[test]
fn mixed_allocators_in_registry() {
    let allocators = Allocators::new(MockDevice::new());
    let dedicated = allocators.insert(DedicatedAllocator::new());
    let default = allocators.insert(DefaultAllocator::new(DefaultConfig { block_size: 1024 }));
    let linear = allocators
        .insert_with(|device| {
            LinearAllocator::new(device, MemoryType::CpuCoherent, LinearConfig { linear_size: 512 })
        })
        .unwrap();
    assert_eq!(allocators.len(), 3);

    let info = AllocateInfo::new(MemoryType::CpuCoherent, 128, 64);
    let views = vec![
        allocators.allocate(dedicated, info).unwrap(),
        allocators.allocate(default, info).unwrap(),
        allocators.allocate(linear, info).unwrap(),
        allocators.allocate(default, info).unwrap(),
    ];
    assert_eq!(allocators.with_device(|device| device.live()), 3);

    for mut view in views {
        let ptr = view.map().unwrap();
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0xFF, view.size() as usize);
        }
        view.unmap().unwrap();
    }

    assert_eq!(allocators.with_device(|device| device.live()), 2);
    assert_eq!(allocators.utilization(default).unwrap().blocked(), 0);
    assert_eq!(allocators.utilization(linear).unwrap().blocked(), 0);
    assert!(allocators.utilization(dedicated).unwrap().blocks.is_empty());

    print!("{}", allocators.utilization(default).unwrap());
    drop(allocators);
}
