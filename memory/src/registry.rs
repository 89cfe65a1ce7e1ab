//! Arena of allocators and views that return themselves when dropped.
//! `ScopedView` frees its range through the `Allocators` it was allocated from.
//! Explicit `ScopedView::free` is still preferred as it reports errors to the caller.

use {
    crate::{
        allocator::{AllocateInfo, Allocator, AllocatorFlavor, Kind},
        device::Device,
        error::MemoryError,
        usage::MemoryType,
        utilization::AllocatorUtilization,
        view::View,
    },
    std::{
        cell::RefCell,
        mem::{forget, ManuallyDrop},
        ops::Range,
        ptr::{read, NonNull},
        rc::{Rc, Weak},
    },
};

/// Identifier of an allocator in `Allocators`.
/// Slots are reused after removal, the generation tells occupants apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocatorId {
    index: usize,
    generation: u64,
}

impl AllocatorId {
    /// Index of the allocator in the arena.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Insertion number of the allocator.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Inner<D: Device> {
    device: D,
    generation: u64,
    allocators: slab::Slab<(u64, AllocatorFlavor<D::Memory>)>,
}

impl<D> Inner<D>
where
    D: Device,
{
    fn allocator(
        &mut self,
        id: AllocatorId,
    ) -> Result<(&D, &mut AllocatorFlavor<D::Memory>), MemoryError> {
        match self.allocators.get_mut(id.index) {
            Some((generation, allocator)) if *generation == id.generation => {
                Ok((&self.device, allocator))
            }
            _ => Err(MemoryError::UnknownAllocator(id.index)),
        }
    }
}

impl<D> Drop for Inner<D>
where
    D: Device,
{
    fn drop(&mut self) {
        for (_, allocator) in self.allocators.drain() {
            allocator.dispose(&self.device);
        }
    }
}

/// Owns the device and allocators created for it.
///
/// Allocators are addressed by `AllocatorId`.
/// Views allocated through `Allocators` keep only weak reference to it,
/// dropping `Allocators` disposes all allocators
/// and views left alive after that are leaked.
pub struct Allocators<D: Device> {
    inner: Rc<RefCell<Inner<D>>>,
}

impl<D> std::fmt::Debug for Allocators<D>
where
    D: Device + std::fmt::Debug,
{
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => fmt
                .debug_struct("Allocators")
                .field("device", &inner.device)
                .field("allocators", &inner.allocators.len())
                .finish(),
            Err(_) => fmt.write_str("Allocators { <borrowed> }"),
        }
    }
}

impl<D> Allocators<D>
where
    D: Device,
{
    /// Create empty arena for `device`.
    pub fn new(device: D) -> Self {
        Allocators {
            inner: Rc::new(RefCell::new(Inner {
                device,
                generation: 0,
                allocators: slab::Slab::new(),
            })),
        }
    }

    /// Add allocator to the arena.
    pub fn insert(&self, allocator: impl Into<AllocatorFlavor<D::Memory>>) -> AllocatorId {
        let mut inner = self.inner.borrow_mut();
        let allocator = allocator.into();
        log::debug!("Insert {:?} allocator", Allocator::<D::Memory>::kind(&allocator));
        inner.generation += 1;
        let generation = inner.generation;
        let index = inner.allocators.insert((generation, allocator));
        AllocatorId { index, generation }
    }

    /// Create allocator with the device and add it to the arena.
    pub fn insert_with<F, A>(&self, f: F) -> Result<AllocatorId, MemoryError>
    where
        F: FnOnce(&D) -> Result<A, MemoryError>,
        A: Into<AllocatorFlavor<D::Memory>>,
    {
        let allocator = {
            let inner = self.inner.borrow();
            f(&inner.device)?
        };
        Ok(self.insert(allocator))
    }

    /// Remove allocator from the arena and dispose it.
    /// Views allocated from it must be freed beforehand.
    pub fn remove(&self, id: AllocatorId) -> Result<(), MemoryError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        match inner.allocators.get(id.index) {
            Some(&(generation, _)) if generation == id.generation => {}
            _ => return Err(MemoryError::UnknownAllocator(id.index)),
        }
        let (_, allocator) = inner.allocators.remove(id.index);
        allocator.dispose(&inner.device);
        Ok(())
    }

    /// Allocate range from allocator `id`.
    pub fn allocate(
        &self,
        id: AllocatorId,
        info: AllocateInfo,
    ) -> Result<ScopedView<D>, MemoryError> {
        let mut inner = self.inner.borrow_mut();
        let (device, allocator) = inner.allocator(id)?;
        let view = allocator.allocate(device, info)?;
        Ok(ScopedView {
            registry: Rc::downgrade(&self.inner),
            id,
            view: ManuallyDrop::new(view),
        })
    }

    /// Get utilization of allocator `id`.
    pub fn utilization(&self, id: AllocatorId) -> Result<AllocatorUtilization, MemoryError> {
        let mut inner = self.inner.borrow_mut();
        let (_, allocator) = inner.allocator(id)?;
        Ok(Allocator::<D::Memory>::utilization(allocator))
    }

    /// Get kind of allocator `id`.
    pub fn kind(&self, id: AllocatorId) -> Result<Kind, MemoryError> {
        let mut inner = self.inner.borrow_mut();
        let (_, allocator) = inner.allocator(id)?;
        Ok(Allocator::<D::Memory>::kind(allocator))
    }

    /// Number of allocators in the arena.
    pub fn len(&self) -> usize {
        self.inner.borrow().allocators.len()
    }

    /// Check if there are no allocators in the arena.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Access the device.
    pub fn with_device<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&D) -> R,
    {
        f(&self.inner.borrow().device)
    }
}

/// View allocated through `Allocators`.
/// Returned to its allocator when dropped.
pub struct ScopedView<D: Device> {
    registry: Weak<RefCell<Inner<D>>>,
    id: AllocatorId,
    view: ManuallyDrop<View<D::Memory>>,
}

impl<D> std::fmt::Debug for ScopedView<D>
where
    D: Device,
{
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("ScopedView")
            .field("allocator", &self.id)
            .field("view", &*self.view)
            .finish()
    }
}

impl<D> ScopedView<D>
where
    D: Device,
{
    /// Offset of the view inside memory object.
    pub fn offset(&self) -> u64 {
        self.view.offset()
    }

    /// Size of the view.
    pub fn size(&self) -> u64 {
        self.view.size()
    }

    /// Range of the view inside memory object.
    pub fn range(&self) -> Range<u64> {
        self.view.range()
    }

    /// Memory type of the view.
    pub fn memory_type(&self) -> MemoryType {
        self.view.memory_type()
    }

    /// Raw memory object the view points into.
    pub fn raw(&self) -> D::Memory {
        self.view.raw()
    }

    /// Allocator the view was allocated from.
    pub fn allocator(&self) -> AllocatorId {
        self.id
    }

    /// Map the view to host memory.
    pub fn map(&mut self) -> Result<NonNull<u8>, MemoryError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(MemoryError::UnknownAllocator(self.id.index))?;
        let mut inner = registry.borrow_mut();
        let (device, allocator) = inner.allocator(self.id)?;
        allocator.map(device, &mut *self.view)
    }

    /// Release mapping acquired by `map`.
    pub fn unmap(&mut self) -> Result<(), MemoryError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(MemoryError::UnknownAllocator(self.id.index))?;
        let mut inner = registry.borrow_mut();
        let (device, allocator) = inner.allocator(self.id)?;
        allocator.unmap(device, &mut *self.view)
    }

    /// Return the view to its allocator.
    pub fn free(self) -> Result<(), MemoryError> {
        let (registry, id, view) = self.deconstruct();
        release(&registry, id, view)
    }

    fn deconstruct(mut self) -> (Weak<RefCell<Inner<D>>>, AllocatorId, View<D::Memory>) {
        unsafe {
            let registry = read(&mut self.registry);
            let view = read(&mut *self.view);
            let id = self.id;
            forget(self);
            (registry, id, view)
        }
    }
}

impl<D> Drop for ScopedView<D>
where
    D: Device,
{
    fn drop(&mut self) {
        let view = unsafe {
            // `self.view` cannot be accessed after this function.
            // `ManuallyDrop` will prevent `self.view` from dropping.
            read(&mut *self.view)
        };
        if let Err(error) = release(&self.registry, self.id, view) {
            log::error!("Failed to free dropped view: {}", error);
        }
    }
}

fn release<D>(
    registry: &Weak<RefCell<Inner<D>>>,
    id: AllocatorId,
    view: View<D::Memory>,
) -> Result<(), MemoryError>
where
    D: Device,
{
    let registry = match registry.upgrade() {
        Some(registry) => registry,
        None => {
            log::warn!(
                "Allocators are dropped before view {:?}. Memory is leaked",
                view
            );
            if let Some(memory) = view.release() {
                memory.leak();
            }
            return Ok(());
        }
    };

    let mut inner = match registry.try_borrow_mut() {
        Ok(inner) => inner,
        Err(_) => {
            log::error!("Allocators are borrowed while view {:?} is freed", view);
            return Err(view.reject());
        }
    };

    let result = match inner.allocator(id) {
        Ok((device, allocator)) => allocator.free(device, view),
        Err(error) => {
            view.reject();
            Err(error)
        }
    };
    result
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            allocator::{
                DedicatedAllocator, DefaultAllocator, DefaultConfig, LinearAllocator, LinearConfig,
            },
            test::mock::MockDevice,
        },
    };

    #[test]
    fn dropped_views_are_freed() {
        let allocators = Allocators::new(MockDevice::new());
        let id = allocators.insert(DefaultAllocator::new(DefaultConfig { block_size: 1024 }));
        let info = AllocateInfo::new(MemoryType::DeviceLocal, 100, 4);

        let a = allocators.allocate(id, info).unwrap();
        let b = allocators.allocate(id, info).unwrap();
        assert_eq!(a.allocator(), id);
        assert_eq!(allocators.utilization(id).unwrap().blocks[0].allocations, 2);

        drop(a);
        assert_eq!(allocators.utilization(id).unwrap().blocks[0].allocations, 1);
        b.free().unwrap();
        assert_eq!(allocators.utilization(id).unwrap().blocks[0].allocations, 0);

        allocators.remove(id).unwrap();
        assert!(allocators.is_empty());
        assert_eq!(allocators.with_device(|device| device.live()), 0);
    }

    #[test]
    fn dedicated_memory_is_released_on_drop() {
        let allocators = Allocators::new(MockDevice::new());
        let id = allocators.insert(DedicatedAllocator::new());
        assert_eq!(allocators.kind(id), Ok(Kind::Dedicated));

        let mut view = allocators
            .allocate(id, AllocateInfo::new(MemoryType::CpuCoherent, 64, 1))
            .unwrap();
        let ptr = view.map().unwrap();
        unsafe {
            ptr.as_ptr().write(42);
        }
        view.unmap().unwrap();
        assert_eq!(allocators.with_device(|device| device.live()), 1);

        drop(view);
        assert_eq!(allocators.with_device(|device| device.live()), 0);
    }

    #[test]
    fn linear_through_registry() {
        let allocators = Allocators::new(MockDevice::new());
        let id = allocators
            .insert_with(|device| {
                LinearAllocator::new(device, MemoryType::CpuCached, LinearConfig { linear_size: 256 })
            })
            .unwrap();
        assert_eq!(allocators.kind(id), Ok(Kind::Linear));

        let info = AllocateInfo::new(MemoryType::CpuCached, 64, 64);
        let a = allocators.allocate(id, info).unwrap();
        let b = allocators.allocate(id, info).unwrap();
        assert_eq!(b.range(), 64..128);
        drop(b);
        drop(a);

        let c = allocators.allocate(id, info).unwrap();
        assert_eq!(c.offset(), 0);
        c.free().unwrap();
    }

    #[test]
    fn unknown_allocator() {
        let allocators = Allocators::new(MockDevice::new());
        let id = allocators.insert(DedicatedAllocator::new());
        allocators.remove(id).unwrap();

        assert_eq!(
            allocators
                .allocate(id, AllocateInfo::new(MemoryType::DeviceLocal, 1, 1))
                .unwrap_err(),
            MemoryError::UnknownAllocator(id.index())
        );
        assert_eq!(allocators.remove(id), Err(MemoryError::UnknownAllocator(id.index())));
        assert_eq!(allocators.kind(id), Err(MemoryError::UnknownAllocator(id.index())));
    }

    #[test]
    fn reused_slot_does_not_accept_stale_views() {
        let allocators = Allocators::new(MockDevice::new());
        let old = allocators.insert(DefaultAllocator::new(DefaultConfig { block_size: 1024 }));
        let mut view = allocators
            .allocate(old, AllocateInfo::new(MemoryType::CpuCoherent, 16, 16))
            .unwrap();
        allocators.remove(old).unwrap();

        let new = allocators.insert(DefaultAllocator::new(DefaultConfig { block_size: 1024 }));
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        let fresh = allocators
            .allocate(new, AllocateInfo::new(MemoryType::CpuCoherent, 16, 16))
            .unwrap();

        assert_eq!(view.map(), Err(MemoryError::UnknownAllocator(old.index())));
        assert_eq!(view.free(), Err(MemoryError::UnknownAllocator(old.index())));
        assert_eq!(allocators.utilization(new).unwrap().blocks[0].allocations, 1);
        assert_eq!(allocators.kind(old), Err(MemoryError::UnknownAllocator(old.index())));

        fresh.free().unwrap();
        assert_eq!(allocators.utilization(new).unwrap().blocked(), 0);
    }

    #[test]
    fn view_outliving_allocator_is_leaked() {
        let allocators = Allocators::new(MockDevice::new());
        let id = allocators.insert(DefaultAllocator::new(DefaultConfig { block_size: 1024 }));

        let mut view = allocators
            .allocate(id, AllocateInfo::new(MemoryType::CpuCoherent, 16, 16))
            .unwrap();
        let stale = view.raw();

        drop(allocators);
        assert_eq!(view.map(), Err(MemoryError::UnknownAllocator(id.index())));
        assert_eq!(view.raw(), stale);
        view.free().unwrap();
    }

    #[test]
    fn view_of_removed_allocator_is_rejected() {
        let allocators = Allocators::new(MockDevice::new());
        let id = allocators.insert(DefaultAllocator::new(DefaultConfig { block_size: 1024 }));

        let view = allocators
            .allocate(id, AllocateInfo::new(MemoryType::DeviceLocal, 16, 16))
            .unwrap();
        allocators.remove(id).unwrap();

        assert_eq!(view.free(), Err(MemoryError::UnknownAllocator(id.index())));
        assert_eq!(allocators.with_device(|device| device.live()), 0);
    }
}
