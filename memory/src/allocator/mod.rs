//! This module provides `Allocator` trait and few allocators that implements the trait.

mod dedicated;
mod default;
mod linear;
mod pool;

use {
    crate::{
        device::Device, error::MemoryError, usage::MemoryType, utilization::AllocatorUtilization,
        view::View,
    },
    std::ptr::NonNull,
};

pub use self::{
    dedicated::DedicatedAllocator,
    default::{DefaultAllocator, DefaultConfig},
    linear::{LinearAllocator, LinearConfig},
    pool::{PoolAllocator, PoolBlock, PoolConfig},
};

/// Allocator kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Memory object per allocation.
    Dedicated,

    /// Allocations are placed sequentially and freed in reverse order.
    Linear,

    /// First-fit placement in growing list of fixed-size blocks.
    Pool,

    /// Pool per memory type.
    Default,
}

/// Allocation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocateInfo {
    /// Memory type the allocation must land in.
    pub memory_type: MemoryType,

    /// Number of bytes requested.
    pub size: u64,

    /// Required alignment of the offset. Power of two.
    pub alignment: u64,

    /// Memory type indices acceptable for the resource.
    pub type_mask: u32,

    /// Allocation is for an image with non-linear tiling.
    /// Such allocations are aligned to buffer-image granularity.
    pub non_linear: bool,
}

impl AllocateInfo {
    /// Request `size` bytes of `memory_type` memory aligned to `alignment`.
    pub fn new(memory_type: MemoryType, size: u64, alignment: u64) -> Self {
        assert!(size > 0, "Allocation size must be non-zero");
        assert!(
            alignment.is_power_of_two(),
            "Alignment must be a power of two"
        );
        AllocateInfo {
            memory_type,
            size,
            alignment,
            type_mask: !0,
            non_linear: false,
        }
    }

    /// Restrict acceptable memory type indices.
    pub fn with_type_mask(mut self, type_mask: u32) -> Self {
        self.type_mask = type_mask;
        self
    }

    /// Mark allocation as non-linear.
    pub fn non_linear(mut self) -> Self {
        self.non_linear = true;
        self
    }

    /// Alignment the allocation must be placed with.
    /// Requests built as struct literals are checked here.
    pub(crate) fn alignment(&self, granularity: u64) -> u64 {
        assert!(self.size > 0, "Allocation size must be non-zero");
        assert!(
            self.alignment.is_power_of_two(),
            "Alignment must be a power of two"
        );
        let alignment = self.alignment;
        if self.non_linear {
            alignment.max(granularity)
        } else {
            alignment
        }
    }
}

/// Allocator trait implemented for various allocators.
pub trait Allocator<T> {
    /// Get allocator kind.
    fn kind(&self) -> Kind;

    /// Allocate range of memory.
    fn allocate<D>(&mut self, device: &D, info: AllocateInfo) -> Result<View<T>, MemoryError>
    where
        D: Device<Memory = T>;

    /// Return range of memory to the allocator.
    fn free<D>(&mut self, device: &D, view: View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>;

    /// Map view to host memory.
    /// Every successful call must be paired with `unmap`.
    fn map<D>(&mut self, device: &D, view: &mut View<T>) -> Result<NonNull<u8>, MemoryError>
    where
        D: Device<Memory = T>;

    /// Release mapping acquired by `map`.
    fn unmap<D>(&mut self, device: &D, view: &mut View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>;

    /// Occupancy of the memory objects held by the allocator.
    fn utilization(&self) -> AllocatorUtilization;

    /// Return all memory objects to the device.
    fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
        Self: Sized;
}

/// One of the allocators.
#[derive(Debug)]
pub enum AllocatorFlavor<T> {
    /// Dedicated allocator.
    Dedicated(DedicatedAllocator<T>),
    /// Linear allocator.
    Linear(LinearAllocator<T>),
    /// Pool allocator.
    Pool(PoolAllocator<T>),
    /// Default allocator.
    Default(DefaultAllocator<T>),
}

macro_rules! any_allocator {
    ($self:ident, $allocator:ident => $expr:expr) => {{
        use self::AllocatorFlavor::*;
        match $self {
            Dedicated($allocator) => $expr,
            Linear($allocator) => $expr,
            Pool($allocator) => $expr,
            Default($allocator) => $expr,
        }
    }};
}

impl<T> Allocator<T> for AllocatorFlavor<T>
where
    T: Copy + Eq + std::fmt::Debug,
{
    fn kind(&self) -> Kind {
        any_allocator!(self, allocator => Allocator::<T>::kind(allocator))
    }

    fn allocate<D>(&mut self, device: &D, info: AllocateInfo) -> Result<View<T>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        any_allocator!(self, allocator => Allocator::<T>::allocate(allocator, device, info))
    }

    fn free<D>(&mut self, device: &D, view: View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        any_allocator!(self, allocator => Allocator::<T>::free(allocator, device, view))
    }

    fn map<D>(&mut self, device: &D, view: &mut View<T>) -> Result<NonNull<u8>, MemoryError>
    where
        D: Device<Memory = T>,
    {
        any_allocator!(self, allocator => Allocator::<T>::map(allocator, device, view))
    }

    fn unmap<D>(&mut self, device: &D, view: &mut View<T>) -> Result<(), MemoryError>
    where
        D: Device<Memory = T>,
    {
        any_allocator!(self, allocator => Allocator::<T>::unmap(allocator, device, view))
    }

    fn utilization(&self) -> AllocatorUtilization {
        any_allocator!(self, allocator => Allocator::<T>::utilization(allocator))
    }

    fn dispose<D>(self, device: &D)
    where
        D: Device<Memory = T>,
    {
        any_allocator!(self, allocator => Allocator::<T>::dispose(allocator, device))
    }
}

impl<T> From<DedicatedAllocator<T>> for AllocatorFlavor<T> {
    fn from(allocator: DedicatedAllocator<T>) -> Self {
        AllocatorFlavor::Dedicated(allocator)
    }
}

impl<T> From<LinearAllocator<T>> for AllocatorFlavor<T> {
    fn from(allocator: LinearAllocator<T>) -> Self {
        AllocatorFlavor::Linear(allocator)
    }
}

impl<T> From<PoolAllocator<T>> for AllocatorFlavor<T> {
    fn from(allocator: PoolAllocator<T>) -> Self {
        AllocatorFlavor::Pool(allocator)
    }
}

impl<T> From<DefaultAllocator<T>> for AllocatorFlavor<T> {
    fn from(allocator: DefaultAllocator<T>) -> Self {
        AllocatorFlavor::Default(allocator)
    }
}
