//! GPU memory sub-allocation.
//!
//! Turns a few large memory objects obtained from the device into many
//! smaller ranges for buffers and images.
//! Four strategies are provided: `DedicatedAllocator`, `LinearAllocator`,
//! `PoolAllocator` and the composing `DefaultAllocator`.
//! `Allocators` keeps allocator instances in an arena and hands out
//! `ScopedView`s that return their range on drop.

#![forbid(overflowing_literals)]
#![warn(missing_copy_implementations)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![warn(path_statements)]
#![warn(trivial_bounds)]
#![warn(type_alias_bounds)]
#![warn(unconditional_recursion)]
#![warn(while_true)]
#![warn(unused)]
#![warn(bad_style)]
#![warn(future_incompatible)]
#![warn(rust_2018_idioms)]
#![deny(unused_must_use)]

mod allocator;
mod device;
mod error;
mod layout;
mod memory;
mod registry;
mod usage;
mod util;
mod utilization;
mod view;

#[cfg(feature = "ash")]
mod impls;

#[cfg(test)]
mod test;

pub use crate::{
    allocator::{
        AllocateInfo, Allocator, AllocatorFlavor, DedicatedAllocator, DefaultAllocator,
        DefaultConfig, Kind, LinearAllocator, LinearConfig, PoolAllocator, PoolBlock, PoolConfig,
    },
    device::Device,
    error::{AllocationError, MappingError, MemoryError, OutOfMemoryError},
    layout::Layout,
    memory::{Memory, Properties},
    registry::{AllocatorId, Allocators, ScopedView},
    usage::{find_memory_type, MemoryType},
    utilization::{AllocatorUtilization, BlockUtilization},
    view::View,
};

#[cfg(feature = "ash")]
pub use crate::impls::ash::AshDevice;
