//! Memory types requested by resources.

use crate::{memory::Properties, util::mask_allows};

/// Capability class of the memory an allocation must land in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemoryType {
    /// Full speed device access. No host access.
    DeviceLocal,
    /// Host visible memory.
    CpuAccessible,
    /// Host visible memory that doesn't require flushes.
    CpuCoherent,
    /// Host visible memory cached on the host.
    CpuCached,
    /// Host visible, cached and coherent memory.
    CpuCoherentAndCached,
}

impl MemoryType {
    /// All memory types.
    pub const ALL: [MemoryType; 5] = [
        MemoryType::DeviceLocal,
        MemoryType::CpuAccessible,
        MemoryType::CpuCoherent,
        MemoryType::CpuCached,
        MemoryType::CpuCoherentAndCached,
    ];

    /// Properties memory must have to serve this type.
    pub fn properties(self) -> Properties {
        match self {
            MemoryType::DeviceLocal => Properties::DEVICE_LOCAL,
            MemoryType::CpuAccessible => Properties::HOST_VISIBLE,
            MemoryType::CpuCoherent => Properties::HOST_VISIBLE | Properties::HOST_COHERENT,
            MemoryType::CpuCached => Properties::HOST_VISIBLE | Properties::HOST_CACHED,
            MemoryType::CpuCoherentAndCached => {
                Properties::HOST_VISIBLE | Properties::HOST_CACHED | Properties::HOST_COHERENT
            }
        }
    }

    /// Check if memory of this type can be mapped.
    pub fn host_visible(self) -> bool {
        self.properties().contains(Properties::HOST_VISIBLE)
    }

    /// Name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            MemoryType::DeviceLocal => "device_local",
            MemoryType::CpuAccessible => "cpu_accessible",
            MemoryType::CpuCoherent => "cpu_coherent",
            MemoryType::CpuCached => "cpu_cached",
            MemoryType::CpuCoherentAndCached => "cpu_coherent_and_cached",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.write_str(self.name())
    }
}

/// Find first memory type index allowed by `mask`
/// whose properties contain `required`.
pub fn find_memory_type(types: &[Properties], mask: u32, required: Properties) -> Option<u32> {
    types
        .iter()
        .enumerate()
        .map(|(index, properties)| (index as u32, properties))
        .filter(|&(index, _)| mask_allows(mask, index))
        .find(|(_, properties)| properties.contains(required))
        .map(|(index, _)| index)
}
