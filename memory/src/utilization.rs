use {
    crate::{allocator::Kind, layout::Layout, usage::MemoryType},
    colorful::{core::color_string::CString, Colorful as _},
};

/// Occupancy of one memory object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockUtilization {
    /// Memory type of the block.
    pub memory_type: MemoryType,

    /// Size of the block.
    pub size: u64,

    /// Bytes reserved by allocations, including padding.
    pub blocked: u64,

    /// Bytes actually requested.
    pub used: u64,

    /// Number of allocations placed in the block.
    pub allocations: usize,
}

impl BlockUtilization {
    pub(crate) fn from_layouts<'a>(
        memory_type: MemoryType,
        size: u64,
        layouts: impl IntoIterator<Item = &'a Layout>,
    ) -> Self {
        layouts.into_iter().fold(
            BlockUtilization {
                memory_type,
                size,
                blocked: 0,
                used: 0,
                allocations: 0,
            },
            |mut acc, layout| {
                acc.blocked += layout.size;
                acc.used += layout.used_size;
                acc.allocations += 1;
                acc
            },
        )
    }

    /// Bytes reserved but not requested.
    pub fn unused(&self) -> u64 {
        self.blocked - self.used
    }
}

/// Occupancy of all memory objects held by an allocator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatorUtilization {
    /// Kind of the allocator.
    pub kind: Kind,

    /// One entry per memory object.
    pub blocks: Vec<BlockUtilization>,
}

impl AllocatorUtilization {
    /// Total size of the memory objects.
    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|block| block.size).sum()
    }

    /// Total bytes reserved by allocations.
    pub fn blocked(&self) -> u64 {
        self.blocks.iter().map(|block| block.blocked).sum()
    }
}

const BAR_WIDTH: usize = 50;

impl BlockUtilization {
    /// Bar cells taken by requested bytes and by alignment padding.
    fn bar_cells(&self) -> (usize, usize) {
        let cells = |bytes: u64| {
            if self.size == 0 {
                0
            } else {
                ((bytes.min(self.size) * BAR_WIDTH as u64) / self.size) as usize
            }
        };
        let used = cells(self.used);
        (used, cells(self.blocked) - used)
    }
}

impl std::fmt::Display for AllocatorUtilization {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(fmt, "!!! {:?} allocator utilization !!!", self.kind)?;
        for (index, block) in self.blocks.iter().enumerate() {
            let (used, padding) = block.bar_cells();
            writeln!(
                fmt,
                "Block {} ({}): [{}{}{}] {}",
                format!("{}", index).magenta(),
                block.memory_type,
                "#".repeat(used).red(),
                "~".repeat(padding).yellow(),
                ".".repeat(BAR_WIDTH - used - padding).green(),
                occupancy(block.blocked, block.size),
            )?;
            writeln!(
                fmt,
                "    blocked: {}b / {}b | unused: {}b | allocations: {}",
                block.blocked,
                block.size,
                block.unused(),
                block.allocations,
            )?;
        }
        Ok(())
    }
}

/// Share of `whole` taken by `part`, colored by how full the block is.
fn occupancy(part: u64, whole: u64) -> CString {
    let percent = if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    };
    let text = format!("{:6.2}%", percent);
    match percent as u64 {
        0..=49 => text.green(),
        50..=89 => text.yellow(),
        _ => text.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_layouts() {
        let layouts = [
            Layout {
                offset: 0,
                size: 64,
                used_size: 60,
            },
            Layout {
                offset: 64,
                size: 128,
                used_size: 100,
            },
        ];
        let block = BlockUtilization::from_layouts(MemoryType::CpuCached, 1024, &layouts);
        assert_eq!(block.blocked, 192);
        assert_eq!(block.used, 160);
        assert_eq!(block.unused(), 32);
        assert_eq!(block.allocations, 2);
    }

    #[test]
    fn renders_every_block() {
        let utilization = AllocatorUtilization {
            kind: Kind::Pool,
            blocks: vec![
                BlockUtilization {
                    memory_type: MemoryType::DeviceLocal,
                    size: 1024,
                    blocked: 512,
                    used: 500,
                    allocations: 3,
                },
                BlockUtilization {
                    memory_type: MemoryType::DeviceLocal,
                    size: 1024,
                    blocked: 0,
                    used: 0,
                    allocations: 0,
                },
            ],
        };
        assert_eq!(utilization.size(), 2048);
        assert_eq!(utilization.blocked(), 512);

        let text = utilization.to_string();
        assert!(text.contains("blocked: 512b / 1024b | unused: 12b | allocations: 3"));
        assert!(text.contains("blocked: 0b / 1024b | unused: 0b | allocations: 0"));
    }

    #[test]
    fn bar_splits_used_and_padding() {
        let block = BlockUtilization {
            memory_type: MemoryType::CpuCoherent,
            size: 1000,
            blocked: 500,
            used: 300,
            allocations: 2,
        };
        assert_eq!(block.bar_cells(), (15, 10));

        let full = BlockUtilization {
            blocked: 1000,
            used: 1000,
            ..block
        };
        assert_eq!(full.bar_cells(), (50, 0));

        let empty = BlockUtilization {
            size: 0,
            blocked: 0,
            used: 0,
            ..block
        };
        assert_eq!(empty.bar_cells(), (0, 0));
        assert!(occupancy(0, 0).to_string().contains("0.00%"));
    }
}
