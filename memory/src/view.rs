use {
    crate::{error::MemoryError, memory::Memory, usage::MemoryType},
    relevant::Relevant,
    std::{fmt::Debug, ops::Range},
};

/// Range of memory returned by an allocator.
///
/// Must be returned to the allocator it was obtained from.
/// Dropping a view without doing so is reported.
#[derive(Debug)]
pub struct View<T> {
    flavor: Flavor<T>,
    memory_type: MemoryType,
    offset: u64,
    size: u64,
}

#[derive(derivative::Derivative)]
#[derivative(Debug)]
enum Flavor<T> {
    /// Owns whole memory object.
    Dedicated(Memory<T>),

    /// Points into memory object owned by an allocator.
    Weak {
        raw: T,
        #[derivative(Debug = "ignore")]
        relevant: Relevant,
    },
}

impl<T> View<T>
where
    T: Copy + Debug,
{
    pub(crate) fn dedicated(memory: Memory<T>) -> Self {
        View {
            memory_type: memory.memory_type(),
            offset: 0,
            size: memory.size(),
            flavor: Flavor::Dedicated(memory),
        }
    }

    pub(crate) fn weak(raw: T, memory_type: MemoryType, offset: u64, size: u64) -> Self {
        View {
            flavor: Flavor::Weak {
                raw,
                relevant: Relevant,
            },
            memory_type,
            offset,
            size,
        }
    }

    /// Get raw memory object the view points into.
    pub fn raw(&self) -> T {
        match &self.flavor {
            Flavor::Dedicated(memory) => memory.raw(),
            Flavor::Weak { raw, .. } => *raw,
        }
    }

    /// Offset of the view inside memory object.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the view. Includes alignment padding.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Range of the view inside memory object.
    pub fn range(&self) -> Range<u64> {
        self.offset..self.offset + self.size
    }

    /// Memory type of the memory object.
    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    /// Check if view owns its memory object.
    pub fn is_dedicated(&self) -> bool {
        match self.flavor {
            Flavor::Dedicated(_) => true,
            Flavor::Weak { .. } => false,
        }
    }

    pub(crate) fn memory_mut(&mut self) -> Option<&mut Memory<T>> {
        match &mut self.flavor {
            Flavor::Dedicated(memory) => Some(memory),
            Flavor::Weak { .. } => None,
        }
    }

    /// Error reported when the view is not known to an allocator.
    pub(crate) fn unknown(&self) -> MemoryError {
        MemoryError::UnknownView {
            offset: self.offset,
            end: self.offset + self.size,
            memory_type: self.memory_type,
        }
    }

    /// Mark view as returned.
    /// Yields owned memory object of the dedicated view.
    pub(crate) fn release(self) -> Option<Memory<T>> {
        match self.flavor {
            Flavor::Dedicated(memory) => Some(memory),
            Flavor::Weak { relevant, .. } => {
                relevant.dispose();
                None
            }
        }
    }

    /// Release view that can't be freed by the allocator it was given to.
    pub(crate) fn reject(self) -> MemoryError {
        let error = self.unknown();
        log::error!("{}", error);
        if let Some(memory) = self.release() {
            memory.leak();
        }
        error
    }
}
