
mod allocator;
