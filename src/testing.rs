// Helpers shared by the unit tests of each module.
use allocator_api2::alloc::{ AllocError, Allocator, Global };
use std::{
    alloc::Layout,
    cell::Cell,
    ptr::NonNull,
    rc::Rc
};

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Counts live allocations so tests can check that nothing leaks.
#[derive(Debug, Clone, Default)]
pub(crate) struct TrackingAllocator {
    live: Rc<Cell<usize>>,
    total: Rc<Cell<usize>>
}

impl TrackingAllocator {
    pub(crate) fn new() -> Self { Self::default() }
    pub(crate) fn live(&self) -> usize { self.live.get() }
    pub(crate) fn total(&self) -> usize { self.total.get() }
}

unsafe impl Allocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let out = Global.allocate(layout)?;
        self.live.set(self.live.get() + 1);
        self.total.set(self.total.get() + 1);
        Ok(out)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.set(self.live.get() - 1);
        Global.deallocate(ptr, layout)
    }
}

// Bumps a shared counter when dropped.
#[derive(Debug)]
pub(crate) struct DropCounter {
    pub(crate) value: i32,
    drops: Rc<Cell<usize>>
}

impl DropCounter {
    pub(crate) fn new(value: i32, drops: &Rc<Cell<usize>>) -> Self {
        Self { value, drops: drops.clone() }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}
