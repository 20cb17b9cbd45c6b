use allocator_api2::alloc::Allocator;
use log::trace;
use std::{
    alloc::{ handle_alloc_error, Layout },
    cell::Cell,
    ptr::NonNull
};

// Reference counts for a single managed object. One block is shared by every
// SharedPtr and WeakPtr that points at the object, and none of them own it
// individually. Counts are plain cells: handles are !Send + !Sync.
#[derive(Debug)]
pub(crate) struct ControlBlock {
    strong: Cell<usize>,
    weak: Cell<usize>
}

/// Which counter a release path just decremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Released {
    Strong,
    Weak
}

/// What the releasing handle has to free after its decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposal {
    Retain,
    Object,
    Block,
    ObjectAndBlock
}

impl ControlBlock {
    fn new() -> Self {
        Self { strong: Cell::new(1), weak: Cell::new(0) }
    }

    /// Allocate a fresh block with strong = 1, weak = 0.
    pub(crate) fn allocate_in<A>(alloc: &A) -> NonNull<Self>
    where A: Allocator
    {
        let layout = Layout::new::<Self>();
        let rep = match alloc.allocate(layout) {
            Ok(p) => p.cast::<Self>(),
            Err(_) => handle_alloc_error(layout)
        };
        unsafe { rep.as_ptr().write(Self::new()) };
        trace!("control block {:p} created", rep);
        rep
    }

    /// # Safety
    /// `rep` must come from `allocate_in` with an equivalent allocator, and
    /// both counts must have reached zero.
    pub(crate) unsafe fn deallocate_in<A>(rep: NonNull<Self>, alloc: &A)
    where A: Allocator
    {
        debug_assert!(rep.as_ref().strong.get() == 0 && rep.as_ref().weak.get() == 0,
            "Control block freed while still referenced");
        std::ptr::drop_in_place(rep.as_ptr());
        alloc.deallocate(rep.cast(), Layout::new::<Self>());
        trace!("control block {:p} destroyed", rep);
    }

    pub(crate) fn strong(&self) -> usize { self.strong.get() }
    pub(crate) fn weak(&self) -> usize { self.weak.get() }

    pub(crate) fn increment_strong(&self) { self.strong.set(self.strong.get() + 1) }
    pub(crate) fn increment_weak(&self) { self.weak.set(self.weak.get() + 1) }

    pub(crate) fn decrement_strong(&self) {
        debug_assert!(self.strong.get() > 0, "Strong count decremented below zero");
        self.strong.set(self.strong.get() - 1)
    }

    pub(crate) fn decrement_weak(&self) {
        debug_assert!(self.weak.get() > 0, "Weak count decremented below zero");
        self.weak.set(self.weak.get() - 1)
    }

    /// Evaluated after a release path has decremented its counter. A weak
    /// release never frees the object, only the block.
    pub(crate) fn disposal(&self, released: Released) -> Disposal {
        match (released, self.strong(), self.weak()) {
            (Released::Strong, 0, 0) => Disposal::ObjectAndBlock,
            (Released::Strong, 0, _) => Disposal::Object,
            (Released::Weak, 0, 0) => Disposal::Block,
            _ => Disposal::Retain
        }
    }
}

// The object/block pointer pair carried by a non-empty handle. Keeping both
// in one Option makes "target is null iff block is null" structural.
pub(crate) struct RawParts<T> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) rep: NonNull<ControlBlock>
}

impl<T> Clone for RawParts<T> {
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for RawParts<T> {}

impl<T> RawParts<T> {
    /// Valid for as long as the handle holding these parts holds its count.
    pub(crate) fn counts(&self) -> &ControlBlock { unsafe { self.rep.as_ref() } }
}
