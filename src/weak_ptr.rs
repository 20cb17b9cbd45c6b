use allocator_api2::alloc::{ Allocator, Global };
use crate::{
    control_block::{ ControlBlock, Disposal, RawParts, Released },
    shared_ptr::SharedPtr
};
use std::{
    fmt::{ Debug, Display },
    ptr
};

/// Non-owning handle to an object managed by [`SharedPtr`].
///
/// A `WeakPtr` keeps the control block alive but never the object. Access goes
/// through [`WeakPtr::lock`], which hands back an empty `SharedPtr` once the
/// object is gone.
pub struct WeakPtr<T, A = Global>
where A: Allocator + Clone
{
    _inner: Option<RawParts<T>>,
    _alloc: A
}

impl<T> WeakPtr<T, Global> {
    pub fn new() -> Self { Self::new_in(Global) }
}

impl<T, A> WeakPtr<T, A>
where A: Allocator + Clone
{
    pub fn new_in(alloc: A) -> Self {
        Self { _inner: None, _alloc: alloc }
    }

    // Observing an empty SharedPtr gives an empty WeakPtr
    pub(crate) fn from_shared(shared: &SharedPtr<T, A>) -> Self {
        let inner = shared.raw_parts();
        if let Some(parts) = inner {
            parts.counts().increment_weak();
        }
        Self { _inner: inner, _alloc: shared.allocator().clone() }
    }

    /// True once the last `SharedPtr` has released the object, or if this
    /// handle is empty.
    pub fn expired(&self) -> bool {
        self._inner.map_or(true, |p| p.counts().strong() == 0)
    }

    pub fn use_count(&self) -> usize { self._inner.map_or(0, |p| p.counts().strong()) }
    pub fn weak_count(&self) -> usize { self._inner.map_or(0, |p| p.counts().weak()) }

    /// Promote to a `SharedPtr`, or an empty one if the object is gone.
    pub fn lock(&self) -> SharedPtr<T, A> {
        match self.expired() {
            true => SharedPtr::empty_in(self._alloc.clone()),
            false => SharedPtr::from_weak(self)
                .unwrap_or_else(|_| SharedPtr::empty_in(self._alloc.clone()))
        }
    }

    pub fn reset(&mut self) { self.release() }

    pub fn swap(&mut self, other: &mut Self) { std::mem::swap(self, other) }

    pub fn take(&mut self) -> Self {
        let empty = Self::new_in(self._alloc.clone());
        std::mem::replace(self, empty)
    }

    // May dangle once expired. Only meant for identity checks.
    pub fn as_ptr(&self) -> *const T {
        self._inner.map_or(ptr::null(), |p| p.ptr.as_ptr() as *const T)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self._inner.map(|p| p.rep) == other._inner.map(|p| p.rep)
    }

    pub fn allocator(&self) -> &A { &self._alloc }

    pub(crate) fn raw_parts(&self) -> Option<RawParts<T>> { self._inner }

    fn release(&mut self) {
        if let Some(parts) = self._inner.take() {
            parts.counts().decrement_weak();
            if parts.counts().disposal(Released::Weak) == Disposal::Block {
                unsafe { ControlBlock::deallocate_in(parts.rep, &self._alloc) }
            }
        }
    }
}

impl<T, A> Clone for WeakPtr<T, A>
where A: Allocator + Clone
{
    fn clone(&self) -> Self {
        if let Some(parts) = self._inner {
            parts.counts().increment_weak();
        }
        Self { _inner: self._inner, _alloc: self._alloc.clone() }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) { return }
        *self = source.clone();
    }
}

impl<T, A> Drop for WeakPtr<T, A>
where A: Allocator + Clone
{
    fn drop(&mut self) { self.release() }
}

impl<T, A> Default for WeakPtr<T, A>
where A: Allocator + Clone + Default
{
    fn default() -> Self { Self::new_in(A::default()) }
}

impl<T, A> From<&SharedPtr<T, A>> for WeakPtr<T, A>
where A: Allocator + Clone
{
    fn from(value: &SharedPtr<T, A>) -> Self { Self::from_shared(value) }
}

impl<T, A> Debug for WeakPtr<T, A>
where A: Allocator + Clone
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WeakPtr {{ ptr: {:p}, strong: {}, weak: {} }}",
            self.as_ptr(), self.use_count(), self.weak_count())
    }
}

impl<T, A> Display for WeakPtr<T, A>
where T: Display,
      A: Allocator + Clone
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.lock();
        match shared.get() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "None")
        }
    }
}
