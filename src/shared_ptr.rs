use allocator_api2::{
    alloc::{ Allocator, Global },
    boxed::Box
};
use crate::{
    control_block::{ ControlBlock, Disposal, RawParts, Released },
    error::ExpiredReferenceError,
    weak_ptr::WeakPtr
};
use log::trace;
use std::{
    alloc::{ handle_alloc_error, Layout },
    fmt::{ Debug, Display },
    marker::PhantomData,
    mem::size_of,
    ops::Deref,
    ptr::{ self, NonNull }
};

// Zero-sized objects get a dangling pointer and never touch the allocator,
// same as Box.
fn allocate_object_in<T, A>(data: T, alloc: &A) -> NonNull<T>
where A: Allocator
{
    let ptr = if size_of::<T>() == 0 {
        NonNull::dangling()
    } else {
        let layout = Layout::new::<T>();
        match alloc.allocate(layout) {
            Ok(p) => p.cast::<T>(),
            Err(_) => handle_alloc_error(layout)
        }
    };
    unsafe { ptr.as_ptr().write(data) };
    ptr
}

unsafe fn destroy_object_in<T, A>(ptr: NonNull<T>, alloc: &A)
where A: Allocator
{
    trace!("managed object {:p} destroyed", ptr);
    ptr::drop_in_place(ptr.as_ptr());
    if size_of::<T>() != 0 {
        alloc.deallocate(ptr.cast(), Layout::new::<T>());
    }
}

/// Shorthand for `SharedPtr::make_shared`.
pub fn make_shared<T>(data: T) -> SharedPtr<T, Global> { SharedPtr::make_shared(data) }

/// Strong, reference counted handle to a managed object.
///
/// Every non-empty `SharedPtr` holds one strong count on a shared control block.
/// When the last one is released the object is dropped; the control block itself
/// lives on until the last [`WeakPtr`] is gone as well.
///
/// Handles are neither `Send` nor `Sync`: counts are not atomic. Cycles of
/// `SharedPtr`s are never collected and leak.
pub struct SharedPtr<T, A = Global>
where A: Allocator + Clone
{
    _inner: Option<RawParts<T>>,
    _alloc: A,
    _data: PhantomData<T>
}

impl<T> SharedPtr<T, Global> {
    pub fn new_empty() -> Self { Self::empty_in(Global) }

    /// Move `data` into a fresh allocation owned by a new control block.
    pub fn make_shared(data: T) -> Self { Self::make_shared_in(data, Global) }

    /// Run a fallible constructor, wrapping its output on success. Nothing is
    /// allocated if the constructor fails.
    pub fn try_make_shared_with<E, F>(f: F) -> Result<Self, E>
    where F: FnOnce() -> Result<T, E>
    {
        Self::try_make_shared_with_in(f, Global)
    }
}

impl<T, A> SharedPtr<T, A>
where A: Allocator + Clone
{
    pub fn empty_in(alloc: A) -> Self {
        Self { _inner: None, _alloc: alloc, _data: PhantomData }
    }

    pub fn make_shared_in(data: T, alloc: A) -> Self {
        let ptr = allocate_object_in(data, &alloc);
        Self::adopt(ptr, alloc)
    }

    pub fn try_make_shared_with_in<E, F>(f: F, alloc: A) -> Result<Self, E>
    where F: FnOnce() -> Result<T, E>
    {
        let data = f()?;
        Ok(Self::make_shared_in(data, alloc))
    }

    /// Take ownership of a boxed object. A new control block is created for it.
    pub fn from_box(data: Box<T, A>) -> Self {
        let (ptr, alloc) = Box::into_raw_with_allocator(data);
        // Box never hands out a null pointer
        Self::adopt(unsafe { NonNull::new_unchecked(ptr) }, alloc)
    }

    /// Take ownership of a raw object pointer. A null pointer gives an empty handle.
    ///
    /// # Safety
    /// `ptr` must be null, or point to a live `T` allocated by `alloc` with
    /// `Layout::new::<T>()` that nothing else owns.
    pub unsafe fn from_raw_in(ptr: *mut T, alloc: A) -> Self {
        match NonNull::new(ptr) {
            Some(p) => Self::adopt(p, alloc),
            None => Self::empty_in(alloc)
        }
    }

    fn adopt(ptr: NonNull<T>, alloc: A) -> Self {
        let rep = ControlBlock::allocate_in(&alloc);
        Self { _inner: Some(RawParts { ptr, rep }), _alloc: alloc, _data: PhantomData }
    }

    /// Promote a weak pointer, failing if its object has already been destroyed.
    /// `lock` is the non-failing alternative.
    pub fn from_weak(weak: &WeakPtr<T, A>) -> Result<Self, ExpiredReferenceError> {
        if weak.expired() {
            return Err(ExpiredReferenceError);
        }
        match weak.raw_parts() {
            Some(parts) => {
                parts.counts().increment_strong();
                Ok(Self { _inner: Some(parts), _alloc: weak.allocator().clone(), _data: PhantomData })
            },
            None => Err(ExpiredReferenceError)
        }
    }

    /// Release this handle's strong count, leaving it empty.
    pub fn reset(&mut self) { self.release() }

    /// Release this handle's strong count and take ownership of `data` instead.
    pub fn reset_with(&mut self, data: Box<T, A>) {
        // an owned box never aliases the object held here
        let (ptr, alloc) = Box::into_raw_with_allocator(data);
        self.replace(NonNull::new(ptr), alloc)
    }

    /// Raw form of `reset_with`. A null pointer just releases the handle, and
    /// the pointer currently held is ignored. Zero-sized objects share one
    /// dangling address, so for them the pointer is always adopted.
    ///
    /// # Safety
    /// Same requirements as `from_raw_in`, for this handle's allocator.
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        if size_of::<T>() != 0 && ptr as *const T == self.as_ptr() { return }
        let alloc = self._alloc.clone();
        self.replace(NonNull::new(ptr), alloc)
    }

    fn replace(&mut self, ptr: Option<NonNull<T>>, alloc: A) {
        self.release();
        self._alloc = alloc;
        if let Some(p) = ptr {
            self._inner = Some(RawParts { ptr: p, rep: ControlBlock::allocate_in(&self._alloc) });
        }
    }

    /// Number of strong handles sharing this object, or 0 for an empty handle.
    pub fn use_count(&self) -> usize { self._inner.map_or(0, |p| p.counts().strong()) }
    pub fn weak_count(&self) -> usize { self._inner.map_or(0, |p| p.counts().weak()) }
    pub fn unique(&self) -> bool { self.use_count() == 1 }

    pub fn is_some(&self) -> bool { self._inner.is_some() }
    pub fn is_none(&self) -> bool { self._inner.is_none() }

    pub fn get(&self) -> Option<&T> {
        self._inner.map(|p| unsafe { p.ptr.as_ref() })
    }

    /// Mutable access, only while this is the sole strong handle and no weak
    /// handles exist.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.use_count() != 1 || self.weak_count() != 0 { return None }
        let mut ptr = self._inner?.ptr;
        Some(unsafe { ptr.as_mut() })
    }

    /// Address of the managed object, or null.
    pub fn as_ptr(&self) -> *const T {
        self._inner.map_or(ptr::null(), |p| p.ptr.as_ptr() as *const T)
    }

    /// Whether both handles share a control block. Two empty handles compare equal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self._inner.map(|p| p.rep) == other._inner.map(|p| p.rep)
    }

    pub fn swap(&mut self, other: &mut Self) { std::mem::swap(self, other) }

    /// Move the contents out, leaving this handle empty. Counts are untouched.
    pub fn take(&mut self) -> Self {
        let empty = Self::empty_in(self._alloc.clone());
        std::mem::replace(self, empty)
    }

    pub fn downgrade(&self) -> WeakPtr<T, A> { WeakPtr::from_shared(self) }

    pub fn allocator(&self) -> &A { &self._alloc }

    pub(crate) fn raw_parts(&self) -> Option<RawParts<T>> { self._inner }

    fn release(&mut self) {
        if let Some(parts) = self._inner.take() {
            parts.counts().decrement_strong();
            match parts.counts().disposal(Released::Strong) {
                Disposal::ObjectAndBlock => unsafe {
                    destroy_object_in(parts.ptr, &self._alloc);
                    ControlBlock::deallocate_in(parts.rep, &self._alloc);
                },
                // weak handles still see the block, the object's own drop may
                // release the last of them
                Disposal::Object => unsafe { destroy_object_in(parts.ptr, &self._alloc) },
                Disposal::Block | Disposal::Retain => ()
            }
        }
    }
}

impl<T, A> Clone for SharedPtr<T, A>
where A: Allocator + Clone
{
    fn clone(&self) -> Self {
        if let Some(parts) = self._inner {
            parts.counts().increment_strong();
        }
        Self { _inner: self._inner, _alloc: self._alloc.clone(), _data: PhantomData }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.ptr_eq(source) { return }
        // take the new count before releasing the old one, source may be owned
        // by the object we are about to drop
        *self = source.clone();
    }
}

impl<T, A> Drop for SharedPtr<T, A>
where A: Allocator + Clone
{
    fn drop(&mut self) { self.release() }
}

impl<T, A> Default for SharedPtr<T, A>
where A: Allocator + Clone + Default
{
    fn default() -> Self { Self::empty_in(A::default()) }
}

impl<T, A> Deref for SharedPtr<T, A>
where A: Allocator + Clone
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(v) => v,
            None => panic!("Tried to dereference an empty SharedPtr")
        }
    }
}

impl<T, A> From<Box<T, A>> for SharedPtr<T, A>
where A: Allocator + Clone
{
    fn from(value: Box<T, A>) -> Self { Self::from_box(value) }
}

impl<T, A> TryFrom<&WeakPtr<T, A>> for SharedPtr<T, A>
where A: Allocator + Clone
{
    type Error = ExpiredReferenceError;
    fn try_from(value: &WeakPtr<T, A>) -> Result<Self, Self::Error> { Self::from_weak(value) }
}

impl<T, A> Debug for SharedPtr<T, A>
where T: Debug,
      A: Allocator + Clone
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "SharedPtr {{ data: {:?}, strong: {}, weak: {} }}",
                v, self.use_count(), self.weak_count()),
            None => write!(f, "SharedPtr {{ null }}")
        }
    }
}

impl<T, A> Display for SharedPtr<T, A>
where T: Display,
      A: Allocator + Clone
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "None")
        }
    }
}
