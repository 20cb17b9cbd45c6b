//! Reference counted `SharedPtr` / `WeakPtr` handles over a shared control block,
//! allocated through any `allocator_api2` allocator.

pub(crate) mod control_block;
pub mod error;
pub mod shared_ptr;
pub mod weak_ptr;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ExpiredReferenceError;
pub use shared_ptr::{ make_shared, SharedPtr };
pub use weak_ptr::WeakPtr;
