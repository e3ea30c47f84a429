//! This module holds every filesystem system call, split into the plain
//! calls and the extended control call.
//!
//! ## System Calls
//!
//! [`FsContext`](crate::cellfs::context::FsContext) has a method per system
//! call. They return `CELL_OK` or a guest error code from
//! [`CellError`](crate::interface::CellError); results travel through guest
//! pointers.

// Unwraps a result or returns the logged guest error code from the enclosing
// syscall
macro_rules! fs_try {
    ($expr:expr, $syscall:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => return $crate::cellfs::error::FsError::from(e).to_syscall_error($syscall),
        }
    };
}

pub mod fcntl_calls;
pub mod fs_calls;
pub mod fs_constants;
pub use fs_constants::*;
