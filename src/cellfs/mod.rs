//! This module emulates the guest's filesystem system calls on top of the
//! host filesystem.
//!
//! ## top-level features:
//!
//! - ### Dispatcher:
//!     - The dispatcher receives a guest syscall number and six raw register
//!       values, checks that every register holds a value of the width the
//!       call expects, and calls the method corresponding to the number on
//!       the [`FsContext`](context::FsContext).
//!
//! - ### Context:
//!     - The context bundles the mount table, the object table and the guest
//!       memory accessor. Nothing here is global; several contexts can live
//!       side by side.
//!
//! - ### Mount Table:
//!     - Guest path prefixes such as `/dev_hdd0` map onto host directories.
//!       Lookup is by longest prefix on a component boundary. A mount can be
//!       read-only or case-insensitive and carries the sector and block sizes
//!       reported to the guest.
//!
//! - ### Object Table:
//!     - Open files and directories live in a table indexed by ids in
//!       `[3, 255)`. Objects are either [`FileObject`](objects::FileObject)s,
//!       possibly views into another file, or
//!       [`DirObject`](objects::DirObject)s.
//!
//! - ### System Calls:
//!     - The context has a public method per system call, split into the plain
//!       calls and the extended control call (`fcntl`), which decodes the
//!       command blocks the guest passes by pointer.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod mount;
pub mod objects;
#[macro_use]
pub mod syscalls;

pub use config::{FsConfig, MountConfig};
pub use context::FsContext;
pub use error::{FsError, FsResult};
