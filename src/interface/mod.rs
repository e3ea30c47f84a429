//! Module definitions for the RustCellFS interface
//!
//! ## Interface Module
//!
//! Containment layer between the emulated filesystem and everything it touches
//! on the outside: host files and directories, guest memory, and the binary
//! records exchanged with guest code.
//!
//! Host and guest access is imported only via `use` statements within these
//! files, so the rest of the crate can be reviewed without chasing `std::fs`
//! calls or raw guest pointers.

pub mod errnos;
mod file;
pub mod memory;
mod misc;
pub mod types;
pub use errnos::*;
pub use file::*;
pub use memory::*;
pub use misc::*;
pub use types::*;
