// Internal failure taxonomy of the filesystem layer
//
// Lower layers return FsError; the syscall surface turns it into a guest code
// through `syscall_error` so every guest-visible failure is logged once.

use std::io;
use thiserror::Error;

use crate::interface::{self, CellError, MemoryFault};

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    AlreadyExists,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("bad guest address")]
    Fault(#[from] MemoryFault),
    #[error("no free object identifier")]
    ResourceExhausted,
    #[error("is a directory")]
    IsADirectory,
    #[error("not a directory")]
    NotADirectory,
    #[error("no space left on device")]
    NoSpace,
    #[error("host i/o error: {0}")]
    Io(io::Error),
    #[error("operation not supported")]
    Unsupported,
    #[error("bad object identifier")]
    BadDescriptor,
    #[error("read-only mount")]
    ReadOnly,
    #[error("name too long")]
    NameTooLong,
    #[error("directory not empty")]
    NotEmpty,
    #[error("not an MSELF archive")]
    NotMself,
    #[error("bad mount configuration: {0}")]
    Config(String),
    #[error("cannot parse mount configuration")]
    ConfigParse(#[from] serde_json::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> FsError {
        if let Some(raw) = e.raw_os_error() {
            match raw {
                libc::ENOENT => return FsError::NotFound,
                libc::EEXIST => return FsError::AlreadyExists,
                libc::EACCES | libc::EPERM => return FsError::PermissionDenied,
                libc::EISDIR => return FsError::IsADirectory,
                libc::ENOTDIR => return FsError::NotADirectory,
                libc::ENOSPC | libc::EDQUOT => return FsError::NoSpace,
                libc::EROFS => return FsError::ReadOnly,
                libc::ENAMETOOLONG => return FsError::NameTooLong,
                libc::ENOTEMPTY => return FsError::NotEmpty,
                libc::EINVAL => return FsError::InvalidArgument("rejected by host"),
                libc::EMFILE | libc::ENFILE => return FsError::ResourceExhausted,
                _ => {}
            }
        }
        match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound,
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied,
            io::ErrorKind::InvalidInput => FsError::InvalidArgument("rejected by host"),
            io::ErrorKind::Unsupported => FsError::Unsupported,
            _ => FsError::Io(e),
        }
    }
}

impl FsError {
    pub fn cell_error(&self) -> CellError {
        match self {
            FsError::NotFound => CellError::ENOENT,
            FsError::AlreadyExists => CellError::EEXIST,
            FsError::PermissionDenied => CellError::EACCES,
            FsError::InvalidArgument(_) | FsError::Fault(_) => CellError::EINVAL,
            FsError::ResourceExhausted => CellError::EMFILE,
            FsError::IsADirectory => CellError::EISDIR,
            FsError::NotADirectory => CellError::ENOTDIR,
            FsError::NoSpace => CellError::ENOSPC,
            FsError::Io(_) => CellError::EIO,
            FsError::Unsupported => CellError::ENOTSUP,
            FsError::BadDescriptor => CellError::EBADF,
            FsError::ReadOnly => CellError::EROFS,
            FsError::NameTooLong => CellError::ENAMETOOLONG,
            FsError::NotEmpty => CellError::ENOTEMPTY,
            FsError::NotMself => CellError::ENOTMSELF,
            FsError::Config(_) | FsError::ConfigParse(_) => CellError::EINVAL,
        }
    }

    /// Logs the failure under `syscall` and returns the guest code.
    pub fn to_syscall_error(&self, syscall: &str) -> i32 {
        interface::syscall_error(self.cell_error(), syscall, &self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_errors_classify_by_errno_first() {
        let e: FsError = io::Error::from_raw_os_error(libc::ENOTEMPTY).into();
        assert!(matches!(e, FsError::NotEmpty));
        let e: FsError = io::Error::from_raw_os_error(libc::EROFS).into();
        assert_eq!(e.cell_error(), CellError::EROFS);
        let e: FsError = io::Error::from_raw_os_error(libc::EIO).into();
        assert_eq!(e.cell_error(), CellError::EIO);
    }

    #[test]
    fn host_errors_fall_back_to_kind() {
        let e: FsError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(e.cell_error(), CellError::ENOENT);
        let e: FsError = io::Error::new(io::ErrorKind::Other, "odd").into();
        assert_eq!(e.cell_error(), CellError::EIO);
    }

    #[test]
    fn guest_faults_map_to_einval() {
        let e: FsError = MemoryFault { addr: 0, len: 4 }.into();
        assert_eq!(e.to_syscall_error("read"), CellError::EINVAL.code());
    }
}
