//! Mount table: guest path prefixes mapped onto host directories.
//!
//! The table is built once from an [`FsConfig`] before the first syscall and
//! never changes afterwards, so lookups take no lock.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use crate::cellfs::config::{FsConfig, MountConfig};
use crate::cellfs::error::{FsError, FsResult};
use crate::cellfs::syscalls::fs_constants::*;
use crate::interface::{self, RustPathBuf};

/// Index of a mount in its [`MountTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(pub usize);

#[derive(Debug, Clone)]
pub struct MountPoint {
    pub root: Vec<u8>,
    pub host_root: RustPathBuf,
    pub case_sensitive: bool,
    pub read_only: bool,
    pub sector_size: u64,
    pub block_size: u64,
}

impl MountPoint {
    fn from_config(cfg: &MountConfig) -> FsResult<MountPoint> {
        let root = cfg.path.as_bytes();
        if root.len() < 2 || root[0] != b'/' {
            return Err(FsError::Config(format!("mount path {:?} must be absolute", cfg.path)));
        }
        if root.len() > CELL_FS_MAX_MP_LENGTH {
            return Err(FsError::Config(format!("mount path {:?} is longer than {} bytes", cfg.path, CELL_FS_MAX_MP_LENGTH)));
        }
        if root.ends_with(b"/") || root.windows(2).any(|w| w == b"//") {
            return Err(FsError::Config(format!("mount path {:?} is not normalized", cfg.path)));
        }
        if cfg.sector_size == 0 || cfg.block_size == 0 {
            return Err(FsError::Config(format!("mount {:?} has a zero block size", cfg.path)));
        }
        Ok(MountPoint {
            root: root.to_vec(),
            host_root: cfg.host_root.clone(),
            case_sensitive: cfg.case_sensitive,
            read_only: cfg.read_only,
            sector_size: cfg.sector_size,
            block_size: cfg.block_size,
        })
    }

    // Does `path` lie under this root, on a component boundary
    fn covers(&self, path: &[u8]) -> bool {
        if path.len() < self.root.len() {
            return false;
        }
        let (prefix, rest) = path.split_at(self.root.len());
        let same = if self.case_sensitive { prefix == &self.root[..] } else { prefix.eq_ignore_ascii_case(&self.root) };
        same && (rest.is_empty() || rest[0] == b'/')
    }
}

#[derive(Debug)]
pub struct MountTable {
    mounts: Vec<MountPoint>,
}

/// Collapses repeated slashes, `.` and `..`. The result is absolute and has
/// no trailing slash (except for `/` itself).
pub fn normalize(path: &[u8]) -> FsResult<Vec<u8>> {
    if path.is_empty() || path[0] != b'/' {
        return Err(FsError::NotFound);
    }
    if path.len() > CELL_FS_MAX_FS_PATH_LENGTH {
        return Err(FsError::NameTooLong);
    }
    let mut parts: Vec<&[u8]> = Vec::new();
    for comp in path.split(|&b| b == b'/') {
        match comp {
            b"" | b"." => {}
            b".." => {
                parts.pop();
            }
            name if name.len() > CELL_FS_MAX_FS_FILE_NAME_LENGTH => return Err(FsError::NameTooLong),
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        return Ok(b"/".to_vec());
    }
    let mut out = Vec::with_capacity(path.len());
    for part in parts {
        out.push(b'/');
        out.extend_from_slice(part);
    }
    Ok(out)
}

impl MountTable {
    /// Validates every mount and creates missing host roots.
    pub fn new(config: &FsConfig) -> FsResult<MountTable> {
        let mut mounts: Vec<MountPoint> = Vec::with_capacity(config.mounts.len());
        for cfg in &config.mounts {
            let mp = MountPoint::from_config(cfg)?;
            if mounts.iter().any(|m| m.root.eq_ignore_ascii_case(&mp.root)) {
                return Err(FsError::Config(format!("mount path {:?} registered twice", cfg.path)));
            }
            interface::makedir_all(&mp.host_root)?;
            log::trace!("mounted {} on {}", cfg.path, mp.host_root.display());
            mounts.push(mp);
        }
        Ok(MountTable { mounts })
    }

    /// Longest registered root that `path` lies under.
    pub fn resolve(&self, path: &[u8]) -> Option<MountId> {
        self.mounts
            .iter()
            .enumerate()
            .filter(|(_, m)| m.covers(path))
            .max_by_key(|(_, m)| m.root.len())
            .map(|(i, _)| MountId(i))
    }

    pub fn get(&self, id: MountId) -> Option<&MountPoint> {
        self.mounts.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Maps a guest path onto the host. On case-insensitive mounts a
    /// component that does not exist verbatim is looked up in the host
    /// directory ignoring ASCII case.
    pub fn host_path(&self, path: &[u8]) -> FsResult<(MountId, RustPathBuf)> {
        let norm = normalize(path)?;
        let id = self.resolve(&norm).ok_or(FsError::NotFound)?;
        let mp = &self.mounts[id.0];

        let mut host = mp.host_root.clone();
        let rest = &norm[mp.root.len()..];
        for comp in rest.split(|&b| b == b'/').filter(|c| !c.is_empty()) {
            let verbatim = host.join(OsStr::from_bytes(comp));
            if mp.case_sensitive || interface::pathexists(&verbatim) {
                host = verbatim;
                continue;
            }
            let found = interface::listdir(&host)
                .ok()
                .and_then(|names| names.into_iter().find(|n| n.as_bytes().eq_ignore_ascii_case(comp)));
            host = match found {
                Some(name) => host.join(name),
                None => verbatim,
            };
        }
        Ok((id, host))
    }
}
