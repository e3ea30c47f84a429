#![allow(dead_code)]

use crate::cellfs::config::FsConfig;
use crate::cellfs::error::FsResult;
use crate::cellfs::mount::{MountId, MountPoint, MountTable};
use crate::cellfs::objects::ObjectTable;
use crate::cellfs::syscalls::fs_constants::*;
use crate::interface::{GuestMemory, RustRfc};

/// Everything a syscall needs, passed explicitly. Cloning is cheap and
/// every clone sees the same tables.
#[derive(Clone)]
pub struct FsContext {
    pub mounts: RustRfc<MountTable>,
    pub objects: RustRfc<ObjectTable>,
    pub mem: RustRfc<dyn GuestMemory>,
}

impl FsContext {
    pub fn new(config: &FsConfig, mem: RustRfc<dyn GuestMemory>) -> FsResult<FsContext> {
        let mounts = MountTable::new(config)?;
        Ok(FsContext::with_tables(RustRfc::new(mounts), RustRfc::new(ObjectTable::new()), mem))
    }

    pub fn with_tables(mounts: RustRfc<MountTable>, objects: RustRfc<ObjectTable>, mem: RustRfc<dyn GuestMemory>) -> FsContext {
        FsContext { mounts, objects, mem }
    }

    pub fn mount(&self, id: MountId) -> Option<&MountPoint> {
        self.mounts.get(id)
    }

    // (sector size, block size), falling back to the defaults for a stale id
    pub fn block_sizes(&self, id: MountId) -> (u64, u64) {
        self.mount(id).map_or((DEFAULT_SECTOR_SIZE, DEFAULT_BLOCK_SIZE), |mp| (mp.sector_size, mp.block_size))
    }
}
