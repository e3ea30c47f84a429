//! Mount configuration.
//!
//! The mount table is described by an [`FsConfig`], either built in code with
//! [`FsConfig::ps3_default`] or loaded from JSON:
//!
//! ```json
//! { "mounts": [ { "path": "/dev_hdd0", "host_root": "/srv/hdd0" },
//!               { "path": "/dev_flash", "host_root": "/srv/flash", "read_only": true } ] }
//! ```

use serde::{Deserialize, Serialize};

use crate::cellfs::error::FsResult;
use crate::cellfs::syscalls::fs_constants::*;
use crate::interface::{self, RustPath, RustPathBuf};

fn default_true() -> bool {
    true
}

fn default_sector_size() -> u64 {
    DEFAULT_SECTOR_SIZE
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Guest prefix, e.g. `/dev_hdd0`.
    pub path: String,
    pub host_root: RustPathBuf,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_sector_size")]
    pub sector_size: u64,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
}

impl MountConfig {
    pub fn new(path: &str, host_root: &RustPath) -> MountConfig {
        MountConfig {
            path: path.to_string(),
            host_root: host_root.to_path_buf(),
            case_sensitive: true,
            read_only: false,
            sector_size: DEFAULT_SECTOR_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    pub fn read_only(mut self) -> MountConfig {
        self.read_only = true;
        self
    }

    pub fn case_insensitive(mut self) -> MountConfig {
        self.case_sensitive = false;
        self
    }

    pub fn block_sizes(mut self, sector_size: u64, block_size: u64) -> MountConfig {
        self.sector_size = sector_size;
        self.block_size = block_size;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsConfig {
    pub mounts: Vec<MountConfig>,
}

impl FsConfig {
    pub fn from_json(data: &[u8]) -> FsResult<FsConfig> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn load(path: &RustPath) -> FsResult<FsConfig> {
        let data = interface::readfile_to_new_bytes(path)?;
        FsConfig::from_json(&data)
    }

    pub fn to_json(&self) -> FsResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// The console's standard device layout, each device rooted in its own
    /// directory under `base`.
    pub fn ps3_default(base: &RustPath) -> FsConfig {
        let dev = |name: &str| base.join(name);
        FsConfig {
            mounts: vec![
                MountConfig::new("/dev_hdd0", &dev("dev_hdd0")),
                MountConfig::new("/dev_hdd1", &dev("dev_hdd1")),
                MountConfig::new("/dev_flash", &dev("dev_flash")).read_only(),
                MountConfig::new("/dev_usb000", &dev("dev_usb000")).case_insensitive(),
                MountConfig::new("/dev_bdvd", &dev("dev_bdvd"))
                    .read_only()
                    .block_sizes(BDVD_SECTOR_SIZE, BDVD_SECTOR_SIZE),
                MountConfig::new("/app_home", &dev("app_home")),
                MountConfig::new("/host_root", &dev("host_root")),
            ],
        }
    }
}
