mod dispatcher_tests;
mod fcntl_tests;

use crate::cellfs::syscalls::fs_constants::*;
use crate::cellfs::{FsConfig, FsContext};
use crate::interface::{FlatMemory, GuestAddr, GuestMemory, GuestMemoryExt, RustPathBuf, RustRfc, CELL_OK};

pub const GUEST_BASE: GuestAddr = 0x1_0000;
pub const GUEST_SIZE: usize = 4 << 20;

/// A context over the default device layout rooted in a fresh temporary
/// directory, with flat guest memory for arguments.
pub struct TestFs {
    pub root: tempfile::TempDir,
    pub mem: RustRfc<FlatMemory>,
    pub ctx: FsContext,
}

pub fn setup() -> TestFs {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = tempfile::tempdir().unwrap();
    let mem = RustRfc::new(FlatMemory::new(GUEST_BASE, GUEST_SIZE));
    let ctx = FsContext::new(&FsConfig::ps3_default(root.path()), mem.clone()).unwrap();
    TestFs { root, mem, ctx }
}

impl TestFs {
    /// Host location of a guest path such as `dev_hdd0/save.dat`.
    pub fn host(&self, rel: &str) -> RustPathBuf {
        self.root.path().join(rel)
    }

    /// Copies `s` plus a terminator into guest memory.
    pub fn cstr(&self, s: &str) -> GuestAddr {
        let addr = self.mem.alloc(s.len() + 1).unwrap();
        let mut raw = s.as_bytes().to_vec();
        raw.push(0);
        self.mem.write_bytes(addr, &raw).unwrap();
        addr
    }

    pub fn buf(&self, len: usize) -> GuestAddr {
        self.mem.alloc(len).unwrap()
    }

    pub fn bytes(&self, data: &[u8]) -> GuestAddr {
        let addr = self.buf(data.len());
        self.mem.write_bytes(addr, data).unwrap();
        addr
    }

    pub fn fetch(&self, addr: GuestAddr, len: usize) -> Vec<u8> {
        self.mem.fetch(addr, len).unwrap()
    }

    pub fn u32_at(&self, addr: GuestAddr) -> u32 {
        self.mem.read_u32(addr).unwrap()
    }

    pub fn u64_at(&self, addr: GuestAddr) -> u64 {
        self.mem.read_u64(addr).unwrap()
    }

    /// Opens `path` and returns the id, failing the test on error.
    pub fn open(&self, path: &str, flags: i32) -> u32 {
        let fd = self.buf(4);
        assert_eq!(self.ctx.open_syscall(self.cstr(path), flags, fd, S_IRWA, 0, 0), CELL_OK, "open {}", path);
        self.u32_at(fd)
    }

    pub fn write(&self, id: u32, data: &[u8]) -> u64 {
        let nwrite = self.buf(8);
        assert_eq!(self.ctx.write_syscall(id, self.bytes(data), data.len() as u64, nwrite), CELL_OK);
        self.u64_at(nwrite)
    }

    pub fn read(&self, id: u32, len: usize) -> Vec<u8> {
        let buf = self.buf(len);
        let nread = self.buf(8);
        assert_eq!(self.ctx.read_syscall(id, buf, len as u64, nread), CELL_OK);
        self.fetch(buf, self.u64_at(nread) as usize)
    }
}
