//! This module contains the filesystem system calls.
//!
//! ## Notes:
//!
//! - These calls are methods of [`FsContext`]; see [`cellfs`](crate::cellfs)
//!   for the surrounding object model.
//! - Every call returns `CELL_OK` or a guest error code. Output parameters
//!   are guest pointers, checked before anything observable happens.
//!
//! ## File System Calls
//!
//! - [test_syscall](FsContext::test_syscall)
//! - [open_syscall](FsContext::open_syscall)
//! - [read_syscall](FsContext::read_syscall)
//! - [write_syscall](FsContext::write_syscall)
//! - [close_syscall](FsContext::close_syscall)
//! - [opendir_syscall](FsContext::opendir_syscall)
//! - [readdir_syscall](FsContext::readdir_syscall)
//! - [closedir_syscall](FsContext::closedir_syscall)
//! - [stat_syscall](FsContext::stat_syscall)
//! - [fstat_syscall](FsContext::fstat_syscall)
//! - [mkdir_syscall](FsContext::mkdir_syscall)
//! - [rename_syscall](FsContext::rename_syscall)
//! - [rmdir_syscall](FsContext::rmdir_syscall)
//! - [unlink_syscall](FsContext::unlink_syscall)
//! - [utime_syscall](FsContext::utime_syscall)
//! - [lseek_syscall](FsContext::lseek_syscall)
//! - [fget_block_size_syscall](FsContext::fget_block_size_syscall)
//! - [get_block_size_syscall](FsContext::get_block_size_syscall)
//! - [truncate_syscall](FsContext::truncate_syscall)
//! - [ftruncate_syscall](FsContext::ftruncate_syscall)
//! - [chmod_syscall](FsContext::chmod_syscall)
//!
//! The extended control call lives in [`fcntl_calls`](super::fcntl_calls).

#![allow(dead_code)]

use super::fs_constants::*;
use crate::cellfs::context::FsContext;
use crate::cellfs::error::{FsError, FsResult};
use crate::cellfs::mount::MountId;
use crate::cellfs::objects::{dirent_type, stat_from_metadata, validate_open_flags, DirObject, FileObject, FsObject};
use crate::interface::{
    self, CellError, CellFsDirent, CellFsStat, CellFsUtimbuf, GuestAddr, GuestMemoryExt, GuestRecord, RustPathBuf,
    CELL_OK,
};

/// A guest path resolved onto the host.
pub(crate) struct Resolved {
    pub guest: Vec<u8>,
    pub mount: MountId,
    pub host: RustPathBuf,
}

impl FsContext {
    /// Reads a NUL-terminated guest path of at most
    /// `CELL_FS_MAX_FS_PATH_LENGTH` bytes.
    pub(crate) fn read_path(&self, addr: GuestAddr) -> FsResult<Vec<u8>> {
        let path = self.mem.read_cstr(addr, CELL_FS_MAX_FS_PATH_LENGTH + 1)?;
        if path.len() > CELL_FS_MAX_FS_PATH_LENGTH {
            return Err(FsError::NameTooLong);
        }
        Ok(path)
    }

    pub(crate) fn resolve(&self, addr: GuestAddr) -> FsResult<Resolved> {
        let guest = self.read_path(addr)?;
        let (mount, host) = self.mounts.host_path(&guest)?;
        Ok(Resolved { guest, mount, host })
    }

    // Resolve for a call that modifies the namespace or file contents
    pub(crate) fn resolve_writable(&self, addr: GuestAddr) -> FsResult<Resolved> {
        let res = self.resolve(addr)?;
        if self.mount(res.mount).map_or(false, |mp| mp.read_only) {
            return Err(FsError::ReadOnly);
        }
        Ok(res)
    }

    // Mount roots can be modified but never removed or moved
    pub(crate) fn check_not_root(&self, res: &Resolved) -> FsResult<()> {
        match self.mount(res.mount) {
            Some(mp) if mp.host_root == res.host => Err(FsError::PermissionDenied),
            _ => Ok(()),
        }
    }

    pub(crate) fn check_out(&self, addr: GuestAddr, len: usize) -> FsResult<()> {
        if !self.mem.is_valid(addr, len) {
            return Err(FsError::InvalidArgument("output pointer is not mapped"));
        }
        Ok(())
    }

    /// ### sys_fs_test
    ///
    /// Only the "path of an open object" query (`arg1 == 6`, `arg2 == 0`,
    /// `arg4 == 4`) is understood: the id is read from `arg3` and the guest
    /// path the object was opened with is copied to `arg5`, at most `arg6`
    /// bytes including the terminator. Other queries are logged and succeed.
    pub fn test_syscall(&self, arg1: u32, arg2: u32, arg3: GuestAddr, arg4: u32, arg5: GuestAddr, arg6: u32) -> i32 {
        if (arg1, arg2, arg4) != FS_TEST_GET_PATH {
            log::warn!("sys_fs_test: unknown query ({:#x}, {:#x}, {:#x}, {:#x}, {:#x}, {:#x})", arg1, arg2, arg3, arg4, arg5, arg6);
            return CELL_OK;
        }
        let id = fs_try!(self.mem.read_u32(arg3), "test");
        let obj = fs_try!(self.objects.get(id), "test");
        let mut name = obj.path().to_vec();
        name.push(0);
        name.truncate(arg6 as usize);
        fs_try!(self.mem.write_bytes(arg5, &name), "test");
        CELL_OK
    }

    /// ## ------------------OPEN SYSCALL------------------
    /// ### Description
    ///
    /// `open_syscall()` resolves `path` through the mount table, opens the
    /// host file and registers a file object for it. The new id is written
    /// to `fd`.
    ///
    /// ### Function Arguments
    ///
    /// * `path` - guest pointer to a NUL-terminated absolute path.
    /// * `flags` - access mode and `O_CREAT`, `O_EXCL`, `O_TRUNC`,
    ///   `O_APPEND`, `O_MSELF`.
    /// * `fd` - guest pointer receiving the new id.
    /// * `mode` - kept with the object and reported by
    ///   `fget_block_size`.
    /// * `arg`, `size` - extra open argument; accepted and ignored.
    ///
    /// ### Returns
    ///
    /// `CELL_OK`, or:
    ///
    /// * EINVAL - `fd` or `path` is not mapped, or the flags are inconsistent
    /// * ENOENT - no mount covers the path, or the file does not exist
    ///   without `O_CREAT`
    /// * EEXIST - `O_CREAT | O_EXCL` and the file exists
    /// * EROFS - write access or creation on a read-only mount
    /// * EISDIR - the path names a directory
    /// * ENOTMSELF - `O_MSELF` on a file without a valid archive header
    /// * EMFILE - no free id
    pub fn open_syscall(&self, path: GuestAddr, flags: i32, fd: GuestAddr, mode: i32, arg: GuestAddr, size: u64) -> i32 {
        fs_try!(self.check_out(fd, 4), "open");
        fs_try!(validate_open_flags(flags), "open");
        let res = fs_try!(self.resolve(path), "open");

        if arg != 0 || size != 0 {
            log::warn!("open: ignoring extra argument {:#x} ({} bytes) for {}", arg, size, String::from_utf8_lossy(&res.guest));
        }

        let modifies = flags & O_ACCMODE != O_RDONLY || flags & (O_CREAT | O_TRUNC) != 0;
        if modifies && self.mount(res.mount).map_or(false, |mp| mp.read_only) {
            return FsError::ReadOnly.to_syscall_error("open");
        }

        let id = fs_try!(
            self.objects.create(|| Ok(FileObject::open(&res.guest, res.mount, &res.host, flags, mode)?.into())),
            "open"
        );
        if let Err(e) = self.mem.write_u32(fd, id) {
            let _ = self.objects.remove(id);
            return FsError::from(e).to_syscall_error("open");
        }
        CELL_OK
    }

    /// ### read_syscall
    ///
    /// Reads up to `nbytes` from the current position into `buf` and stores
    /// the count in `nread`, which is zeroed when the read fails.
    pub fn read_syscall(&self, fd: u32, buf: GuestAddr, nbytes: u64, nread: GuestAddr) -> i32 {
        fs_try!(self.check_out(nread, 8), "read");
        let res = self.objects.get_file(fd).and_then(|file| file.op_read(self.mem.as_ref(), buf, nbytes));
        match res {
            Ok(n) => {
                fs_try!(self.mem.write_u64(nread, n), "read");
                CELL_OK
            }
            Err(e) => {
                let _ = self.mem.write_u64(nread, 0);
                e.to_syscall_error("read")
            }
        }
    }

    /// ### write_syscall
    ///
    /// Counterpart of [`read_syscall`](Self::read_syscall); `nwrite` is
    /// zeroed when the write fails.
    pub fn write_syscall(&self, fd: u32, buf: GuestAddr, nbytes: u64, nwrite: GuestAddr) -> i32 {
        fs_try!(self.check_out(nwrite, 8), "write");
        let res = self.objects.get_file(fd).and_then(|file| file.op_write(self.mem.as_ref(), buf, nbytes));
        match res {
            Ok(n) => {
                fs_try!(self.mem.write_u64(nwrite, n), "write");
                CELL_OK
            }
            Err(e) => {
                let _ = self.mem.write_u64(nwrite, 0);
                e.to_syscall_error("write")
            }
        }
    }

    pub fn close_syscall(&self, fd: u32) -> i32 {
        fs_try!(self.objects.remove_file(fd), "close");
        CELL_OK
    }

    /// ### opendir_syscall
    ///
    /// Opens a directory for enumeration and writes the new id to `fd`.
    ///
    /// ### Errors
    ///
    /// * EINVAL - `fd` or `path` is not mapped
    /// * ENOENT - no mount covers the path, or nothing exists there
    /// * ENOTDIR - the path names a file
    /// * EMFILE - no free id
    pub fn opendir_syscall(&self, path: GuestAddr, fd: GuestAddr) -> i32 {
        fs_try!(self.check_out(fd, 4), "opendir");
        let res = fs_try!(self.resolve(path), "opendir");
        let id = fs_try!(
            self.objects.create(|| Ok(FsObject::from(DirObject::open(&res.guest, res.mount, &res.host)?))),
            "opendir"
        );
        if let Err(e) = self.mem.write_u32(fd, id) {
            let _ = self.objects.remove(id);
            return FsError::from(e).to_syscall_error("opendir");
        }
        CELL_OK
    }

    /// ### readdir_syscall
    ///
    /// Writes the next entry to `dir` and its size (258) to `nread`; at the
    /// end of the directory only `nread` is written, with 0.
    pub fn readdir_syscall(&self, fd: u32, dir: GuestAddr, nread: GuestAddr) -> i32 {
        fs_try!(self.check_out(dir, CellFsDirent::SIZE), "readdir");
        fs_try!(self.check_out(nread, 8), "readdir");
        let d = fs_try!(self.objects.get_dir(fd), "readdir");
        match fs_try!(d.read_next(), "readdir") {
            Some(entry) => {
                let dirent = CellFsDirent::new(dirent_type(entry.kind), &entry.name);
                fs_try!(dirent.write_to(self.mem.as_ref(), dir), "readdir");
                fs_try!(self.mem.write_u64(nread, CellFsDirent::SIZE as u64), "readdir");
            }
            None => {
                fs_try!(self.mem.write_u64(nread, 0), "readdir");
            }
        }
        CELL_OK
    }

    pub fn closedir_syscall(&self, fd: u32) -> i32 {
        fs_try!(self.objects.remove_dir(fd), "closedir");
        CELL_OK
    }

    /// ### stat_syscall
    ///
    /// Fills `sb` for the object at `path`. Links are followed.
    /// Directories report `S_IFDIR | 0777`, everything else
    /// `S_IFREG | 0666`; owner and group are 0 and `blksize` is the mount's
    /// block size.
    pub fn stat_syscall(&self, path: GuestAddr, sb: GuestAddr) -> i32 {
        fs_try!(self.check_out(sb, CellFsStat::SIZE), "stat");
        let res = fs_try!(self.resolve(path), "stat");
        let md = fs_try!(interface::path_metadata(&res.host), "stat");
        let (_, block) = self.block_sizes(res.mount);
        fs_try!(stat_from_metadata(&md, block).write_to(self.mem.as_ref(), sb), "stat");
        CELL_OK
    }

    pub fn fstat_syscall(&self, fd: u32, sb: GuestAddr) -> i32 {
        fs_try!(self.check_out(sb, CellFsStat::SIZE), "fstat");
        let file = fs_try!(self.objects.get_file(fd), "fstat");
        let (_, block) = self.block_sizes(file.mount());
        let stat = fs_try!(file.stat(block), "fstat");
        fs_try!(stat.write_to(self.mem.as_ref(), sb), "fstat");
        CELL_OK
    }

    // The mode is not applied; the guest permission bits of a directory are fixed
    pub fn mkdir_syscall(&self, path: GuestAddr, mode: i32) -> i32 {
        let res = fs_try!(self.resolve_writable(path), "mkdir");
        fs_try!(interface::makedir(&res.host), "mkdir");
        log::trace!("mkdir {} (mode {:o})", String::from_utf8_lossy(&res.guest), mode);
        CELL_OK
    }

    /// ### rename_syscall
    ///
    /// Both paths must lie on the same mount (EXDEV otherwise).
    pub fn rename_syscall(&self, from: GuestAddr, to: GuestAddr) -> i32 {
        let src = fs_try!(self.resolve_writable(from), "rename");
        let dst = fs_try!(self.resolve_writable(to), "rename");
        fs_try!(self.check_not_root(&src), "rename");
        fs_try!(self.check_not_root(&dst), "rename");
        if src.mount != dst.mount {
            return interface::syscall_error(CellError::EXDEV, "rename", "source and target are on different mounts");
        }
        fs_try!(interface::renamepath(&src.host, &dst.host), "rename");
        CELL_OK
    }

    pub fn rmdir_syscall(&self, path: GuestAddr) -> i32 {
        let res = fs_try!(self.resolve_writable(path), "rmdir");
        fs_try!(self.check_not_root(&res), "rmdir");
        fs_try!(interface::removedir(&res.host), "rmdir");
        CELL_OK
    }

    pub fn unlink_syscall(&self, path: GuestAddr) -> i32 {
        let res = fs_try!(self.resolve_writable(path), "unlink");
        fs_try!(self.check_not_root(&res), "unlink");
        if fs_try!(interface::link_metadata(&res.host), "unlink").is_dir() {
            return FsError::IsADirectory.to_syscall_error("unlink");
        }
        fs_try!(interface::removefile(&res.host), "unlink");
        CELL_OK
    }

    /// ### utime_syscall
    ///
    /// Sets the host access and modification times from the guest
    /// `CellFsUtimbuf` at `timep` (seconds since the epoch).
    pub fn utime_syscall(&self, path: GuestAddr, timep: GuestAddr) -> i32 {
        let times = fs_try!(CellFsUtimbuf::read_from(self.mem.as_ref(), timep), "utime");
        let res = fs_try!(self.resolve_writable(path), "utime");
        fs_try!(
            interface::set_path_times(
                &res.host,
                interface::secs_to_systime(times.actime),
                interface::secs_to_systime(times.modtime)
            ),
            "utime"
        );
        CELL_OK
    }

    /// ### lseek_syscall
    ///
    /// Moves the position of `fd` and writes the new absolute position to
    /// `pos`. A resulting position before the start is EINVAL.
    pub fn lseek_syscall(&self, fd: u32, offset: i64, whence: i32, pos: GuestAddr) -> i32 {
        fs_try!(self.check_out(pos, 8), "lseek");
        let file = fs_try!(self.objects.get_file(fd), "lseek");
        let newpos = fs_try!(file.seek(offset, whence), "lseek");
        fs_try!(self.mem.write_u64(pos, newpos), "lseek");
        CELL_OK
    }

    /// ### fget_block_size_syscall
    ///
    /// Writes the mount's sector size, block size, sector size again, and
    /// the mode the file was opened with.
    pub fn fget_block_size_syscall(&self, fd: u32, sector_size: GuestAddr, block_size: GuestAddr, arg4: GuestAddr, arg5: GuestAddr) -> i32 {
        for out in [sector_size, block_size, arg4, arg5] {
            fs_try!(self.check_out(out, 8), "fget_block_size");
        }
        let file = fs_try!(self.objects.get_file(fd), "fget_block_size");
        let (sector, block) = self.block_sizes(file.mount());
        fs_try!(self.mem.write_u64(sector_size, sector), "fget_block_size");
        fs_try!(self.mem.write_u64(block_size, block), "fget_block_size");
        fs_try!(self.mem.write_u64(arg4, sector), "fget_block_size");
        fs_try!(self.mem.write_u64(arg5, file.mode() as u32 as u64), "fget_block_size");
        CELL_OK
    }

    pub fn get_block_size_syscall(&self, path: GuestAddr, sector_size: GuestAddr, block_size: GuestAddr, arg4: GuestAddr) -> i32 {
        for out in [sector_size, block_size, arg4] {
            fs_try!(self.check_out(out, 8), "get_block_size");
        }
        let res = fs_try!(self.resolve(path), "get_block_size");
        let (sector, block) = self.block_sizes(res.mount);
        fs_try!(self.mem.write_u64(sector_size, sector), "get_block_size");
        fs_try!(self.mem.write_u64(block_size, block), "get_block_size");
        fs_try!(self.mem.write_u64(arg4, sector), "get_block_size");
        CELL_OK
    }

    pub fn truncate_syscall(&self, path: GuestAddr, size: u64) -> i32 {
        let res = fs_try!(self.resolve_writable(path), "truncate");
        fs_try!(interface::truncatepath(&res.host, size), "truncate");
        CELL_OK
    }

    pub fn ftruncate_syscall(&self, fd: u32, size: u64) -> i32 {
        let file = fs_try!(self.objects.get_file(fd), "ftruncate");
        fs_try!(file.truncate(size), "ftruncate");
        CELL_OK
    }

    /// ### chmod_syscall
    ///
    /// Applies the permission bits of `mode` to the host object. The type
    /// bits are ignored.
    pub fn chmod_syscall(&self, path: GuestAddr, mode: i32) -> i32 {
        let res = fs_try!(self.resolve_writable(path), "chmod");
        fs_try!(interface::chmodpath(&res.host, mode as u32), "chmod");
        CELL_OK
    }
}
