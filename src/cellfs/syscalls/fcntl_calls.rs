//! The extended control call.
//!
//! `sys_fs_fcntl` takes a command tag and a pointer to a fixed-layout block
//! whose shape depends on the tag. Results are written back into the block.
//!
//! | tag          | block                        | command                          |
//! |--------------|------------------------------|----------------------------------|
//! | `0x8000000A` | [`FileOpRw`] (0x38)          | read at offset                   |
//! | `0x8000000B` | [`FileOpRw`] (0x38)          | write at offset                  |
//! | `0x80000009` | [`FileOpOpenByFd`] (0x40)    | open an archive member as a view |
//! | `0xE0000012` | [`FileOpDirInfo`] (0x10)     | bulk directory read              |
//! | `0xC0000006` | [`FileOpProbe`] (0x20)       | probe, logged and acknowledged   |
//!
//! The `vtable` words of the blocks are guest code pointers; they are never
//! followed and never written.

use super::fs_constants::*;
use crate::cellfs::context::FsContext;
use crate::cellfs::error::{FsError, FsResult};
use crate::cellfs::objects::{dirent_type, stat_from_metadata};
use crate::interface::{
    self, op_dir_off, op_open_off, op_rw_off, CellError, CellFsDirectoryEntry, CellFsDirent, FileOpDirInfo,
    FileOpOpenByFd, FileOpProbe, FileOpRw, GuestAddr, GuestMemoryExt, GuestRecord, CELL_OK,
};

// A block with its own op field must agree with the syscall's tag
fn check_tag(op: u32, block_op: u32) {
    if op != block_op {
        panic!("sys_fs_fcntl: tag {:#x} does not match block op {:#x}", op, block_op);
    }
}

impl FsContext {
    /// ## ------------------FCNTL SYSCALL------------------
    /// ### Description
    ///
    /// Dispatches on `op`; see [`fcntl_calls`](super::fcntl_calls) for the commands.
    ///
    /// ### Function Arguments
    ///
    /// * `fd` - the directory for the bulk directory read; ignored by the
    ///   other commands, which carry their own id in the block.
    /// * `op` - command tag.
    /// * `arg` - guest pointer to the command block.
    /// * `size` - the guest's idea of the block size.
    ///
    /// ### Returns
    ///
    /// * EINVAL - `size` is smaller than the block, or `arg` is not mapped
    /// * ENOTSUP - unknown tag
    /// * any error of the command itself, also stored in the block's result
    ///   field where it has one
    ///
    /// ### Panics
    ///
    /// * When a block with an op field carries a different tag than `op`.
    pub fn fcntl_syscall(&self, fd: u32, op: u32, arg: GuestAddr, size: u32) -> i32 {
        match op {
            FCNTL_READ_AT | FCNTL_WRITE_AT => self.fcntl_rw(op, arg, size),
            FCNTL_MSELF_OPEN => self.fcntl_open_by_fd(op, arg, size),
            FCNTL_GET_DIR_ENTRIES => self.fcntl_dir_entries(fd, arg, size),
            FCNTL_PROBE => self.fcntl_probe(arg, size),
            _ => interface::syscall_error(CellError::ENOTSUP, "fcntl", &format!("unknown op {:#x}", op)),
        }
    }

    fn fcntl_rw(&self, op: u32, arg: GuestAddr, size: u32) -> i32 {
        if (size as usize) < FileOpRw::SIZE {
            return interface::syscall_error(CellError::EINVAL, "fcntl", "read/write block too small");
        }
        let block = fs_try!(FileOpRw::read_from(self.mem.as_ref(), arg), "fcntl");
        check_tag(op, block.op);

        let file = fs_try!(self.objects.get_file(block.fd), "fcntl");
        let res = if op == FCNTL_READ_AT {
            file.op_read_at(self.mem.as_ref(), block.buf, block.size, block.offset)
        } else {
            file.op_write_at(self.mem.as_ref(), block.buf, block.size, block.offset)
        };
        let (code, done) = match res {
            Ok(n) => (CELL_OK, n),
            Err(e) => (e.to_syscall_error("fcntl"), 0),
        };
        fs_try!(self.mem.write_i32(arg + op_rw_off::OUT_CODE as u32, code), "fcntl");
        fs_try!(self.mem.write_u64(arg + op_rw_off::OUT_SIZE as u32, done), "fcntl");
        code
    }

    // cellFsSdataOpenByFd: a view of the block's file starting at `offset`
    fn fcntl_open_by_fd(&self, op: u32, arg: GuestAddr, size: u32) -> i32 {
        if (size as usize) < FileOpOpenByFd::SIZE {
            return interface::syscall_error(CellError::EINVAL, "fcntl", "open-by-fd block too small");
        }
        let block = fs_try!(FileOpOpenByFd::read_from(self.mem.as_ref(), arg), "fcntl");
        check_tag(op, block.op);
        log::debug!(
            "fcntl: open by fd {} at {:#x} (arg1={:#x} arg2={:#x} arg_ptr={:#x} arg_size={:#x})",
            block.fd,
            block.offset,
            block.arg1,
            block.arg2,
            block.arg_ptr,
            block.arg_size
        );

        let opened: FsResult<u32> = (|| {
            let file = self.objects.get_file(block.fd)?;
            let extent = file.view_extent(block.offset)?;
            let view = file.make_view(block.offset, extent)?;
            self.objects.create(|| Ok(view.into()))
        })();

        match opened {
            Ok(id) => {
                if let Err(e) = self.mem.write_u32(arg + op_open_off::OUT_FD as u32, id) {
                    let _ = self.objects.remove(id);
                    return FsError::from(e).to_syscall_error("fcntl");
                }
                fs_try!(self.mem.write_i32(arg + op_open_off::OUT_CODE as u32, CELL_OK), "fcntl");
                CELL_OK
            }
            Err(e) => {
                let code = e.to_syscall_error("fcntl");
                fs_try!(self.mem.write_i32(arg + op_open_off::OUT_CODE as u32, code), "fcntl");
                code
            }
        }
    }

    // cellFsGetDirectoryEntries: `arg` points at the info block itself
    fn fcntl_dir_entries(&self, fd: u32, arg: GuestAddr, size: u32) -> i32 {
        if (size as usize) < FileOpDirInfo::SIZE {
            return interface::syscall_error(CellError::EINVAL, "fcntl", "directory block too small");
        }
        let info = fs_try!(FileOpDirInfo::read_from(self.mem.as_ref(), arg), "fcntl");
        let dir = fs_try!(self.objects.get_dir(fd), "fcntl");
        let (_, block) = self.block_sizes(dir.mount());

        // the whole entry array is checked before any entry is consumed
        let span = info.max as u64 * CellFsDirectoryEntry::SIZE as u64;
        if info.ptr == 0 || info.ptr as u64 + span > 1 << 32 || !self.mem.is_valid(info.ptr, span as usize) {
            return interface::syscall_error(CellError::EINVAL, "fcntl", "entry buffer is not mapped");
        }

        let mut count: u32 = 0;
        while count < info.max {
            let slot = info.ptr + count * CellFsDirectoryEntry::SIZE as u32;
            let entry = match fs_try!(dir.read_next(), "fcntl") {
                Some(e) => e,
                None => break,
            };
            let record = CellFsDirectoryEntry {
                attribute: stat_from_metadata(&entry.metadata, block),
                entry_name: CellFsDirent::new(dirent_type(entry.kind), &entry.name),
            };
            fs_try!(record.write_to(self.mem.as_ref(), slot), "fcntl");
            count += 1;
        }

        let code = if fs_try!(dir.has_more(), "fcntl") { CELL_FS_DIRENT_MORE } else { CELL_OK };
        fs_try!(self.mem.write_u32(arg + op_dir_off::COUNT as u32, count), "fcntl");
        fs_try!(self.mem.write_i32(arg + op_dir_off::CODE as u32, code), "fcntl");
        CELL_OK
    }

    // Seen before some opens; the meaning of the block is unknown
    fn fcntl_probe(&self, arg: GuestAddr, size: u32) -> i32 {
        if size as usize != FileOpProbe::SIZE {
            return interface::syscall_error(CellError::EINVAL, "fcntl", "probe block has the wrong size");
        }
        let probe = fs_try!(FileOpProbe::read_from(self.mem.as_ref(), arg), "fcntl");
        let name = self.mem.read_cstr(probe.name, CELL_FS_MAX_FS_PATH_LENGTH).unwrap_or_default();
        log::warn!(
            "fcntl 0xC0000006: size={:#x} x4={:#x} x8={:#x} xc={:#x} name={:?} x14={:#x} x18={:#x} x1c={:#x}",
            probe.size,
            probe.x4,
            probe.x8,
            probe.xc,
            String::from_utf8_lossy(&name),
            probe.x14,
            probe.x18,
            probe.x1c
        );
        CELL_OK
    }
}
