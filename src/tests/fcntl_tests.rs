use super::*;
use crate::interface::{
    op_dir_off, op_open_off, op_rw_off, CellError, CellFsDirectoryEntry, FileOpDirInfo, FileOpOpenByFd, FileOpProbe,
    FileOpRw, FsMselfEntry, FsMselfHeader, GuestRecord,
};
use std::fs;

fn hundred_bytes() -> Vec<u8> {
    (0..100u8).collect()
}

fn rw_block(t: &TestFs, op: u32, fd: u32, buf: GuestAddr, offset: u64, size: u64) -> GuestAddr {
    let block = FileOpRw { op, fd, buf, offset, size, out_code: 0x1234, out_size: 0xdead, ..Default::default() };
    let addr = t.buf(FileOpRw::SIZE);
    block.write_to(t.mem.as_ref(), addr).unwrap();
    addr
}

fn mself_image(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut offset = (FsMselfHeader::SIZE + FsMselfEntry::SIZE * members.len()) as u64;
    let mut table = Vec::new();
    let mut body = Vec::new();
    for (name, data) in members {
        table.extend(FsMselfEntry::new(name.as_bytes(), offset, data.len() as u64).to_bytes());
        body.extend_from_slice(data);
        offset += data.len() as u64;
    }
    let hdr = FsMselfHeader {
        magic: MSELF_MAGIC,
        format_version: MSELF_VERSION,
        file_size: offset,
        entry_num: members.len() as u32,
        entry_size: MSELF_ENTRY_SIZE,
        reserve: [0u8; 40],
    };
    let mut img = hdr.to_bytes();
    img.extend(table);
    img.extend(body);
    img
}

fn open_by_fd(t: &TestFs, fd: u32, offset: u64) -> (i32, GuestAddr) {
    let block = FileOpOpenByFd { op: FCNTL_MSELF_OPEN, fd, offset, out_code: 0x1234, ..Default::default() };
    let addr = t.buf(FileOpOpenByFd::SIZE);
    block.write_to(t.mem.as_ref(), addr).unwrap();
    (t.ctx.fcntl_syscall(0, FCNTL_MSELF_OPEN, addr, FileOpOpenByFd::SIZE as u32), addr)
}

#[test]
pub fn read_at_offset_is_clamped_to_file() {
    let t = setup();
    fs::write(t.host("dev_hdd0/data"), hundred_bytes()).unwrap();
    let id = t.open("/dev_hdd0/data", O_RDONLY);
    let buf = t.buf(50);
    let block = rw_block(&t, FCNTL_READ_AT, id, buf, 80, 50);

    assert_eq!(t.ctx.fcntl_syscall(id, FCNTL_READ_AT, block, FileOpRw::SIZE as u32), CELL_OK);
    assert_eq!(t.mem.read_u32(block + op_rw_off::OUT_CODE as u32).unwrap() as i32, CELL_OK);
    assert_eq!(t.u64_at(block + op_rw_off::OUT_SIZE as u32), 20);
    assert_eq!(t.fetch(buf, 20), (80..100u8).collect::<Vec<_>>());

    // the cursor is untouched
    assert_eq!(t.read(id, 3), [0, 1, 2]);
}

#[test]
pub fn write_at_offset() {
    let t = setup();
    fs::write(t.host("dev_hdd0/data"), b"aaaaaaaa").unwrap();
    let id = t.open("/dev_hdd0/data", O_RDWR);
    let block = rw_block(&t, FCNTL_WRITE_AT, id, t.bytes(b"ZZ"), 3, 2);

    assert_eq!(t.ctx.fcntl_syscall(id, FCNTL_WRITE_AT, block, FileOpRw::SIZE as u32), CELL_OK);
    assert_eq!(t.u64_at(block + op_rw_off::OUT_SIZE as u32), 2);
    assert_eq!(fs::read(t.host("dev_hdd0/data")).unwrap(), b"aaaZZaaa");
    assert_eq!(t.read(id, 2), b"aa");
}

#[test]
pub fn read_write_at_errors() {
    let t = setup();
    fs::write(t.host("dev_hdd0/data"), hundred_bytes()).unwrap();
    let id = t.open("/dev_hdd0/data", O_RDONLY);

    // unknown id leaves the block alone
    let block = rw_block(&t, FCNTL_READ_AT, 77, t.buf(8), 0, 8);
    assert_eq!(t.ctx.fcntl_syscall(77, FCNTL_READ_AT, block, FileOpRw::SIZE as u32), CellError::EBADF.code());
    assert_eq!(t.mem.read_u32(block + op_rw_off::OUT_CODE as u32).unwrap(), 0x1234);
    assert_eq!(t.u64_at(block + op_rw_off::OUT_SIZE as u32), 0xdead);

    // a failed transfer reports through the block
    let block = rw_block(&t, FCNTL_WRITE_AT, id, t.bytes(b"no"), 0, 2);
    assert_eq!(t.ctx.fcntl_syscall(id, FCNTL_WRITE_AT, block, FileOpRw::SIZE as u32), CellError::EACCES.code());
    assert_eq!(t.mem.read_u32(block + op_rw_off::OUT_CODE as u32).unwrap() as i32, CellError::EACCES.code());
    assert_eq!(t.u64_at(block + op_rw_off::OUT_SIZE as u32), 0);

    let block = rw_block(&t, FCNTL_READ_AT, id, t.buf(8), 0, 8);
    assert_eq!(t.ctx.fcntl_syscall(id, FCNTL_READ_AT, block, 0x20), CellError::EINVAL.code());
    assert_eq!(t.ctx.fcntl_syscall(id, FCNTL_READ_AT, 0, FileOpRw::SIZE as u32), CellError::EINVAL.code());
}

#[test]
#[should_panic]
pub fn mismatched_block_tag_panics() {
    let t = setup();
    fs::write(t.host("dev_hdd0/data"), hundred_bytes()).unwrap();
    let id = t.open("/dev_hdd0/data", O_RDONLY);
    let block = rw_block(&t, FCNTL_WRITE_AT, id, t.buf(8), 0, 8);
    t.ctx.fcntl_syscall(id, FCNTL_READ_AT, block, FileOpRw::SIZE as u32);
}

#[test]
pub fn unknown_op_is_unsupported() {
    let t = setup();
    let block = t.buf(0x40);
    assert_eq!(t.ctx.fcntl_syscall(3, 0x1234_5678, block, 0x40), CellError::ENOTSUP.code());
}

#[test]
pub fn open_by_fd_bounds_view_to_archive_member() {
    let t = setup();
    let first = vec![b'a'; 16];
    let second: Vec<u8> = (0..40u8).collect();
    fs::write(t.host("dev_bdvd/EBOOT.MSELF"), mself_image(&[("first", &first), ("second", &second)])).unwrap();
    let archive = t.open("/dev_bdvd/EBOOT.MSELF", O_RDONLY | O_MSELF);

    let member_off = (FsMselfHeader::SIZE + 2 * FsMselfEntry::SIZE + first.len()) as u64;
    let (rc, block) = open_by_fd(&t, archive, member_off);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.mem.read_u32(block + op_open_off::OUT_CODE as u32).unwrap() as i32, CELL_OK);
    let view = t.u32_at(block + op_open_off::OUT_FD as u32);
    assert_ne!(view, archive);

    // the view stops at the member's end
    assert_eq!(t.read(view, 100), second);
    assert_eq!(t.read(view, 100), b"");

    let pos = t.buf(8);
    assert_eq!(t.ctx.lseek_syscall(view, 0, SEEK_END, pos), CELL_OK);
    assert_eq!(t.u64_at(pos), second.len() as u64);
    assert_eq!(t.ctx.lseek_syscall(view, 4, SEEK_SET, pos), CELL_OK);
    assert_eq!(t.read(view, 2), [4, 5]);

    // closing the view keeps the archive open
    assert_eq!(t.ctx.close_syscall(view), CELL_OK);
    assert_eq!(t.read(archive, 4), &mself_image(&[("first", &first), ("second", &second)])[..4]);
}

#[test]
pub fn open_by_fd_without_archive_runs_to_end() {
    let t = setup();
    fs::write(t.host("dev_hdd0/plain"), hundred_bytes()).unwrap();
    let id = t.open("/dev_hdd0/plain", O_RDWR | O_APPEND);
    let (rc, block) = open_by_fd(&t, id, 90);
    assert_eq!(rc, CELL_OK);
    let view = t.u32_at(block + op_open_off::OUT_FD as u32);
    assert_eq!(t.read(view, 50), (90..100u8).collect::<Vec<_>>());
}

#[test]
pub fn view_transfers_near_the_top_of_the_offset_range() {
    let t = setup();
    fs::write(t.host("dev_hdd0/data"), hundred_bytes()).unwrap();
    let id = t.open("/dev_hdd0/data", O_RDWR);
    let (rc, block) = open_by_fd(&t, id, 10);
    assert_eq!(rc, CELL_OK);
    let view = t.u32_at(block + op_open_off::OUT_FD as u32);

    let buf = t.bytes(b"ZZZZZZZZ");
    for op in [FCNTL_READ_AT, FCNTL_WRITE_AT] {
        let rw = rw_block(&t, op, view, buf, u64::MAX - 4, 8);
        assert_eq!(t.ctx.fcntl_syscall(view, op, rw, FileOpRw::SIZE as u32), CELL_OK);
        assert_eq!(t.mem.read_u32(rw + op_rw_off::OUT_CODE as u32).unwrap() as i32, CELL_OK);
        assert_eq!(t.u64_at(rw + op_rw_off::OUT_SIZE as u32), 0);
    }
    assert_eq!(fs::read(t.host("dev_hdd0/data")).unwrap(), hundred_bytes());
}

#[test]
pub fn open_by_fd_errors() {
    let t = setup();
    let (rc, block) = open_by_fd(&t, 100, 0);
    assert_eq!(rc, CellError::EBADF.code());
    assert_eq!(t.mem.read_u32(block + op_open_off::OUT_CODE as u32).unwrap() as i32, CellError::EBADF.code());
    assert_eq!(t.u32_at(block + op_open_off::OUT_FD as u32), 0);

    fs::write(t.host("dev_hdd0/fake.mself"), hundred_bytes()).unwrap();
    let fd = t.buf(4);
    let rc = t.ctx.open_syscall(t.cstr("/dev_hdd0/fake.mself"), O_RDONLY | O_MSELF, fd, S_IRWA, 0, 0);
    assert_eq!(rc, CellError::ENOTMSELF.code());
}

fn dir_entries(t: &TestFs, fd: u32, max: u32) -> (i32, GuestAddr, GuestAddr) {
    let entries = t.buf(CellFsDirectoryEntry::SIZE * max.max(1) as usize);
    let info = FileOpDirInfo { code: 0x55, count: 0x55, ptr: entries, max };
    let addr = t.buf(FileOpDirInfo::SIZE);
    info.write_to(t.mem.as_ref(), addr).unwrap();
    (t.ctx.fcntl_syscall(fd, FCNTL_GET_DIR_ENTRIES, addr, FileOpDirInfo::SIZE as u32), addr, entries)
}

#[test]
pub fn bulk_directory_read() {
    let t = setup();
    for name in ["one", "two", "three"] {
        fs::write(t.host(&format!("dev_hdd0/{}", name)), name).unwrap();
    }
    let fd = t.buf(4);
    assert_eq!(t.ctx.opendir_syscall(t.cstr("/dev_hdd0"), fd), CELL_OK);
    let dir = t.u32_at(fd);

    let (rc, info, entries) = dir_entries(&t, dir, 2);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.u32_at(info + op_dir_off::COUNT as u32), 2);
    assert_eq!(t.mem.read_u32(info + op_dir_off::CODE as u32).unwrap() as i32, CELL_FS_DIRENT_MORE);
    let mut names = Vec::new();
    for i in 0..2 {
        let e = CellFsDirectoryEntry::read_from(t.mem.as_ref(), entries + (i * CellFsDirectoryEntry::SIZE) as u32).unwrap();
        assert_eq!(e.entry_name.d_type, CELL_FS_TYPE_REGULAR);
        assert_eq!(e.attribute.mode, S_IFREG | 0o666);
        assert_eq!(e.attribute.size, e.entry_name.name().len() as u64);
        names.push(e.entry_name.name().to_vec());
    }

    let (rc, info, entries) = dir_entries(&t, dir, 8);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.u32_at(info + op_dir_off::COUNT as u32), 1);
    assert_eq!(t.mem.read_u32(info + op_dir_off::CODE as u32).unwrap() as i32, CELL_OK);
    let e = CellFsDirectoryEntry::read_from(t.mem.as_ref(), entries).unwrap();
    names.push(e.entry_name.name().to_vec());
    names.sort();
    assert_eq!(names, [b"one".to_vec(), b"three".to_vec(), b"two".to_vec()]);

    let (rc, info, _) = dir_entries(&t, dir, 8);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.u32_at(info + op_dir_off::COUNT as u32), 0);
}

#[test]
pub fn bulk_directory_read_errors() {
    let t = setup();
    let id = t.open("/dev_hdd0/file", O_CREAT | O_RDWR);
    let (rc, _, _) = dir_entries(&t, id, 4);
    assert_eq!(rc, CellError::ENOTDIR.code());

    let fd = t.buf(4);
    assert_eq!(t.ctx.opendir_syscall(t.cstr("/dev_hdd0"), fd), CELL_OK);
    let dir = t.u32_at(fd);
    let info = FileOpDirInfo { code: 0, count: 0, ptr: 0, max: 4 };
    let addr = t.buf(FileOpDirInfo::SIZE);
    info.write_to(t.mem.as_ref(), addr).unwrap();
    assert_eq!(t.ctx.fcntl_syscall(dir, FCNTL_GET_DIR_ENTRIES, addr, FileOpDirInfo::SIZE as u32), CellError::EINVAL.code());
    assert_eq!(t.ctx.fcntl_syscall(dir, FCNTL_GET_DIR_ENTRIES, addr, 8), CellError::EINVAL.code());

    // the failed call lost nothing
    let (rc, info, entries) = dir_entries(&t, dir, 4);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.u32_at(info + op_dir_off::COUNT as u32), 1);
    let e = CellFsDirectoryEntry::read_from(t.mem.as_ref(), entries).unwrap();
    assert_eq!(e.entry_name.name(), b"file");
}

#[test]
pub fn bulk_directory_read_checks_every_slot_first() {
    let t = setup();
    for name in ["one", "two", "three"] {
        fs::write(t.host(&format!("dev_hdd0/{}", name)), name).unwrap();
    }
    let fd = t.buf(4);
    assert_eq!(t.ctx.opendir_syscall(t.cstr("/dev_hdd0"), fd), CELL_OK);
    let dir = t.u32_at(fd);

    // the first slot is mapped, the second runs off the end of guest memory
    let last_slot = GUEST_BASE + (GUEST_SIZE - CellFsDirectoryEntry::SIZE) as u32;
    let info = FileOpDirInfo { code: 0x55, count: 0x55, ptr: last_slot, max: 4 };
    let addr = t.buf(FileOpDirInfo::SIZE);
    info.write_to(t.mem.as_ref(), addr).unwrap();
    let rc = t.ctx.fcntl_syscall(dir, FCNTL_GET_DIR_ENTRIES, addr, FileOpDirInfo::SIZE as u32);
    assert_eq!(rc, CellError::EINVAL.code());

    // a slot array that wraps the address space is just as unmapped
    let info = FileOpDirInfo { code: 0x55, count: 0x55, ptr: u32::MAX - 0x100, max: 2 };
    info.write_to(t.mem.as_ref(), addr).unwrap();
    let rc = t.ctx.fcntl_syscall(dir, FCNTL_GET_DIR_ENTRIES, addr, FileOpDirInfo::SIZE as u32);
    assert_eq!(rc, CellError::EINVAL.code());

    let (rc, info, _) = dir_entries(&t, dir, 8);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.u32_at(info + op_dir_off::COUNT as u32), 3);
}

#[test]
pub fn probe_is_acknowledged() {
    let t = setup();
    let probe = FileOpProbe {
        size: 0x20,
        x4: 0x10,
        x8: 0x18,
        xc: 0x9,
        name: t.cstr("/dev_hdd0/game"),
        x14: 0,
        x18: 0x8001_0003,
        x1c: 0,
    };
    let addr = t.buf(FileOpProbe::SIZE);
    probe.write_to(t.mem.as_ref(), addr).unwrap();
    assert_eq!(t.ctx.fcntl_syscall(0, FCNTL_PROBE, addr, FileOpProbe::SIZE as u32), CELL_OK);
    assert_eq!(FileOpProbe::read_from(t.mem.as_ref(), addr).unwrap(), probe);
    assert_eq!(t.ctx.fcntl_syscall(0, FCNTL_PROBE, addr, 0x10), CellError::EINVAL.code());
}
