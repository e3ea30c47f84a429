use super::*;
use crate::cellfs::dispatcher::dispatcher;
use crate::interface::CellError;
use std::fs;

const OPEN: i32 = 801;
const READ: i32 = 802;
const CLOSE: i32 = 804;
const LSEEK: i32 = 818;

#[test]
pub fn open_read_close_through_numbers() {
    let t = setup();
    fs::write(t.host("dev_hdd0/boot.cfg"), b"cfg").unwrap();
    let path = t.cstr("/dev_hdd0/boot.cfg") as u64;
    let fd = t.buf(4);

    assert_eq!(dispatcher(&t.ctx, OPEN, path, O_RDONLY as u64, fd as u64, 0, 0, 0), CELL_OK);
    let id = t.u32_at(fd) as u64;
    let buf = t.buf(8);
    let nread = t.buf(8);
    assert_eq!(dispatcher(&t.ctx, READ, id, buf as u64, 8, nread as u64, 0, 0), CELL_OK);
    assert_eq!(t.fetch(buf, t.u64_at(nread) as usize), b"cfg");
    assert_eq!(dispatcher(&t.ctx, CLOSE, id, 0, 0, 0, 0, 0), CELL_OK);
    assert_eq!(dispatcher(&t.ctx, CLOSE, id, 0, 0, 0, 0, 0), CellError::EBADF.code());
}

#[test]
pub fn sign_extended_arguments() {
    let t = setup();
    let id = t.open("/dev_hdd0/f", O_CREAT | O_RDWR);
    t.write(id, b"0123456789");
    let pos = t.buf(8);
    // -4 as a sign-extended register, SEEK_END
    let rc = dispatcher(&t.ctx, LSEEK, id as u64, (-4i64) as u64, SEEK_END as u64, pos as u64, 0, 0);
    assert_eq!(rc, CELL_OK);
    assert_eq!(t.u64_at(pos), 6);
}

#[test]
pub fn bad_registers() {
    let t = setup();
    let fd = t.buf(4);
    assert_eq!(dispatcher(&t.ctx, 9999, 0, 0, 0, 0, 0, 0), CellError::ENOSYS.code());
    let rc = dispatcher(&t.ctx, OPEN, 1 << 40, O_RDONLY as u64, fd as u64, 0, 0, 0);
    assert_eq!(rc, CellError::EFAULT.code());
    let rc = dispatcher(&t.ctx, CLOSE, 0x1_0000_0003, 0, 0, 0, 0, 0);
    assert_eq!(rc, CellError::EINVAL.code());
}
