// Binary records exchanged with guest memory, and syscall argument decoding
//
// Every record is big-endian with a fixed field order and size. The field
// offsets below are the contract; the const assertions pin the sizes.
#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};

use crate::interface::errnos::{syscall_error, CellError};
use crate::interface::memory::{GuestAddr, GuestMemory, MemoryFault};

/// A fixed-layout record that lives in guest memory.
pub trait GuestRecord: Sized {
    const SIZE: usize;

    fn encode(&self, out: &mut [u8]);
    fn decode(raw: &[u8]) -> Self;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE];
        self.encode(&mut out);
        out
    }

    fn read_from<M: GuestMemory + ?Sized>(mem: &M, addr: GuestAddr) -> Result<Self, MemoryFault> {
        let mut raw = vec![0u8; Self::SIZE];
        mem.read_bytes(addr, &mut raw)?;
        Ok(Self::decode(&raw))
    }

    fn write_to<M: GuestMemory + ?Sized>(&self, mem: &M, addr: GuestAddr) -> Result<(), MemoryFault> {
        mem.write_bytes(addr, &self.to_bytes())
    }
}

// Copy a name into a fixed buffer, truncating and always leaving a terminator
fn strcpy_trunc(dst: &mut [u8], src: &[u8]) -> usize {
    let n = src.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&src[..n]);
    for b in dst[n..].iter_mut() {
        *b = 0;
    }
    n
}

fn cstr_bytes(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

//------------------------------------STAT RECORD------------------------------------

pub mod stat_off {
    pub const MODE: usize = 0x00;
    pub const UID: usize = 0x04;
    pub const GID: usize = 0x08;
    pub const ATIME: usize = 0x0C;
    pub const MTIME: usize = 0x14;
    pub const CTIME: usize = 0x1C;
    pub const SIZE: usize = 0x24;
    pub const BLKSIZE: usize = 0x2C;
}

/// 64-bit fields are only 4-byte aligned in this record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFsStat {
    pub mode: i32,
    pub uid: i32,
    pub gid: i32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub size: u64,
    pub blksize: u64,
}

impl CellFsStat {
    pub const ALIGN: usize = 4;
}

const _: () = assert!(stat_off::BLKSIZE + 8 == CellFsStat::SIZE);
const _: () = assert!(CellFsStat::SIZE == 52 && CellFsStat::SIZE % CellFsStat::ALIGN == 0);

impl GuestRecord for CellFsStat {
    const SIZE: usize = 52;

    fn encode(&self, out: &mut [u8]) {
        BigEndian::write_i32(&mut out[stat_off::MODE..], self.mode);
        BigEndian::write_i32(&mut out[stat_off::UID..], self.uid);
        BigEndian::write_i32(&mut out[stat_off::GID..], self.gid);
        BigEndian::write_i64(&mut out[stat_off::ATIME..], self.atime);
        BigEndian::write_i64(&mut out[stat_off::MTIME..], self.mtime);
        BigEndian::write_i64(&mut out[stat_off::CTIME..], self.ctime);
        BigEndian::write_u64(&mut out[stat_off::SIZE..], self.size);
        BigEndian::write_u64(&mut out[stat_off::BLKSIZE..], self.blksize);
    }

    fn decode(raw: &[u8]) -> Self {
        CellFsStat {
            mode: BigEndian::read_i32(&raw[stat_off::MODE..]),
            uid: BigEndian::read_i32(&raw[stat_off::UID..]),
            gid: BigEndian::read_i32(&raw[stat_off::GID..]),
            atime: BigEndian::read_i64(&raw[stat_off::ATIME..]),
            mtime: BigEndian::read_i64(&raw[stat_off::MTIME..]),
            ctime: BigEndian::read_i64(&raw[stat_off::CTIME..]),
            size: BigEndian::read_u64(&raw[stat_off::SIZE..]),
            blksize: BigEndian::read_u64(&raw[stat_off::BLKSIZE..]),
        }
    }
}

//------------------------------------DIRECTORY ENTRIES------------------------------------

pub const DIRENT_NAME_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFsDirent {
    pub d_type: u8,
    pub d_namlen: u8,
    pub d_name: [u8; DIRENT_NAME_LEN],
}

impl Default for CellFsDirent {
    fn default() -> Self {
        CellFsDirent { d_type: 0, d_namlen: 0, d_name: [0u8; DIRENT_NAME_LEN] }
    }
}

impl CellFsDirent {
    pub fn new(d_type: u8, name: &[u8]) -> CellFsDirent {
        let mut dirent = CellFsDirent { d_type, ..Default::default() };
        dirent.d_namlen = strcpy_trunc(&mut dirent.d_name, name) as u8;
        dirent
    }

    pub fn name(&self) -> &[u8] {
        &self.d_name[..self.d_namlen as usize]
    }
}

const _: () = assert!(2 + DIRENT_NAME_LEN == CellFsDirent::SIZE);

impl GuestRecord for CellFsDirent {
    const SIZE: usize = 258;

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.d_type;
        out[1] = self.d_namlen;
        out[2..Self::SIZE].copy_from_slice(&self.d_name);
    }

    fn decode(raw: &[u8]) -> Self {
        let mut d_name = [0u8; DIRENT_NAME_LEN];
        d_name.copy_from_slice(&raw[2..Self::SIZE]);
        CellFsDirent { d_type: raw[0], d_namlen: raw[1], d_name }
    }
}

/// Stat record followed by the dirent, padded to 4-byte alignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellFsDirectoryEntry {
    pub attribute: CellFsStat,
    pub entry_name: CellFsDirent,
}

const _: () = assert!(CellFsDirectoryEntry::SIZE == (CellFsStat::SIZE + CellFsDirent::SIZE + 3) & !3);

impl GuestRecord for CellFsDirectoryEntry {
    const SIZE: usize = 312;

    fn encode(&self, out: &mut [u8]) {
        self.attribute.encode(&mut out[..CellFsStat::SIZE]);
        self.entry_name.encode(&mut out[CellFsStat::SIZE..CellFsStat::SIZE + CellFsDirent::SIZE]);
        for b in out[CellFsStat::SIZE + CellFsDirent::SIZE..Self::SIZE].iter_mut() {
            *b = 0;
        }
    }

    fn decode(raw: &[u8]) -> Self {
        CellFsDirectoryEntry {
            attribute: CellFsStat::decode(&raw[..CellFsStat::SIZE]),
            entry_name: CellFsDirent::decode(&raw[CellFsStat::SIZE..]),
        }
    }
}

//------------------------------------UTIMBUF------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFsUtimbuf {
    pub actime: i64,
    pub modtime: i64,
}

const _: () = assert!(CellFsUtimbuf::SIZE == 16);

impl GuestRecord for CellFsUtimbuf {
    const SIZE: usize = 16;

    fn encode(&self, out: &mut [u8]) {
        BigEndian::write_i64(&mut out[0..], self.actime);
        BigEndian::write_i64(&mut out[8..], self.modtime);
    }

    fn decode(raw: &[u8]) -> Self {
        CellFsUtimbuf { actime: BigEndian::read_i64(&raw[0..]), modtime: BigEndian::read_i64(&raw[8..]) }
    }
}

//------------------------------------MSELF ARCHIVE------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsMselfHeader {
    pub magic: u32,
    pub format_version: u32,
    pub file_size: u64,
    pub entry_num: u32,
    pub entry_size: u32,
    pub reserve: [u8; 40],
}

const _: () = assert!(0x18 + 40 == FsMselfHeader::SIZE);

impl GuestRecord for FsMselfHeader {
    const SIZE: usize = 0x40;

    fn encode(&self, out: &mut [u8]) {
        BigEndian::write_u32(&mut out[0x00..], self.magic);
        BigEndian::write_u32(&mut out[0x04..], self.format_version);
        BigEndian::write_u64(&mut out[0x08..], self.file_size);
        BigEndian::write_u32(&mut out[0x10..], self.entry_num);
        BigEndian::write_u32(&mut out[0x14..], self.entry_size);
        out[0x18..0x40].copy_from_slice(&self.reserve);
    }

    fn decode(raw: &[u8]) -> Self {
        let mut reserve = [0u8; 40];
        reserve.copy_from_slice(&raw[0x18..0x40]);
        FsMselfHeader {
            magic: BigEndian::read_u32(&raw[0x00..]),
            format_version: BigEndian::read_u32(&raw[0x04..]),
            file_size: BigEndian::read_u64(&raw[0x08..]),
            entry_num: BigEndian::read_u32(&raw[0x10..]),
            entry_size: BigEndian::read_u32(&raw[0x14..]),
            reserve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsMselfEntry {
    pub name: [u8; 32],
    pub offset: u64,
    pub size: u64,
    pub reserve: [u8; 16],
}

impl FsMselfEntry {
    pub fn new(name: &[u8], offset: u64, size: u64) -> FsMselfEntry {
        let mut entry = FsMselfEntry { name: [0u8; 32], offset, size, reserve: [0u8; 16] };
        strcpy_trunc(&mut entry.name, name);
        entry
    }

    pub fn name(&self) -> &[u8] {
        cstr_bytes(&self.name)
    }
}

const _: () = assert!(0x30 + 16 == FsMselfEntry::SIZE);

impl GuestRecord for FsMselfEntry {
    const SIZE: usize = 0x40;

    fn encode(&self, out: &mut [u8]) {
        out[0x00..0x20].copy_from_slice(&self.name);
        BigEndian::write_u64(&mut out[0x20..], self.offset);
        BigEndian::write_u64(&mut out[0x28..], self.size);
        out[0x30..0x40].copy_from_slice(&self.reserve);
    }

    fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; 32];
        name.copy_from_slice(&raw[0x00..0x20]);
        let mut reserve = [0u8; 16];
        reserve.copy_from_slice(&raw[0x30..0x40]);
        FsMselfEntry {
            name,
            offset: BigEndian::read_u64(&raw[0x20..]),
            size: BigEndian::read_u64(&raw[0x28..]),
            reserve,
        }
    }
}

//------------------------------------FCNTL COMMAND BLOCKS------------------------------------
// The leading `vtable` words point at guest code. They are carried as plain
// data and never written back.

pub mod op_rw_off {
    pub const VTABLE: usize = 0x00;
    pub const OP: usize = 0x04;
    pub const X8: usize = 0x08;
    pub const XC: usize = 0x0C;
    pub const FD: usize = 0x10;
    pub const BUF: usize = 0x14;
    pub const OFFSET: usize = 0x18;
    pub const SIZE: usize = 0x20;
    pub const OUT_CODE: usize = 0x28;
    pub const OUT_SIZE: usize = 0x30;
}

/// Read/write at an explicit offset (ops 0x8000000A / 0x8000000B).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOpRw {
    pub vtable: u32,
    pub op: u32,
    pub x8: u32,
    pub xc: u32,
    pub fd: u32,
    pub buf: u32,
    pub offset: u64,
    pub size: u64,
    pub out_code: i32,
    pub out_size: u64,
}

const _: () = assert!(op_rw_off::OUT_SIZE + 8 == FileOpRw::SIZE);

impl GuestRecord for FileOpRw {
    const SIZE: usize = 0x38;

    fn encode(&self, out: &mut [u8]) {
        out[..Self::SIZE].fill(0);
        BigEndian::write_u32(&mut out[op_rw_off::VTABLE..], self.vtable);
        BigEndian::write_u32(&mut out[op_rw_off::OP..], self.op);
        BigEndian::write_u32(&mut out[op_rw_off::X8..], self.x8);
        BigEndian::write_u32(&mut out[op_rw_off::XC..], self.xc);
        BigEndian::write_u32(&mut out[op_rw_off::FD..], self.fd);
        BigEndian::write_u32(&mut out[op_rw_off::BUF..], self.buf);
        BigEndian::write_u64(&mut out[op_rw_off::OFFSET..], self.offset);
        BigEndian::write_u64(&mut out[op_rw_off::SIZE..], self.size);
        BigEndian::write_i32(&mut out[op_rw_off::OUT_CODE..], self.out_code);
        BigEndian::write_u64(&mut out[op_rw_off::OUT_SIZE..], self.out_size);
    }

    fn decode(raw: &[u8]) -> Self {
        FileOpRw {
            vtable: BigEndian::read_u32(&raw[op_rw_off::VTABLE..]),
            op: BigEndian::read_u32(&raw[op_rw_off::OP..]),
            x8: BigEndian::read_u32(&raw[op_rw_off::X8..]),
            xc: BigEndian::read_u32(&raw[op_rw_off::XC..]),
            fd: BigEndian::read_u32(&raw[op_rw_off::FD..]),
            buf: BigEndian::read_u32(&raw[op_rw_off::BUF..]),
            offset: BigEndian::read_u64(&raw[op_rw_off::OFFSET..]),
            size: BigEndian::read_u64(&raw[op_rw_off::SIZE..]),
            out_code: BigEndian::read_i32(&raw[op_rw_off::OUT_CODE..]),
            out_size: BigEndian::read_u64(&raw[op_rw_off::OUT_SIZE..]),
        }
    }
}

pub mod op_open_off {
    pub const VTABLE: usize = 0x00;
    pub const OP: usize = 0x04;
    pub const X8: usize = 0x08;
    pub const XC: usize = 0x0C;
    pub const FD: usize = 0x10;
    pub const OFFSET: usize = 0x18;
    pub const VTABLE2: usize = 0x20;
    pub const ARG1: usize = 0x24;
    pub const ARG2: usize = 0x28;
    pub const ARG_SIZE: usize = 0x2C;
    pub const ARG_PTR: usize = 0x30;
    pub const OUT_CODE: usize = 0x34;
    pub const OUT_FD: usize = 0x38;
}

/// Open an archive member of an already open file (op 0x80000009).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOpOpenByFd {
    pub vtable: u32,
    pub op: u32,
    pub x8: u32,
    pub xc: u32,
    pub fd: u32,
    pub offset: u64,
    pub vtable2: u32,
    pub arg1: u32,
    pub arg2: u32,
    pub arg_size: u32,
    pub arg_ptr: u32,
    pub out_code: i32,
    pub out_fd: u32,
}

// out_fd ends at 0x3c, tail padding to the 8-byte alignment of `offset`
const _: () = assert!((op_open_off::OUT_FD + 4 + 7) & !7 == FileOpOpenByFd::SIZE);

impl GuestRecord for FileOpOpenByFd {
    const SIZE: usize = 0x40;

    fn encode(&self, out: &mut [u8]) {
        out[..Self::SIZE].fill(0);
        BigEndian::write_u32(&mut out[op_open_off::VTABLE..], self.vtable);
        BigEndian::write_u32(&mut out[op_open_off::OP..], self.op);
        BigEndian::write_u32(&mut out[op_open_off::X8..], self.x8);
        BigEndian::write_u32(&mut out[op_open_off::XC..], self.xc);
        BigEndian::write_u32(&mut out[op_open_off::FD..], self.fd);
        BigEndian::write_u64(&mut out[op_open_off::OFFSET..], self.offset);
        BigEndian::write_u32(&mut out[op_open_off::VTABLE2..], self.vtable2);
        BigEndian::write_u32(&mut out[op_open_off::ARG1..], self.arg1);
        BigEndian::write_u32(&mut out[op_open_off::ARG2..], self.arg2);
        BigEndian::write_u32(&mut out[op_open_off::ARG_SIZE..], self.arg_size);
        BigEndian::write_u32(&mut out[op_open_off::ARG_PTR..], self.arg_ptr);
        BigEndian::write_i32(&mut out[op_open_off::OUT_CODE..], self.out_code);
        BigEndian::write_u32(&mut out[op_open_off::OUT_FD..], self.out_fd);
    }

    fn decode(raw: &[u8]) -> Self {
        FileOpOpenByFd {
            vtable: BigEndian::read_u32(&raw[op_open_off::VTABLE..]),
            op: BigEndian::read_u32(&raw[op_open_off::OP..]),
            x8: BigEndian::read_u32(&raw[op_open_off::X8..]),
            xc: BigEndian::read_u32(&raw[op_open_off::XC..]),
            fd: BigEndian::read_u32(&raw[op_open_off::FD..]),
            offset: BigEndian::read_u64(&raw[op_open_off::OFFSET..]),
            vtable2: BigEndian::read_u32(&raw[op_open_off::VTABLE2..]),
            arg1: BigEndian::read_u32(&raw[op_open_off::ARG1..]),
            arg2: BigEndian::read_u32(&raw[op_open_off::ARG2..]),
            arg_size: BigEndian::read_u32(&raw[op_open_off::ARG_SIZE..]),
            arg_ptr: BigEndian::read_u32(&raw[op_open_off::ARG_PTR..]),
            out_code: BigEndian::read_i32(&raw[op_open_off::OUT_CODE..]),
            out_fd: BigEndian::read_u32(&raw[op_open_off::OUT_FD..]),
        }
    }
}

pub mod op_dir_off {
    pub const CODE: usize = 0x00;
    pub const COUNT: usize = 0x04;
    pub const PTR: usize = 0x08;
    pub const MAX: usize = 0x0C;
}

/// Argument of the bulk directory read (op 0xE0000012). The guest passes a
/// pointer to this sub-block, not to the enclosing [`FileOpDir`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOpDirInfo {
    pub code: i32,
    pub count: u32,
    pub ptr: u32,
    pub max: u32,
}

const _: () = assert!(op_dir_off::MAX + 4 == FileOpDirInfo::SIZE);

impl GuestRecord for FileOpDirInfo {
    const SIZE: usize = 0x10;

    fn encode(&self, out: &mut [u8]) {
        BigEndian::write_i32(&mut out[op_dir_off::CODE..], self.code);
        BigEndian::write_u32(&mut out[op_dir_off::COUNT..], self.count);
        BigEndian::write_u32(&mut out[op_dir_off::PTR..], self.ptr);
        BigEndian::write_u32(&mut out[op_dir_off::MAX..], self.max);
    }

    fn decode(raw: &[u8]) -> Self {
        FileOpDirInfo {
            code: BigEndian::read_i32(&raw[op_dir_off::CODE..]),
            count: BigEndian::read_u32(&raw[op_dir_off::COUNT..]),
            ptr: BigEndian::read_u32(&raw[op_dir_off::PTR..]),
            max: BigEndian::read_u32(&raw[op_dir_off::MAX..]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOpDir {
    pub vtable: u32,
    pub op: u32,
    pub x8: u32,
    pub arg: FileOpDirInfo,
}

impl FileOpDir {
    pub const ARG_OFFSET: usize = 0x0C;
}

const _: () = assert!(FileOpDir::ARG_OFFSET + FileOpDirInfo::SIZE == FileOpDir::SIZE);

impl GuestRecord for FileOpDir {
    const SIZE: usize = 0x1C;

    fn encode(&self, out: &mut [u8]) {
        BigEndian::write_u32(&mut out[0x00..], self.vtable);
        BigEndian::write_u32(&mut out[0x04..], self.op);
        BigEndian::write_u32(&mut out[0x08..], self.x8);
        self.arg.encode(&mut out[Self::ARG_OFFSET..Self::SIZE]);
    }

    fn decode(raw: &[u8]) -> Self {
        FileOpDir {
            vtable: BigEndian::read_u32(&raw[0x00..]),
            op: BigEndian::read_u32(&raw[0x04..]),
            x8: BigEndian::read_u32(&raw[0x08..]),
            arg: FileOpDirInfo::decode(&raw[Self::ARG_OFFSET..Self::SIZE]),
        }
    }
}

/// Op 0xC0000006, seen right before some opens. Only the layout is known;
/// the comments give the values observed in the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileOpProbe {
    pub size: u32, // 0x20
    pub x4: u32,   // 0x10
    pub x8: u32,   // 0x18
    pub xc: u32,   // 0x9
    pub name: u32, // path pointer
    pub x14: u32,  // 0
    pub x18: u32,  // 0x80010003
    pub x1c: u32,  // 0
}

const _: () = assert!(FileOpProbe::SIZE == 8 * 4);

impl GuestRecord for FileOpProbe {
    const SIZE: usize = 0x20;

    fn encode(&self, out: &mut [u8]) {
        let words = [self.size, self.x4, self.x8, self.xc, self.name, self.x14, self.x18, self.x1c];
        for (i, w) in words.iter().enumerate() {
            BigEndian::write_u32(&mut out[i * 4..], *w);
        }
    }

    fn decode(raw: &[u8]) -> Self {
        let w = |i: usize| BigEndian::read_u32(&raw[i * 4..]);
        FileOpProbe { size: w(0), x4: w(1), x8: w(2), xc: w(3), name: w(4), x14: w(5), x18: w(6), x1c: w(7) }
    }
}

//------------------------------------SYSCALL ARGUMENTS------------------------------------
// Arguments arrive as 64-bit register values. 32-bit arguments may be zero-
// or sign-extended by the guest compiler; anything wider is rejected.

pub fn get_int(arg: u64) -> Result<i32, i32> {
    let signed = arg as i64;
    if signed >= i32::MIN as i64 && signed <= i32::MAX as i64 {
        return Ok(signed as i32);
    }
    if arg >> 32 == 0 {
        return Ok(arg as u32 as i32);
    }
    Err(syscall_error(CellError::EINVAL, "dispatcher", "input data not valid"))
}

pub fn get_uint(arg: u64) -> Result<u32, i32> {
    if arg >> 32 == 0 {
        return Ok(arg as u32);
    }
    if (arg as i64) < 0 && (arg as i64) >= i32::MIN as i64 {
        return Ok(arg as u32);
    }
    Err(syscall_error(CellError::EINVAL, "dispatcher", "input data not valid"))
}

pub fn get_long(arg: u64) -> Result<i64, i32> {
    Ok(arg as i64)
}

pub fn get_ulong(arg: u64) -> Result<u64, i32> {
    Ok(arg)
}

// Pointers are 32-bit; null is let through and rejected by the call itself
pub fn get_ptr(arg: u64) -> Result<GuestAddr, i32> {
    if arg >> 32 == 0 {
        return Ok(arg as GuestAddr);
    }
    Err(syscall_error(CellError::EFAULT, "dispatcher", "pointer outside the 32-bit address space"))
}
