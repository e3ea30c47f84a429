// Guest address space access
//
// Guest pointers are 32-bit addresses into the emulated address space. Every
// access goes through GuestMemory, which bounds-checks it; nothing in this
// crate turns a guest pointer into a raw host pointer.

use byteorder::{BigEndian, ByteOrder};
use super::misc::{RustLock, RustMutex};
use thiserror::Error;

pub type GuestAddr = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("guest memory fault at {addr:#x} (+{len:#x})")]
pub struct MemoryFault {
    pub addr: GuestAddr,
    pub len: usize,
}

pub trait GuestMemory: Send + Sync {
    fn read_bytes(&self, addr: GuestAddr, out: &mut [u8]) -> Result<(), MemoryFault>;
    fn write_bytes(&self, addr: GuestAddr, data: &[u8]) -> Result<(), MemoryFault>;
    fn is_valid(&self, addr: GuestAddr, len: usize) -> bool;
}

/// Big-endian scalar and string helpers on top of [`GuestMemory`].
pub trait GuestMemoryExt: GuestMemory {
    fn read_u32(&self, addr: GuestAddr) -> Result<u32, MemoryFault> {
        let mut raw = [0u8; 4];
        self.read_bytes(addr, &mut raw)?;
        Ok(BigEndian::read_u32(&raw))
    }

    fn read_u64(&self, addr: GuestAddr) -> Result<u64, MemoryFault> {
        let mut raw = [0u8; 8];
        self.read_bytes(addr, &mut raw)?;
        Ok(BigEndian::read_u64(&raw))
    }

    fn write_u32(&self, addr: GuestAddr, value: u32) -> Result<(), MemoryFault> {
        let mut raw = [0u8; 4];
        BigEndian::write_u32(&mut raw, value);
        self.write_bytes(addr, &raw)
    }

    fn write_i32(&self, addr: GuestAddr, value: i32) -> Result<(), MemoryFault> {
        self.write_u32(addr, value as u32)
    }

    fn write_u64(&self, addr: GuestAddr, value: u64) -> Result<(), MemoryFault> {
        let mut raw = [0u8; 8];
        BigEndian::write_u64(&mut raw, value);
        self.write_bytes(addr, &raw)
    }

    /// Reads a NUL-terminated string of at most `limit` bytes (terminator
    /// excluded). A result of exactly `limit` bytes means no terminator was
    /// found within the limit.
    fn read_cstr(&self, addr: GuestAddr, limit: usize) -> Result<Vec<u8>, MemoryFault> {
        let mut out = Vec::new();
        let mut cursor = addr;
        while out.len() < limit {
            let mut byte = [0u8; 1];
            self.read_bytes(cursor, &mut byte)?;
            if byte[0] == 0 {
                break;
            }
            out.push(byte[0]);
            cursor = cursor.checked_add(1).ok_or(MemoryFault { addr: cursor, len: 1 })?;
        }
        Ok(out)
    }
}

impl<T: GuestMemory + ?Sized> GuestMemoryExt for T {}

/// A single contiguous mapped region `[base, base + size)`. Address 0 is
/// never mapped, so a null guest pointer always faults.
#[derive(Debug)]
pub struct FlatMemory {
    base: GuestAddr,
    data: RustLock<Vec<u8>>,
    brk: RustMutex<GuestAddr>,
}

impl FlatMemory {
    pub fn new(base: GuestAddr, size: usize) -> FlatMemory {
        let base = base.max(0x10);
        FlatMemory { base, data: RustLock::new(vec![0u8; size]), brk: RustMutex::new(base) }
    }

    // Bump allocation for test and bench buffers, 16-byte aligned
    pub fn alloc(&self, len: usize) -> Result<GuestAddr, MemoryFault> {
        let mut brk = self.brk.lock();
        let start = (*brk + 15) & !15;
        if !self.is_valid(start, len.max(1)) {
            return Err(MemoryFault { addr: start, len });
        }
        *brk = start + len.max(1) as u32;
        Ok(start)
    }

    pub fn fetch(&self, addr: GuestAddr, len: usize) -> Result<Vec<u8>, MemoryFault> {
        let mut out = vec![0u8; len];
        self.read_bytes(addr, &mut out)?;
        Ok(out)
    }

    fn range(&self, addr: GuestAddr, len: usize) -> Option<std::ops::Range<usize>> {
        if addr == 0 || addr < self.base {
            return None;
        }
        let start = (addr - self.base) as usize;
        let end = start.checked_add(len)?;
        if end > self.data.read().len() {
            return None;
        }
        Some(start..end)
    }
}

impl GuestMemory for FlatMemory {
    fn read_bytes(&self, addr: GuestAddr, out: &mut [u8]) -> Result<(), MemoryFault> {
        let range = self.range(addr, out.len()).ok_or(MemoryFault { addr, len: out.len() })?;
        out.copy_from_slice(&self.data.read()[range]);
        Ok(())
    }

    fn write_bytes(&self, addr: GuestAddr, data: &[u8]) -> Result<(), MemoryFault> {
        let range = self.range(addr, data.len()).ok_or(MemoryFault { addr, len: data.len() })?;
        self.data.write()[range].copy_from_slice(data);
        Ok(())
    }

    fn is_valid(&self, addr: GuestAddr, len: usize) -> bool {
        self.range(addr, len).is_some()
    }
}
