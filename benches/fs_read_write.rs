/* Benchmarks for the emulated read/write paths, plain and at an offset.
 * The at-offset variant goes through fcntl and saves/restores the host
 * position, so it's useful to have a comparison which does not. */

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use rustcellfs::cellfs::syscalls::fs_constants::*;
use rustcellfs::cellfs::{FsConfig, FsContext};
use rustcellfs::interface::{FileOpRw, FlatMemory, GuestMemory, GuestMemoryExt, GuestRecord, RustRfc, CELL_OK};

use std::ffi::{c_void, CString};
use std::time::Duration;

mod global_criterion_settings;

// Rewind once this much has been written so reads always find data
const RESET_LENGTH: u64 = 1024 * 1024 * 4; // 4MB

pub fn run_benchmark(c: &mut Criterion) {
    let root = tempfile::tempdir().unwrap();
    let mem = RustRfc::new(FlatMemory::new(0x1_0000, 1 << 20));
    let ctx = FsContext::new(&FsConfig::ps3_default(root.path()), mem.clone()).unwrap();

    let path = mem.alloc(32).unwrap();
    mem.write_bytes(path, b"/dev_hdd0/foo\0").unwrap();
    let fdp = mem.alloc(4).unwrap();
    let countp = mem.alloc(8).unwrap();
    let posp = mem.alloc(8).unwrap();
    let block = mem.alloc(FileOpRw::SIZE).unwrap();

    let mut group = c.benchmark_group("Compare fs:write+read");

    // Should be similar.  Use a linear scale...
    group.plot_config(
        criterion::PlotConfiguration::default().summary_scale(criterion::AxisScale::Linear),
    );

    // Reduce the time to reduce disk space needed and go faster.
    group.measurement_time(Duration::from_secs(2));
    group.warm_up_time(Duration::from_secs(1));

    for buflen in [1u64, 64, 1024, 65536].iter() {
        let buf = mem.alloc(*buflen as usize).unwrap();
        mem.write_bytes(buf, &vec![b'X'; *buflen as usize]).unwrap();

        assert_eq!(ctx.open_syscall(path, O_CREAT | O_TRUNC | O_RDWR, fdp, S_IRWA, 0, 0), CELL_OK);
        let fd = mem.read_u32(fdp).unwrap();

        // Position after the write
        let mut pos = 0;
        group.bench_with_input(BenchmarkId::new("TF02:cellfs write", buflen), buflen, |b, buflen| {
            b.iter(|| {
                pos += *buflen;
                if RESET_LENGTH < pos {
                    ctx.lseek_syscall(fd, 0, SEEK_SET, posp);
                    pos = *buflen;
                }
                assert_eq!(ctx.write_syscall(fd, buf, *buflen, countp), CELL_OK);
            })
        });

        let filled = std::fs::metadata(root.path().join("dev_hdd0/foo")).unwrap().len();
        ctx.lseek_syscall(fd, 0, SEEK_SET, posp);
        pos = 0;
        group.bench_with_input(BenchmarkId::new("TF02:cellfs read", buflen), buflen, |b, buflen| {
            b.iter(|| {
                pos += *buflen;
                if filled < pos {
                    ctx.lseek_syscall(fd, 0, SEEK_SET, posp);
                    pos = *buflen;
                }
                assert_eq!(ctx.read_syscall(fd, buf, *buflen, countp), CELL_OK);
            })
        });

        let mut offset = 0;
        group.bench_with_input(BenchmarkId::new("TF02:cellfs read at offset", buflen), buflen, |b, buflen| {
            b.iter(|| {
                if filled < offset + *buflen {
                    offset = 0;
                }
                let rw = FileOpRw { op: FCNTL_READ_AT, fd, buf, offset, size: *buflen, ..Default::default() };
                rw.write_to(mem.as_ref(), block).unwrap();
                assert_eq!(ctx.fcntl_syscall(fd, FCNTL_READ_AT, block, FileOpRw::SIZE as u32), CELL_OK);
                offset += *buflen;
            })
        });

        ctx.close_syscall(fd);
    }

    // Now do this for Native
    let native = CString::new(root.path().join("native").to_string_lossy().as_bytes()).unwrap();
    for buflen in [1usize, 64, 1024, 65536].iter() {
        let fd = unsafe { libc::open(native.as_ptr(), libc::O_CREAT | libc::O_TRUNC | libc::O_RDWR, 0o666) };
        assert!(fd > 2);
        let data = vec![b'X'; *buflen];
        let expected_retval = *buflen as isize;

        group.bench_with_input(BenchmarkId::new("TF02:Native write", buflen), buflen, |b, buflen| {
            b.iter(|| unsafe {
                assert_eq!(libc::write(fd, data.as_ptr() as *const c_void, *buflen), expected_retval);
            })
        });

        // I'll read the file length so I don't overrun this with my reads...
        let file_length = unsafe { libc::lseek(fd, 0, libc::SEEK_CUR) } as isize;
        unsafe { libc::lseek(fd, 0, libc::SEEK_SET) };

        let mut pos = 0;
        let mut read_buffer = vec![0u8; *buflen];
        group.bench_with_input(BenchmarkId::new("TF02:Native read", buflen), buflen, |b, buflen| {
            b.iter(|| unsafe {
                pos += expected_retval;
                if file_length < pos {
                    libc::lseek(fd, 0, libc::SEEK_SET);
                    pos = expected_retval;
                }
                assert_eq!(libc::read(fd, read_buffer.as_mut_ptr() as *mut c_void, *buflen), expected_retval);
            })
        });

        unsafe { libc::close(fd) };
    }
    group.finish();
}

criterion_group!(name=benches;
                 // Add the global settings here so we don't type it everywhere
                 config=global_criterion_settings::get_criterion();
                 targets=run_benchmark);
criterion_main!(benches);
