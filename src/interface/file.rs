// File related interface
//
// Every host filesystem access made by the emulation layer goes through this
// file. Open handles are shared as Arc<Mutex<File>> so that a file and the
// views carved out of it serialize on the same host position.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, FileTimes, Metadata, OpenOptions, ReadDir};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::sync::Arc;
use std::time::SystemTime;

pub use std::path::{Component as RustPathComponent, Path as RustPath, PathBuf as RustPathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostOpenFlags {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub exclusive: bool,
    pub truncate: bool,
}

pub fn openfile(path: &RustPath, flags: HostOpenFlags) -> io::Result<HostFile> {
    HostFile::new(path, flags)
}

#[derive(Debug, Clone)]
pub struct HostFile {
    path: RustPathBuf,
    fobj: Arc<Mutex<File>>,
}

// Read until the buffer is full or the file ends
fn read_full(fobj: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match fobj.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

impl HostFile {
    fn new(path: &RustPath, flags: HostOpenFlags) -> io::Result<HostFile> {
        let mut opts = OpenOptions::new();
        opts.read(flags.read).write(flags.write || flags.truncate);
        if !flags.write && !flags.truncate && flags.create {
            // std refuses creation without write access
            let excl = if flags.exclusive { libc::O_EXCL } else { 0 };
            opts.custom_flags(libc::O_CREAT | excl);
        } else if flags.exclusive {
            opts.create_new(true);
        } else if flags.create {
            opts.create(true);
        }
        if flags.truncate {
            opts.truncate(true);
        }
        let f = opts.open(path)?;
        if f.metadata()?.is_dir() {
            return Err(io::Error::from_raw_os_error(libc::EISDIR));
        }
        Ok(HostFile { path: path.to_path_buf(), fobj: Arc::new(Mutex::new(f)) })
    }

    pub fn path(&self) -> &RustPath {
        &self.path
    }

    /// Two handles are the same when they share the underlying host file.
    pub fn same_handle(&self, other: &HostFile) -> bool {
        Arc::ptr_eq(&self.fobj, &other.fobj)
    }

    // Read from the current position, short only at EOF
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut fobj = self.fobj.lock();
        read_full(&mut fobj, buf)
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut fobj = self.fobj.lock();
        fobj.write_all(buf)?;
        Ok(buf.len())
    }

    // Position at EOF and write under one lock
    pub fn append(&self, buf: &[u8]) -> io::Result<usize> {
        let mut fobj = self.fobj.lock();
        fobj.seek(SeekFrom::End(0))?;
        fobj.write_all(buf)?;
        Ok(buf.len())
    }

    /// Reads at `offset` and puts the host position back where it was.
    pub fn readat(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut fobj = self.fobj.lock();
        let saved = fobj.stream_position()?;
        fobj.seek(SeekFrom::Start(offset))?;
        let res = read_full(&mut fobj, buf);
        fobj.seek(SeekFrom::Start(saved))?;
        res
    }

    /// Writes at `offset` and puts the host position back where it was.
    pub fn writeat(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let mut fobj = self.fobj.lock();
        let saved = fobj.stream_position()?;
        fobj.seek(SeekFrom::Start(offset))?;
        let res = fobj.write_all(buf).map(|_| buf.len());
        fobj.seek(SeekFrom::Start(saved))?;
        res
    }

    pub fn seek(&self, pos: SeekFrom) -> io::Result<u64> {
        self.fobj.lock().seek(pos)
    }

    pub fn position(&self) -> io::Result<u64> {
        self.fobj.lock().stream_position()
    }

    pub fn size(&self) -> io::Result<u64> {
        Ok(self.fobj.lock().metadata()?.len())
    }

    pub fn metadata(&self) -> io::Result<Metadata> {
        self.fobj.lock().metadata()
    }

    pub fn set_len(&self, length: u64) -> io::Result<()> {
        self.fobj.lock().set_len(length)
    }
}

//------------------------------------DIRECTORIES------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFileKind {
    Dir,
    File,
    Symlink,
    Other,
}

impl HostFileKind {
    pub fn of(ft: fs::FileType) -> HostFileKind {
        if ft.is_symlink() {
            HostFileKind::Symlink
        } else if ft.is_dir() {
            HostFileKind::Dir
        } else if ft.is_file() {
            HostFileKind::File
        } else {
            HostFileKind::Other
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostDirEntry {
    pub name: Vec<u8>,
    pub kind: HostFileKind,
    /// Metadata of the entry itself; links are not followed.
    pub metadata: Metadata,
}

pub fn opendir(path: &RustPath) -> io::Result<HostDir> {
    HostDir::new(path)
}

#[derive(Debug)]
pub struct HostDir {
    path: RustPathBuf,
    iter: ReadDir,
}

impl HostDir {
    fn new(path: &RustPath) -> io::Result<HostDir> {
        let iter = fs::read_dir(path)?;
        Ok(HostDir { path: path.to_path_buf(), iter })
    }

    pub fn path(&self) -> &RustPath {
        &self.path
    }

    /// Next entry in host order. `.` and `..` never show up here.
    pub fn next_entry(&mut self) -> Option<io::Result<HostDirEntry>> {
        let entry = match self.iter.next()? {
            Ok(e) => e,
            Err(e) => return Some(Err(e)),
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(HostDirEntry {
            name: entry.file_name().as_bytes().to_vec(),
            kind: HostFileKind::of(metadata.file_type()),
            metadata,
        }))
    }
}

pub fn listdir(path: &RustPath) -> io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        names.push(entry?.file_name());
    }
    Ok(names)
}

//------------------------------------PATH OPERATIONS------------------------------------

pub fn pathexists(path: &RustPath) -> bool {
    fs::symlink_metadata(path).is_ok()
}

// Reads entire file into bytes
pub fn readfile_to_new_bytes(path: &RustPath) -> io::Result<Vec<u8>> {
    fs::read(path)
}

pub fn path_metadata(path: &RustPath) -> io::Result<Metadata> {
    fs::metadata(path)
}

// Metadata of the link itself when `path` is a symlink
pub fn link_metadata(path: &RustPath) -> io::Result<Metadata> {
    fs::symlink_metadata(path)
}

pub fn makedir(path: &RustPath) -> io::Result<()> {
    fs::create_dir(path)
}

pub fn makedir_all(path: &RustPath) -> io::Result<()> {
    fs::create_dir_all(path)
}

pub fn removedir(path: &RustPath) -> io::Result<()> {
    fs::remove_dir(path)
}

pub fn removefile(path: &RustPath) -> io::Result<()> {
    fs::remove_file(path)
}

pub fn renamepath(from: &RustPath, to: &RustPath) -> io::Result<()> {
    fs::rename(from, to)
}

pub fn truncatepath(path: &RustPath, length: u64) -> io::Result<()> {
    let f = OpenOptions::new().write(true).open(path)?;
    f.set_len(length)
}

// Permission bits only; the file type bits are owned by the host
pub fn chmodpath(path: &RustPath, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

pub fn set_path_times(path: &RustPath, accessed: SystemTime, modified: SystemTime) -> io::Result<()> {
    let f = File::open(path)?;
    f.set_times(FileTimes::new().set_accessed(accessed).set_modified(modified))
}
