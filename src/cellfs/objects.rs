//! Filesystem kernel objects and the table that owns them.
//!
//! ## Object Table
//!
//! Open files and directories are reachable through small integer ids in
//! `[STARTINGFD, MAXFD)`. The table hands out the lowest free id, serves
//! lookups from a concurrent map and serializes allocation and removal behind
//! a mutex, so an id is never given to two live objects.
//!
//! ## Views
//!
//! A [`FileObject`] can carve a bounded window out of another open file. The
//! view shares the host handle and keeps its own cursor; every view transfer
//! is a positional read or write that leaves the host position untouched.
//! A file and its views still share that host position, so a caller mixing
//! both from several threads has to bring its own ordering.

use std::fs::Metadata;
use std::io::SeekFrom;
use std::os::unix::fs::MetadataExt;

use crate::cellfs::error::{FsError, FsResult};
use crate::cellfs::mount::MountId;
use crate::cellfs::syscalls::fs_constants::*;
use crate::interface::{
    self, CellFsStat, FsMselfEntry, FsMselfHeader, GuestAddr, GuestMemory, GuestRecord, HostDir, HostDirEntry,
    HostFile, HostFileKind, HostOpenFlags, RustHashMap, RustMutex, RustPath, RustRfc,
};

/// Checks open flags on their own, before any host access.
pub fn validate_open_flags(flags: i32) -> FsResult<()> {
    if flags & !O_VALIDFLAGS != 0 {
        return Err(FsError::InvalidArgument("unknown open flag"));
    }
    let acc = flags & O_ACCMODE;
    if acc == O_ACCMODE {
        return Err(FsError::InvalidArgument("access mode 3"));
    }
    if flags & O_TRUNC != 0 && acc == O_RDONLY {
        return Err(FsError::InvalidArgument("O_TRUNC without write access"));
    }
    if flags & O_MSELF != 0 && flags != (O_MSELF | O_RDONLY) {
        return Err(FsError::InvalidArgument("O_MSELF only opens read-only"));
    }
    Ok(())
}

pub fn dirent_type(kind: HostFileKind) -> u8 {
    match kind {
        HostFileKind::Dir => CELL_FS_TYPE_DIRECTORY,
        HostFileKind::File => CELL_FS_TYPE_REGULAR,
        HostFileKind::Symlink => CELL_FS_TYPE_SYMLINK,
        HostFileKind::Other => CELL_FS_TYPE_UNKNOWN,
    }
}

/// Builds the guest stat record. Ownership is always root and the
/// permission bits are fixed per file type.
pub fn stat_from_metadata(md: &Metadata, block_size: u64) -> CellFsStat {
    let mode = match HostFileKind::of(md.file_type()) {
        HostFileKind::Dir => S_IFDIR | S_IRWXA,
        HostFileKind::Symlink => S_IFLNK | S_IRWXA,
        _ => S_IFREG | S_IRWA,
    };
    CellFsStat {
        mode,
        uid: 0,
        gid: 0,
        atime: md.atime(),
        mtime: md.mtime(),
        ctime: md.ctime(),
        size: if md.is_dir() { 0 } else { md.len() },
        blksize: block_size,
    }
}

//------------------------------------FILE OBJECT------------------------------------

#[derive(Debug)]
struct Window {
    start: u64,
    len: u64,
    cursor: RustMutex<u64>,
}

impl Window {
    // Bytes available from `pos` for a transfer of `want`
    fn clamp(&self, pos: u64, want: usize) -> usize {
        let room = self.len.saturating_sub(pos);
        (want as u64).min(room) as usize
    }

    fn host_offset(&self, pos: u64) -> FsResult<u64> {
        self.start.checked_add(pos).ok_or(FsError::InvalidArgument("offset overflows the view"))
    }
}

#[derive(Debug)]
pub struct FileObject {
    path: Vec<u8>,
    mount: MountId,
    flags: i32,
    mode: i32,
    file: HostFile,
    window: Option<Window>,
}

impl FileObject {
    /// Opens `host` for the guest. Flags must already have passed
    /// [`validate_open_flags`].
    pub fn open(path: &[u8], mount: MountId, host: &RustPath, flags: i32, mode: i32) -> FsResult<FileObject> {
        let acc = flags & O_ACCMODE;
        let hflags = HostOpenFlags {
            read: acc == O_RDONLY || acc == O_RDWR,
            write: acc == O_WRONLY || acc == O_RDWR,
            create: flags & O_CREAT != 0,
            exclusive: flags & O_CREAT != 0 && flags & O_EXCL != 0,
            truncate: flags & O_TRUNC != 0,
        };
        let file = interface::openfile(host, hflags)?;
        let fobj = FileObject { path: path.to_vec(), mount, flags, mode, file, window: None };
        if flags & O_MSELF != 0 {
            fobj.verify_mself()?;
        }
        Ok(fobj)
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn mount(&self) -> MountId {
        self.mount
    }

    pub fn flags(&self) -> i32 {
        self.flags
    }

    pub fn mode(&self) -> i32 {
        self.mode
    }

    pub fn is_view(&self) -> bool {
        self.window.is_some()
    }

    pub fn can_read(&self) -> bool {
        let acc = self.flags & O_ACCMODE;
        acc == O_RDONLY || acc == O_RDWR
    }

    pub fn can_write(&self) -> bool {
        let acc = self.flags & O_ACCMODE;
        acc == O_WRONLY || acc == O_RDWR
    }

    pub fn shares_handle_with(&self, other: &FileObject) -> bool {
        self.file.same_handle(&other.file)
    }

    // Transfer at the object's own cursor; views translate into their window
    fn read_raw(&self, buf: &mut [u8]) -> FsResult<usize> {
        match &self.window {
            None => Ok(self.file.read(buf)?),
            Some(w) => {
                let mut cursor = w.cursor.lock();
                let n = w.clamp(*cursor, buf.len());
                let got = self.file.readat(&mut buf[..n], w.host_offset(*cursor)?)?;
                *cursor += got as u64;
                Ok(got)
            }
        }
    }

    fn write_raw(&self, data: &[u8]) -> FsResult<usize> {
        match &self.window {
            None if self.flags & O_APPEND != 0 => Ok(self.file.append(data)?),
            None => Ok(self.file.write(data)?),
            Some(w) => {
                let mut cursor = w.cursor.lock();
                let n = w.clamp(*cursor, data.len());
                let put = self.file.writeat(&data[..n], w.host_offset(*cursor)?)?;
                *cursor += put as u64;
                Ok(put)
            }
        }
    }

    /// Reads at the current position; short only at end of file (or of the
    /// window).
    pub fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        if !self.can_read() {
            return Err(FsError::PermissionDenied);
        }
        self.read_raw(buf)
    }

    pub fn write(&self, data: &[u8]) -> FsResult<usize> {
        if !self.can_write() {
            return Err(FsError::PermissionDenied);
        }
        self.write_raw(data)
    }

    /// Reads `nbytes` into guest memory through an intermediate buffer, one
    /// chunk at a time.
    pub fn op_read(&self, mem: &dyn GuestMemory, buf: GuestAddr, nbytes: u64) -> FsResult<u64> {
        if !self.can_read() {
            return Err(FsError::PermissionDenied);
        }
        if nbytes == 0 {
            return Ok(0);
        }
        if !mem.is_valid(buf, nbytes as usize) {
            return Err(FsError::InvalidArgument("read buffer is not mapped"));
        }
        let mut chunk = vec![0u8; (nbytes as usize).min(FS_IO_CHUNK)];
        let mut done: u64 = 0;
        while done < nbytes {
            let want = ((nbytes - done) as usize).min(FS_IO_CHUNK);
            let got = self.read_raw(&mut chunk[..want])?;
            mem.write_bytes(buf + done as u32, &chunk[..got])?;
            done += got as u64;
            if got < want {
                break;
            }
        }
        Ok(done)
    }

    pub fn op_write(&self, mem: &dyn GuestMemory, buf: GuestAddr, nbytes: u64) -> FsResult<u64> {
        if !self.can_write() {
            return Err(FsError::PermissionDenied);
        }
        if nbytes == 0 {
            return Ok(0);
        }
        if !mem.is_valid(buf, nbytes as usize) {
            return Err(FsError::InvalidArgument("write buffer is not mapped"));
        }
        let mut chunk = vec![0u8; (nbytes as usize).min(FS_IO_CHUNK)];
        let mut done: u64 = 0;
        while done < nbytes {
            let want = ((nbytes - done) as usize).min(FS_IO_CHUNK);
            mem.read_bytes(buf + done as u32, &mut chunk[..want])?;
            let put = self.write_raw(&chunk[..want])?;
            done += put as u64;
            if put < want {
                break;
            }
        }
        Ok(done)
    }

    pub fn seek(&self, offset: i64, whence: i32) -> FsResult<u64> {
        let target = |base: u64| -> FsResult<u64> {
            let pos = base as i128 + offset as i128;
            if pos < 0 || pos > i64::MAX as i128 {
                return Err(FsError::InvalidArgument("seek before start of file"));
            }
            Ok(pos as u64)
        };
        match &self.window {
            None => {
                let pos = match whence {
                    SEEK_SET => target(0)?,
                    SEEK_CUR => target(self.file.position()?)?,
                    SEEK_END => target(self.file.size()?)?,
                    _ => return Err(FsError::InvalidArgument("bad whence")),
                };
                Ok(self.file.seek(SeekFrom::Start(pos))?)
            }
            Some(w) => {
                let mut cursor = w.cursor.lock();
                let pos = match whence {
                    SEEK_SET => target(0)?,
                    SEEK_CUR => target(*cursor)?,
                    SEEK_END => target(w.len)?,
                    _ => return Err(FsError::InvalidArgument("bad whence")),
                };
                *cursor = pos;
                Ok(pos)
            }
        }
    }

    pub fn position(&self) -> FsResult<u64> {
        match &self.window {
            None => Ok(self.file.position()?),
            Some(w) => Ok(*w.cursor.lock()),
        }
    }

    /// Positional read; the cursor is left where it was.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        if !self.can_read() {
            return Err(FsError::PermissionDenied);
        }
        match &self.window {
            None => Ok(self.file.readat(buf, offset)?),
            Some(w) => {
                let n = w.clamp(offset, buf.len());
                if n == 0 {
                    return Ok(0);
                }
                Ok(self.file.readat(&mut buf[..n], w.host_offset(offset)?)?)
            }
        }
    }

    pub fn write_at(&self, offset: u64, data: &[u8]) -> FsResult<usize> {
        if !self.can_write() {
            return Err(FsError::PermissionDenied);
        }
        match &self.window {
            None => Ok(self.file.writeat(data, offset)?),
            Some(w) => {
                let n = w.clamp(offset, data.len());
                if n == 0 {
                    return Ok(0);
                }
                Ok(self.file.writeat(&data[..n], w.host_offset(offset)?)?)
            }
        }
    }

    /// [`op_read`](Self::op_read) at an explicit offset; the cursor is left
    /// where it was.
    pub fn op_read_at(&self, mem: &dyn GuestMemory, buf: GuestAddr, nbytes: u64, offset: u64) -> FsResult<u64> {
        if !self.can_read() {
            return Err(FsError::PermissionDenied);
        }
        if nbytes == 0 {
            return Ok(0);
        }
        if !mem.is_valid(buf, nbytes as usize) {
            return Err(FsError::InvalidArgument("read buffer is not mapped"));
        }
        let mut chunk = vec![0u8; (nbytes as usize).min(FS_IO_CHUNK)];
        let mut done: u64 = 0;
        while done < nbytes {
            let want = ((nbytes - done) as usize).min(FS_IO_CHUNK);
            let at = offset.checked_add(done).ok_or(FsError::InvalidArgument("offset overflows the file"))?;
            let got = self.read_at(at, &mut chunk[..want])?;
            mem.write_bytes(buf + done as u32, &chunk[..got])?;
            done += got as u64;
            if got < want {
                break;
            }
        }
        Ok(done)
    }

    pub fn op_write_at(&self, mem: &dyn GuestMemory, buf: GuestAddr, nbytes: u64, offset: u64) -> FsResult<u64> {
        if !self.can_write() {
            return Err(FsError::PermissionDenied);
        }
        if nbytes == 0 {
            return Ok(0);
        }
        if !mem.is_valid(buf, nbytes as usize) {
            return Err(FsError::InvalidArgument("write buffer is not mapped"));
        }
        let mut chunk = vec![0u8; (nbytes as usize).min(FS_IO_CHUNK)];
        let mut done: u64 = 0;
        while done < nbytes {
            let want = ((nbytes - done) as usize).min(FS_IO_CHUNK);
            mem.read_bytes(buf + done as u32, &mut chunk[..want])?;
            let at = offset.checked_add(done).ok_or(FsError::InvalidArgument("offset overflows the file"))?;
            let put = self.write_at(at, &chunk[..want])?;
            done += put as u64;
            if put < want {
                break;
            }
        }
        Ok(done)
    }

    pub fn size(&self) -> FsResult<u64> {
        match &self.window {
            None => Ok(self.file.size()?),
            Some(w) => Ok(w.len),
        }
    }

    pub fn truncate(&self, length: u64) -> FsResult<()> {
        if self.window.is_some() {
            return Err(FsError::Unsupported);
        }
        if !self.can_write() {
            return Err(FsError::PermissionDenied);
        }
        Ok(self.file.set_len(length)?)
    }

    pub fn stat(&self, block_size: u64) -> FsResult<CellFsStat> {
        let md = self.file.metadata()?;
        let mut sb = stat_from_metadata(&md, block_size);
        if let Some(w) = &self.window {
            sb.size = w.len;
        }
        Ok(sb)
    }

    fn read_record<R: GuestRecord>(&self, offset: u64) -> FsResult<Option<R>> {
        let mut raw = vec![0u8; R::SIZE];
        match &self.window {
            None => {
                if self.file.readat(&mut raw, offset)? < R::SIZE {
                    return Ok(None);
                }
            }
            Some(w) => {
                if w.clamp(offset, R::SIZE) < R::SIZE || self.file.readat(&mut raw, w.host_offset(offset)?)? < R::SIZE {
                    return Ok(None);
                }
            }
        }
        Ok(Some(R::decode(&raw)))
    }

    /// Checks the archive header at offset 0.
    pub fn verify_mself(&self) -> FsResult<FsMselfHeader> {
        let hdr: FsMselfHeader = self.read_record(0)?.ok_or(FsError::NotMself)?;
        if hdr.magic != MSELF_MAGIC || hdr.format_version != MSELF_VERSION || hdr.entry_size != MSELF_ENTRY_SIZE {
            return Err(FsError::NotMself);
        }
        Ok(hdr)
    }

    pub fn mself_entries(&self) -> FsResult<Vec<FsMselfEntry>> {
        let hdr = self.verify_mself()?;
        let mut entries = Vec::new();
        for i in 0..hdr.entry_num as u64 {
            let off = FsMselfHeader::SIZE as u64 + i * MSELF_ENTRY_SIZE as u64;
            match self.read_record::<FsMselfEntry>(off)? {
                Some(e) => entries.push(e),
                None => return Err(FsError::NotMself),
            }
        }
        Ok(entries)
    }

    /// Window length for a view starting at `offset`: the archive member
    /// placed there when this is an MSELF archive, otherwise up to the end.
    pub fn view_extent(&self, offset: u64) -> FsResult<Option<u64>> {
        if self.flags & O_MSELF == 0 {
            return Ok(None);
        }
        Ok(self.mself_entries()?.into_iter().find(|e| e.offset == offset).map(|e| e.size))
    }

    /// Bounded window `[offset, offset + size)` over the same host handle,
    /// clamped to this object's extent. `None` runs to the end.
    pub fn make_view(&self, offset: u64, size: Option<u64>) -> FsResult<FileObject> {
        let (base, avail) = match &self.window {
            None => (0, self.file.size()?),
            Some(w) => (w.start, w.len),
        };
        let room = avail.saturating_sub(offset);
        let len = size.map_or(room, |s| s.min(room));
        Ok(FileObject {
            path: self.path.clone(),
            mount: self.mount,
            flags: self.flags & O_ACCMODE,
            mode: self.mode,
            file: self.file.clone(),
            window: Some(Window { start: base + offset.min(avail), len, cursor: RustMutex::new(0) }),
        })
    }
}

//------------------------------------DIRECTORY OBJECT------------------------------------

#[derive(Debug)]
struct DirCursor {
    host: HostDir,
    peeked: Option<HostDirEntry>,
    done: bool,
}

impl DirCursor {
    fn pull(&mut self) -> FsResult<Option<HostDirEntry>> {
        if let Some(e) = self.peeked.take() {
            return Ok(Some(e));
        }
        while !self.done {
            match self.host.next_entry() {
                None => self.done = true,
                Some(Ok(e)) => return Ok(Some(e)),
                // removed between listing and stat
                Some(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}

#[derive(Debug)]
pub struct DirObject {
    path: Vec<u8>,
    mount: MountId,
    cursor: RustMutex<DirCursor>,
}

impl DirObject {
    pub fn open(path: &[u8], mount: MountId, host: &RustPath) -> FsResult<DirObject> {
        let md = interface::path_metadata(host)?;
        if !md.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let hd = interface::opendir(host)?;
        Ok(DirObject {
            path: path.to_vec(),
            mount,
            cursor: RustMutex::new(DirCursor { host: hd, peeked: None, done: false }),
        })
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    pub fn mount(&self) -> MountId {
        self.mount
    }

    /// Next entry in host order, `None` once exhausted (and from then on).
    pub fn read_next(&self) -> FsResult<Option<HostDirEntry>> {
        self.cursor.lock().pull()
    }

    /// Whether another entry remains, without consuming it.
    pub fn has_more(&self) -> FsResult<bool> {
        let mut cursor = self.cursor.lock();
        if cursor.peeked.is_none() {
            cursor.peeked = cursor.pull()?;
        }
        Ok(cursor.peeked.is_some())
    }
}

//------------------------------------OBJECT TABLE------------------------------------

#[derive(Debug, Clone)]
pub enum FsObject {
    File(RustRfc<FileObject>),
    Dir(RustRfc<DirObject>),
}

impl FsObject {
    pub fn path(&self) -> &[u8] {
        match self {
            FsObject::File(f) => f.path(),
            FsObject::Dir(d) => d.path(),
        }
    }

    pub fn mount(&self) -> MountId {
        match self {
            FsObject::File(f) => f.mount(),
            FsObject::Dir(d) => d.mount(),
        }
    }
}

impl From<FileObject> for FsObject {
    fn from(f: FileObject) -> FsObject {
        FsObject::File(RustRfc::new(f))
    }
}

impl From<DirObject> for FsObject {
    fn from(d: DirObject) -> FsObject {
        FsObject::Dir(RustRfc::new(d))
    }
}

#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: RustHashMap<u32, FsObject>,
    alloc: RustMutex<()>,
}

impl ObjectTable {
    pub fn new() -> ObjectTable {
        ObjectTable::default()
    }

    /// Allocates the lowest free id and stores what `factory` builds under
    /// it. The factory is not called when the table is full.
    pub fn create<F>(&self, factory: F) -> FsResult<u32>
    where
        F: FnOnce() -> FsResult<FsObject>,
    {
        let _guard = self.alloc.lock();
        let id = (STARTINGFD..MAXFD).find(|id| !self.objects.contains_key(id)).ok_or(FsError::ResourceExhausted)?;
        let obj = factory()?;
        log::trace!("object {} created for {}", id, String::from_utf8_lossy(obj.path()));
        self.objects.insert(id, obj);
        Ok(id)
    }

    pub fn get(&self, id: u32) -> FsResult<FsObject> {
        if !(STARTINGFD..MAXFD).contains(&id) {
            return Err(FsError::BadDescriptor);
        }
        self.objects.get(&id).map(|o| o.value().clone()).ok_or(FsError::BadDescriptor)
    }

    pub fn get_file(&self, id: u32) -> FsResult<RustRfc<FileObject>> {
        match self.get(id)? {
            FsObject::File(f) => Ok(f),
            FsObject::Dir(_) => Err(FsError::IsADirectory),
        }
    }

    pub fn get_dir(&self, id: u32) -> FsResult<RustRfc<DirObject>> {
        match self.get(id)? {
            FsObject::Dir(d) => Ok(d),
            FsObject::File(_) => Err(FsError::NotADirectory),
        }
    }

    fn remove_if<P: FnOnce(&FsObject) -> FsResult<()>>(&self, id: u32, check: P) -> FsResult<FsObject> {
        let _guard = self.alloc.lock();
        check(&self.get(id)?)?;
        let (_, obj) = self.objects.remove(&id).ok_or(FsError::BadDescriptor)?;
        log::trace!("object {} released", id);
        Ok(obj)
    }

    /// Releases the id. The object itself goes away with its last `Arc`.
    pub fn remove(&self, id: u32) -> FsResult<FsObject> {
        self.remove_if(id, |_| Ok(()))
    }

    pub fn remove_file(&self, id: u32) -> FsResult<FsObject> {
        self.remove_if(id, |o| match o {
            FsObject::File(_) => Ok(()),
            FsObject::Dir(_) => Err(FsError::IsADirectory),
        })
    }

    pub fn remove_dir(&self, id: u32) -> FsResult<FsObject> {
        self.remove_if(id, |o| match o {
            FsObject::Dir(_) => Ok(()),
            FsObject::File(_) => Err(FsError::NotADirectory),
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
