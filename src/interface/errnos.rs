// Guest error codes
//
// The guest kernel reports failures as 0x8001xxxx codes rather than negative
// errno values. The syscall surface returns them reinterpreted as i32.

pub const CELL_OK: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CellError {
    EAGAIN = 0x8001_0001,
    EINVAL = 0x8001_0002,
    ENOSYS = 0x8001_0003,
    ENOMEM = 0x8001_0004,
    ESRCH = 0x8001_0005,
    ENOENT = 0x8001_0006,
    ENOEXEC = 0x8001_0007,
    EDEADLK = 0x8001_0008,
    EPERM = 0x8001_0009,
    EBUSY = 0x8001_000A,
    ETIMEDOUT = 0x8001_000B,
    EABORT = 0x8001_000C,
    EFAULT = 0x8001_000D,
    ESTAT = 0x8001_000F,
    EALIGN = 0x8001_0010,
    EKRESOURCE = 0x8001_0011,
    EISDIR = 0x8001_0012,
    ECANCELED = 0x8001_0013,
    EEXIST = 0x8001_0014,
    EISCONN = 0x8001_0015,
    ENOTCONN = 0x8001_0016,
    EAUTHFAIL = 0x8001_0017,
    ENOTMSELF = 0x8001_0018,
    ESYSVER = 0x8001_0019,
    EAUTHFATAL = 0x8001_001A,
    EDOM = 0x8001_001B,
    ERANGE = 0x8001_001C,
    EILSEQ = 0x8001_001D,
    EFPOS = 0x8001_001E,
    EINTR = 0x8001_001F,
    EFBIG = 0x8001_0020,
    EMLINK = 0x8001_0021,
    ENFILE = 0x8001_0022,
    ENOSPC = 0x8001_0023,
    ENOTTY = 0x8001_0024,
    EPIPE = 0x8001_0025,
    EROFS = 0x8001_0026,
    ESPIPE = 0x8001_0027,
    E2BIG = 0x8001_0028,
    EACCES = 0x8001_0029,
    EBADF = 0x8001_002A,
    EIO = 0x8001_002B,
    EMFILE = 0x8001_002C,
    ENODEV = 0x8001_002D,
    ENOTDIR = 0x8001_002E,
    ENXIO = 0x8001_002F,
    EXDEV = 0x8001_0030,
    EBADMSG = 0x8001_0031,
    EINPROGRESS = 0x8001_0032,
    EMSGSIZE = 0x8001_0033,
    ENAMETOOLONG = 0x8001_0034,
    ENOLCK = 0x8001_0035,
    ENOTEMPTY = 0x8001_0036,
    ENOTSUP = 0x8001_0037,
    EFSSPECIFIC = 0x8001_0038,
    EOVERFLOW = 0x8001_0039,
    ENOTMOUNTED = 0x8001_003A,
    ENOTSDATA = 0x8001_003B,
}

impl CellError {
    /// The value as the guest sees it in r3.
    pub const fn code(self) -> i32 {
        self as u32 as i32
    }

    pub fn from_code(code: i32) -> Option<CellError> {
        use CellError::*;
        const ALL: [CellError; 58] = [
            EAGAIN, EINVAL, ENOSYS, ENOMEM, ESRCH, ENOENT, ENOEXEC, EDEADLK, EPERM, EBUSY,
            ETIMEDOUT, EABORT, EFAULT, ESTAT, EALIGN, EKRESOURCE, EISDIR, ECANCELED, EEXIST,
            EISCONN, ENOTCONN, EAUTHFAIL, ENOTMSELF, ESYSVER, EAUTHFATAL, EDOM, ERANGE, EILSEQ,
            EFPOS, EINTR, EFBIG, EMLINK, ENFILE, ENOSPC, ENOTTY, EPIPE, EROFS, ESPIPE, E2BIG,
            EACCES, EBADF, EIO, EMFILE, ENODEV, ENOTDIR, ENXIO, EXDEV, EBADMSG, EINPROGRESS,
            EMSGSIZE, ENAMETOOLONG, ENOLCK, ENOTEMPTY, ENOTSUP, EFSSPECIFIC, EOVERFLOW,
            ENOTMOUNTED, ENOTSDATA,
        ];
        ALL.iter().copied().find(|e| e.code() == code)
    }
}

// Log the failure and hand back the code the guest will see
pub fn syscall_error(e: CellError, syscall: &str, message: &str) -> i32 {
    log::debug!("Error in syscall: {} - {:?}: {}", syscall, e, message);
    e.code()
}
