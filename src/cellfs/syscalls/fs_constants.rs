// File system related constants
#![allow(dead_code)]

// Imported into fs_calls and fcntl_calls

pub const STARTINGFD: u32 = 3;
pub const MAXFD: u32 = 255;

pub const O_RDONLY: i32 = 0o0;
pub const O_WRONLY: i32 = 0o1;
pub const O_RDWR: i32 = 0o2;
pub const O_ACCMODE: i32 = 0o3;

pub const O_CREAT: i32 = 0o100;
pub const O_EXCL: i32 = 0o200;
pub const O_TRUNC: i32 = 0o1000;
pub const O_APPEND: i32 = 0o2000;
pub const O_MSELF: i32 = 0o10000;

pub const O_VALIDFLAGS: i32 = O_ACCMODE | O_CREAT | O_EXCL | O_TRUNC | O_APPEND | O_MSELF;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

//File types for stat
pub const S_IFMT: i32 = 0o170000;
pub const S_IFDIR: i32 = 0o040000;
pub const S_IFREG: i32 = 0o100000;
pub const S_IFLNK: i32 = 0o120000;
pub const S_IFWHT: i32 = 0o160000;

//Standard flag combinations
pub const S_IRWXA: i32 = 0o777;
pub const S_IRWXU: i32 = 0o700;
pub const S_IRUSR: i32 = 0o400;
pub const S_IWUSR: i32 = 0o200;
pub const S_IXUSR: i32 = 0o100;
pub const S_IRWXG: i32 = 0o070;
pub const S_IRGRP: i32 = 0o040;
pub const S_IWGRP: i32 = 0o020;
pub const S_IXGRP: i32 = 0o010;
pub const S_IRWXO: i32 = 0o007;
pub const S_IROTH: i32 = 0o004;
pub const S_IWOTH: i32 = 0o002;
pub const S_IXOTH: i32 = 0o001;
pub const S_IRWA: i32 = 0o666;

//Directory entry types
pub const CELL_FS_TYPE_UNKNOWN: u8 = 0;
pub const CELL_FS_TYPE_DIRECTORY: u8 = 1;
pub const CELL_FS_TYPE_REGULAR: u8 = 2;
pub const CELL_FS_TYPE_SYMLINK: u8 = 3;

pub const CELL_FS_MAX_FS_PATH_LENGTH: usize = 1024;
pub const CELL_FS_MAX_FS_FILE_NAME_LENGTH: usize = 255;
pub const CELL_FS_MAX_MP_LENGTH: usize = 31;

// Non-terminal result of the bulk directory read
pub const CELL_FS_DIRENT_MORE: i32 = 1;

pub const DEFAULT_SECTOR_SIZE: u64 = 512;
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;
pub const BDVD_SECTOR_SIZE: u64 = 2048;

// Intermediate buffer size for read/write
pub const FS_IO_CHUNK: usize = 0x10000;

//Commands for FCNTL
pub const FCNTL_MSELF_OPEN: u32 = 0x8000_0009;
pub const FCNTL_READ_AT: u32 = 0x8000_000A;
pub const FCNTL_WRITE_AT: u32 = 0x8000_000B;
pub const FCNTL_PROBE: u32 = 0xC000_0006;
pub const FCNTL_GET_DIR_ENTRIES: u32 = 0xE000_0012;

//MSELF archives
pub const MSELF_MAGIC: u32 = 0x4D53_4600; // "MSF\0"
pub const MSELF_VERSION: u32 = 1;
pub const MSELF_ENTRY_SIZE: u32 = 0x40;

//sys_fs_test
pub const FS_TEST_GET_PATH: (u32, u32, u32) = (6, 0, 4);
