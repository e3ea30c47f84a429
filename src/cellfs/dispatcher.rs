#![allow(dead_code)]
// Guest syscall numbers to FsContext methods

const FS_TEST_SYSCALL: i32 = 798;
const OPEN_SYSCALL: i32 = 801;
const READ_SYSCALL: i32 = 802;
const WRITE_SYSCALL: i32 = 803;
const CLOSE_SYSCALL: i32 = 804;
const OPENDIR_SYSCALL: i32 = 805;
const READDIR_SYSCALL: i32 = 806;
const CLOSEDIR_SYSCALL: i32 = 807;
const STAT_SYSCALL: i32 = 808;
const FSTAT_SYSCALL: i32 = 809;
const MKDIR_SYSCALL: i32 = 811;
const RENAME_SYSCALL: i32 = 812;
const RMDIR_SYSCALL: i32 = 813;
const UNLINK_SYSCALL: i32 = 814;
const UTIME_SYSCALL: i32 = 815;
const FCNTL_SYSCALL: i32 = 817;
const LSEEK_SYSCALL: i32 = 818;
const FGET_BLOCK_SIZE_SYSCALL: i32 = 821;
const GET_BLOCK_SIZE_SYSCALL: i32 = 822;
const TRUNCATE_SYSCALL: i32 = 831;
const FTRUNCATE_SYSCALL: i32 = 832;
const CHMOD_SYSCALL: i32 = 834;

use crate::cellfs::context::FsContext;
use crate::interface;
use crate::interface::errnos::*;

/// Raw 64-bit register value.
pub type Arg = u64;

//this macro takes in a syscall invocation name (i.e. ctx.open_syscall), and all of the arguments
//to the syscall. Then it unwraps the arguments, returning the error if any one of them is an error
//value, and returning the value of the function if not. It does this by using the ? operator in
//the body of a closure within the variadic macro
macro_rules! check_and_dispatch {
    ( $ctx:ident . $func:ident, $($arg:expr),* ) => {
        match (|| Ok($ctx.$func( $($arg?),* )))() {
            Ok(i) => i, Err(i) => i
        }
    };
}

pub fn dispatcher(ctx: &FsContext, callnum: i32, arg1: Arg, arg2: Arg, arg3: Arg, arg4: Arg, arg5: Arg, arg6: Arg) -> i32 {
    match callnum {
        FS_TEST_SYSCALL => {
            check_and_dispatch!(ctx.test_syscall, interface::get_uint(arg1), interface::get_uint(arg2), interface::get_ptr(arg3), interface::get_uint(arg4), interface::get_ptr(arg5), interface::get_uint(arg6))
        }
        OPEN_SYSCALL => {
            check_and_dispatch!(ctx.open_syscall, interface::get_ptr(arg1), interface::get_int(arg2), interface::get_ptr(arg3), interface::get_int(arg4), interface::get_ptr(arg5), interface::get_ulong(arg6))
        }
        READ_SYSCALL => {
            check_and_dispatch!(ctx.read_syscall, interface::get_uint(arg1), interface::get_ptr(arg2), interface::get_ulong(arg3), interface::get_ptr(arg4))
        }
        WRITE_SYSCALL => {
            check_and_dispatch!(ctx.write_syscall, interface::get_uint(arg1), interface::get_ptr(arg2), interface::get_ulong(arg3), interface::get_ptr(arg4))
        }
        CLOSE_SYSCALL => {
            check_and_dispatch!(ctx.close_syscall, interface::get_uint(arg1))
        }
        OPENDIR_SYSCALL => {
            check_and_dispatch!(ctx.opendir_syscall, interface::get_ptr(arg1), interface::get_ptr(arg2))
        }
        READDIR_SYSCALL => {
            check_and_dispatch!(ctx.readdir_syscall, interface::get_uint(arg1), interface::get_ptr(arg2), interface::get_ptr(arg3))
        }
        CLOSEDIR_SYSCALL => {
            check_and_dispatch!(ctx.closedir_syscall, interface::get_uint(arg1))
        }
        STAT_SYSCALL => {
            check_and_dispatch!(ctx.stat_syscall, interface::get_ptr(arg1), interface::get_ptr(arg2))
        }
        FSTAT_SYSCALL => {
            check_and_dispatch!(ctx.fstat_syscall, interface::get_uint(arg1), interface::get_ptr(arg2))
        }
        MKDIR_SYSCALL => {
            check_and_dispatch!(ctx.mkdir_syscall, interface::get_ptr(arg1), interface::get_int(arg2))
        }
        RENAME_SYSCALL => {
            check_and_dispatch!(ctx.rename_syscall, interface::get_ptr(arg1), interface::get_ptr(arg2))
        }
        RMDIR_SYSCALL => {
            check_and_dispatch!(ctx.rmdir_syscall, interface::get_ptr(arg1))
        }
        UNLINK_SYSCALL => {
            check_and_dispatch!(ctx.unlink_syscall, interface::get_ptr(arg1))
        }
        UTIME_SYSCALL => {
            check_and_dispatch!(ctx.utime_syscall, interface::get_ptr(arg1), interface::get_ptr(arg2))
        }
        FCNTL_SYSCALL => {
            check_and_dispatch!(ctx.fcntl_syscall, interface::get_uint(arg1), interface::get_uint(arg2), interface::get_ptr(arg3), interface::get_uint(arg4))
        }
        LSEEK_SYSCALL => {
            check_and_dispatch!(ctx.lseek_syscall, interface::get_uint(arg1), interface::get_long(arg2), interface::get_int(arg3), interface::get_ptr(arg4))
        }
        FGET_BLOCK_SIZE_SYSCALL => {
            check_and_dispatch!(ctx.fget_block_size_syscall, interface::get_uint(arg1), interface::get_ptr(arg2), interface::get_ptr(arg3), interface::get_ptr(arg4), interface::get_ptr(arg5))
        }
        GET_BLOCK_SIZE_SYSCALL => {
            check_and_dispatch!(ctx.get_block_size_syscall, interface::get_ptr(arg1), interface::get_ptr(arg2), interface::get_ptr(arg3), interface::get_ptr(arg4))
        }
        TRUNCATE_SYSCALL => {
            check_and_dispatch!(ctx.truncate_syscall, interface::get_ptr(arg1), interface::get_ulong(arg2))
        }
        FTRUNCATE_SYSCALL => {
            check_and_dispatch!(ctx.ftruncate_syscall, interface::get_uint(arg1), interface::get_ulong(arg2))
        }
        CHMOD_SYSCALL => {
            check_and_dispatch!(ctx.chmod_syscall, interface::get_ptr(arg1), interface::get_int(arg2))
        }

        _ => {//unknown syscall
            syscall_error(CellError::ENOSYS, "dispatcher", &format!("unknown syscall {}", callnum))
        }
    }
}
