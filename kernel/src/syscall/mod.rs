/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of Encore.
 *
 * Encore is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Encore is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Encore. If not, see <https://www.gnu.org/licenses/>.
 */

//! System calls.
//!
//! The ABI: the system call number is read from `rax`, up to six arguments
//! from `rdi`, `rsi`, `rdx`, `rcx`, `r8` and `r9`. The result is returned in
//! `rax`, with `usize::MAX` as the error sentinel, and the error code in
//! `rdx`.
//!
//! Path arguments are passed as a pointer and a length; strings inside
//! `argv`/`envp` arrays are nul-terminated.
//!
//! Numbers are stable. An unknown number fails with
//! [`ENOSYS`](crate::errno::ENOSYS).

mod chdir;
mod close;
mod dup;
mod exec;
mod exit;
mod exit_thread;
mod fcntl;
mod fork;
mod fstat;
mod fsync;
mod getcwd;
mod getdents;
mod getpid;
mod getppid;
mod getrandom;
mod integrity_setup;
mod ioctl;
mod link;
mod lstat;
mod mac;
mod mknod;
mod mmap;
mod mount;
mod mprotect;
mod munmap;
mod open;
mod openpty;
mod pipe;
mod poll;
mod ptrace;
mod read;
mod readlink;
mod rename;
mod seek;
mod set_hostname;
mod set_tcb;
mod spawn;
mod symlink;
mod sync;
mod sysconf;
mod thread_sched;
mod truncate;
mod umount;
mod uname;
mod unlink;
pub mod util;
mod wait;
mod write;

use crate::{
	arch::x86::TrapFrame,
	errno::EResult,
	memory::user::{AnyRepr, UserArray, UserPtr, UserString},
	process,
	process::scheduler,
};
use chdir::chdir;
use close::close;
use dup::dup;
use exec::exec;
use exit::exit;
use exit_thread::exit_thread;
use fcntl::fcntl;
use fork::fork;
use fstat::fstat;
use fsync::fsync;
use getcwd::getcwd;
use getdents::getdents;
use getpid::getpid;
use getppid::getppid;
use getrandom::getrandom;
use integrity_setup::integrity_setup;
use ioctl::ioctl;
use link::link;
use lstat::lstat;
use mac::{add_mac_filter, get_mac_capabilities, lock_mac, set_mac_capabilities, set_mac_enforcement};
use mknod::mknod;
use mmap::mmap;
use mount::mount;
use mprotect::mprotect;
use munmap::munmap;
use open::open;
use openpty::openpty;
use pipe::pipe;
use poll::poll;
use ptrace::ptrace;
use read::read;
use readlink::readlink;
use rename::rename;
use seek::seek;
use set_hostname::set_hostname;
use set_tcb::set_tcb;
use spawn::spawn;
use symlink::symlink;
use sync::sync;
use sysconf::sysconf;
use thread_sched::thread_sched;
use truncate::truncate;
use umount::umount;
use uname::uname;
use unlink::unlink;
use wait::wait;
use write::write;

/// Extracts a value from a system call argument register.
pub trait FromSyscallArg {
	/// Constructs the value from the raw register value.
	fn from_arg(val: usize) -> Self;
}

macro_rules! impl_from_syscall_arg_primitive {
	($($ty:ty),*) => {
		$(
			impl FromSyscallArg for $ty {
				#[inline]
				fn from_arg(val: usize) -> Self {
					val as _
				}
			}
		)*
	};
}

impl_from_syscall_arg_primitive!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize);

impl<T: AnyRepr> FromSyscallArg for UserPtr<T> {
	fn from_arg(val: usize) -> Self {
		val.into()
	}
}

impl FromSyscallArg for UserString {
	fn from_arg(val: usize) -> Self {
		val.into()
	}
}

impl FromSyscallArg for UserArray {
	fn from_arg(val: usize) -> Self {
		val.into()
	}
}

/// A system call handler.
pub trait SyscallHandler<Args> {
	/// Calls the handler with arguments extracted from `frame`.
	fn call(self, frame: &TrapFrame) -> EResult<usize>;
}

macro_rules! impl_syscall_handler {
	($($ty:ident),*) => {
		#[allow(non_snake_case, unused_variables, unused_mut, unused_assignments)]
		impl<F, $($ty,)*> SyscallHandler<($($ty,)*)> for F
		where
			F: FnOnce($($ty,)*) -> EResult<usize>,
			$($ty: FromSyscallArg,)*
		{
			fn call(self, frame: &TrapFrame) -> EResult<usize> {
				let mut cursor = 0u8;
				$(
					let $ty = $ty::from_arg(frame.syscall_arg(cursor));
					cursor += 1;
				)*
				self($($ty,)*)
			}
		}
	};
}

impl_syscall_handler!();
impl_syscall_handler!(T1);
impl_syscall_handler!(T1, T2);
impl_syscall_handler!(T1, T2, T3);
impl_syscall_handler!(T1, T2, T3, T4);
impl_syscall_handler!(T1, T2, T3, T4, T5);
impl_syscall_handler!(T1, T2, T3, T4, T5, T6);

/// Syscall declaration.
macro_rules! syscall {
	($name:ident, $frame:expr) => {
		Some(SyscallHandler::call($name, $frame))
	};
}

/// Executes the system call with the given `id` and returns its result.
///
/// If the syscall doesn't exist, the function returns `None`.
#[inline]
fn do_syscall(id: usize, frame: &TrapFrame) -> Option<EResult<usize>> {
	match id {
		0 => syscall!(exit, frame),
		1 => syscall!(set_tcb, frame),
		2 => syscall!(open, frame),
		3 => syscall!(close, frame),
		4 => syscall!(read, frame),
		5 => syscall!(write, frame),
		6 => syscall!(seek, frame),
		7 => syscall!(mmap, frame),
		8 => syscall!(munmap, frame),
		9 => syscall!(getpid, frame),
		10 => syscall!(getppid, frame),
		12 => syscall!(exec, frame),
		// The child's thread resumes from the caller's full register state
		13 => Some(fork(frame)),
		14 => syscall!(wait, frame),
		15 => syscall!(uname, frame),
		16 => syscall!(set_hostname, frame),
		17 => syscall!(fstat, frame),
		18 => syscall!(lstat, frame),
		19 => syscall!(getcwd, frame),
		20 => syscall!(chdir, frame),
		21 => syscall!(pipe, frame),
		22 => syscall!(dup, frame),
		23 => syscall!(ioctl, frame),
		24 => syscall!(rename, frame),
		25 => syscall!(sysconf, frame),
		26 => syscall!(spawn, frame),
		27 => syscall!(thread_sched, frame),
		28 => syscall!(fcntl, frame),
		29 => syscall!(exit_thread, frame),
		30 => syscall!(getrandom, frame),
		31 => syscall!(mprotect, frame),
		32 => syscall!(get_mac_capabilities, frame),
		33 => syscall!(set_mac_capabilities, frame),
		34 => syscall!(lock_mac, frame),
		35 => syscall!(add_mac_filter, frame),
		36 => syscall!(set_mac_enforcement, frame),
		37 => syscall!(mount, frame),
		38 => syscall!(umount, frame),
		39 => syscall!(readlink, frame),
		40 => syscall!(getdents, frame),
		41 => syscall!(sync, frame),
		42 => syscall!(mknod, frame),
		43 => syscall!(truncate, frame),
		44 => syscall!(unlink, frame),
		45 => syscall!(symlink, frame),
		46 => syscall!(integrity_setup, frame),
		47 => syscall!(openpty, frame),
		48 => syscall!(fsync, frame),
		49 => syscall!(link, frame),
		50 => syscall!(ptrace, frame),
		51 => syscall!(poll, frame),
		_ => None,
	}
}

/// Tells whether calls of the current process are being traced.
fn is_traced() -> bool {
	if cfg!(feature = "strace") {
		return true;
	}
	process::current()
		.map(|proc| proc.lock().tracer_pid != 0)
		.unwrap_or(false)
}

/// Returns the name of the system call with the given `id`.
fn syscall_name(id: usize) -> &'static str {
	const NAMES: &[&str] = &[
		"exit",
		"set_tcb",
		"open",
		"close",
		"read",
		"write",
		"seek",
		"mmap",
		"munmap",
		"getpid",
		"getppid",
		"(reserved)",
		"exec",
		"fork",
		"wait",
		"uname",
		"set_hostname",
		"fstat",
		"lstat",
		"getcwd",
		"chdir",
		"pipe",
		"dup",
		"ioctl",
		"rename",
		"sysconf",
		"spawn",
		"thread_sched",
		"fcntl",
		"exit_thread",
		"getrandom",
		"mprotect",
		"get_mac_capabilities",
		"set_mac_capabilities",
		"lock_mac",
		"add_mac_filter",
		"set_mac_enforcement",
		"mount",
		"umount",
		"readlink",
		"getdents",
		"sync",
		"mknod",
		"truncate",
		"unlink",
		"symlink",
		"integrity_setup",
		"openpty",
		"fsync",
		"link",
		"ptrace",
		"poll",
	];
	NAMES.get(id).copied().unwrap_or("(unknown)")
}

/// Called whenever a system call is triggered.
pub fn handler(frame: &mut TrapFrame) {
	let id = frame.syscall_id();
	// Tracing happens before dispatch
	if is_traced() {
		let pid = scheduler::current_pid().unwrap_or(0);
		crate::println!(
			"[trace pid {pid}] {name}({:#x}, {:#x}, {:#x}, {:#x}, {:#x}, {:#x})",
			frame.syscall_arg(0),
			frame.syscall_arg(1),
			frame.syscall_arg(2),
			frame.syscall_arg(3),
			frame.syscall_arg(4),
			frame.syscall_arg(5),
			name = syscall_name(id),
		);
	}
	let (result, errno) = match do_syscall(id, frame) {
		Some(Ok(val)) => (val as u64, 0),
		Some(Err(e)) => (u64::MAX, e.as_int()),
		None => (u64::MAX, crate::errno::ENOSYS.as_int()),
	};
	frame.set_syscall_return(result, errno);
	// The call may have terminated the calling thread (exit, exec, a MAC
	// kill): never return to the old context then
	if scheduler::current_is_zombie() {
		scheduler::tick(frame);
	}
}
