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

//! The `ptrace` system call attaches to a process for tracing.
//!
//! While attached, the target's system calls are logged to the kernel log
//! before dispatch.

use crate::{
	errno,
	errno::EResult,
	mac::Capabilities,
	process,
	syscall::util,
};

/// Operation: attach to the target process.
pub const PTRACE_ATTACH: u32 = 0;
/// Operation: detach from the target process.
pub const PTRACE_DETACH: u32 = 1;

pub fn ptrace(op: u32, pid: u32, fd: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::TRACE);
	process::mac_enforce(&proc, allowed, "ptrace")?;
	let target = process::get_by_pid(pid as u16).ok_or_else(|| errno!(ENOENT))?;
	let caller = proc.lock().get_pid();
	let mut target = target.lock();
	match op {
		PTRACE_ATTACH => {
			if target.tracer_pid != 0 {
				return Err(errno!(EBUSY));
			}
			target.tracer_pid = caller;
			target.tracer_fd = fd;
		}
		PTRACE_DETACH => {
			if target.tracer_pid != caller {
				return Err(errno!(EPERM));
			}
			target.tracer_pid = 0;
			target.tracer_fd = 0;
		}
		_ => return Err(errno!(EINVAL)),
	}
	Ok(0)
}
