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

//! The `thread_sched` system call reads and writes scheduling parameters of
//! a thread.
//!
//! A `tid` of `0` targets the calling thread. Also covers voluntary
//! rescheduling through the `YIELD` operation.

use crate::{
	errno,
	errno::EResult,
	mac::Capabilities,
	process,
	process::scheduler,
	process::scheduler::Tid,
	syscall::util,
};

/// Operation: yield the CPU.
pub const SCHED_YIELD: u32 = 0;
/// Operation: get the thread's preference.
pub const SCHED_GET_PREFERENCE: u32 = 1;
/// Operation: set the thread's preference.
pub const SCHED_SET_PREFERENCE: u32 = 2;
/// Operation: set the thread's deadlines (run time and period, in
/// microseconds).
pub const SCHED_SET_DEADLINES: u32 = 3;
/// Operation: pin the thread on a core (`usize::MAX` unpins).
pub const SCHED_SET_MONO: u32 = 4;
/// Operation: ban or unban the thread.
pub const SCHED_BAN: u32 = 5;

pub fn thread_sched(op: u32, tid: u32, a: usize, b: usize) -> EResult<usize> {
	if op == SCHED_YIELD {
		scheduler::yield_now();
		return Ok(0);
	}
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::CHANGE_SCHED);
	process::mac_enforce(&proc, allowed, "thread_sched")?;
	let tid = if tid == 0 {
		scheduler::current_tid()
	} else {
		tid as Tid
	};
	match op {
		SCHED_GET_PREFERENCE => Ok(scheduler::get_preference(tid)? as usize),
		SCHED_SET_PREFERENCE => {
			scheduler::set_preference(tid, a as u8)?;
			Ok(0)
		}
		SCHED_SET_DEADLINES => {
			scheduler::set_deadlines(tid, a as u64, b as u64)?;
			Ok(0)
		}
		SCHED_SET_MONO => {
			let core = (a != usize::MAX).then_some(a);
			scheduler::set_mono_thread(tid, core)?;
			Ok(0)
		}
		SCHED_BAN => {
			scheduler::ban_thread(tid, a != 0)?;
			Ok(0)
		}
		_ => Err(errno!(EINVAL)),
	}
}
