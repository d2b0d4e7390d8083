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

//! The `exit_thread` system call terminates the calling thread.
//!
//! When the last thread of a process exits this way, the process exits with
//! code `0`.

use crate::{errno::EResult, process, process::scheduler, syscall::util};

pub fn exit_thread() -> EResult<usize> {
	let proc = util::current_proc()?;
	let tid = scheduler::current_tid();
	let last = {
		let mut proc = proc.lock();
		proc.remove_thread(tid);
		proc.threads.is_empty()
	};
	if last {
		process::do_exit(&proc, 0);
	} else {
		let _ = scheduler::delete_thread(tid);
	}
	// The dispatcher switches away from the now-zombie thread
	Ok(0)
}
