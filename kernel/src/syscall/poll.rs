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

//! The `poll` system call waits for events on a set of file descriptors.
//!
//! `timeout` is a number of milliseconds; `0` returns immediately after one
//! scan and a negative value waits forever.

use crate::{
	errno,
	errno::EResult,
	file::POLLNVAL,
	limits,
	memory::user::UserPtr,
	process::scheduler,
	syscall::util,
	time,
};
use macros::AnyRepr;

/// An entry of the `poll` descriptor set.
#[repr(C)]
#[derive(AnyRepr, Clone, Debug)]
pub struct PollFd {
	/// The file descriptor. A negative value makes the entry inert.
	pub fd: i32,
	/// The requested events.
	pub events: u16,
	/// The returned events.
	pub revents: u16,
}

pub fn poll(fds: usize, nfds: usize, timeout: i64) -> EResult<usize> {
	if nfds > limits::OPEN_MAX {
		return Err(errno!(EINVAL));
	}
	let proc = util::current_proc()?;
	let deadline = (timeout >= 0)
		.then(|| time::ticks() + (timeout as u64).saturating_mul(time::TICK_RATE) / 1000);
	loop {
		let mut ready = 0;
		for i in 0..nfds {
			let ptr: UserPtr<PollFd> = (fds + i * size_of::<PollFd>()).into();
			let mut entry = util::with_space(&proc, |space| {
				ptr.copy_from_user(space)?.ok_or_else(|| errno!(EFAULT))
			})?;
			entry.revents = if entry.fd < 0 {
				0
			} else {
				match proc.lock().get_file(entry.fd as u32) {
					Ok(desc) => desc.poll(entry.events as u32) as u16,
					Err(_) => POLLNVAL as u16,
				}
			};
			if entry.revents != 0 {
				ready += 1;
			}
			util::with_space(&proc, |space| ptr.copy_to_user(space, &entry))?;
		}
		if ready > 0 {
			return Ok(ready);
		}
		if let Some(deadline) = deadline {
			if time::ticks() >= deadline {
				return Ok(0);
			}
		}
		scheduler::yield_now();
	}
}
