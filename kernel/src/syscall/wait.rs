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

//! The `wait` system call reaps an exited child process.
//!
//! `pid` names the child to wait for, `-1` any child. Unless `WNOHANG` is
//! given, the call blocks until a matching child has exited; it then frees
//! the child's remains and returns its PID, storing the encoded exit word
//! through `status`.

use crate::{
	errno::EResult,
	memory::user::UserPtr,
	process,
	syscall::util,
};

pub fn wait(pid: i32, status: UserPtr<usize>, options: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	// May block
	let (child, word) = process::wait(&proc, pid, options)?;
	if !status.is_null() {
		util::with_space(&proc, |space| status.copy_to_user(space, &word))?;
	}
	Ok(child as usize)
}
