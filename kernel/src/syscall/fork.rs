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

//! The `fork` system call duplicates the calling process.
//!
//! The child gets a deep copy of the address space and shares the open file
//! descriptions through cloned descriptors. It resumes from the same point,
//! with a zero return value; the parent gets the child's PID.

use crate::{
	arch::x86::TrapFrame,
	errno::EResult,
	mac::Capabilities,
	process,
	syscall::util,
};

pub fn fork(frame: &TrapFrame) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::SPAWN);
	process::mac_enforce(&proc, allowed, "fork")?;
	let pid = process::fork(&proc, frame)?;
	Ok(pid as usize)
}
