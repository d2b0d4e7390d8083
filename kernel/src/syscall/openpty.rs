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

//! The `openpty` system call creates a pseudo-terminal pair, returning two
//! file descriptors: the primary end first.
//!
//! The secondary end is also registered as the device `ptyN`, which the
//! registry keeps for the lifetime of the kernel.

use crate::{
	device,
	device::{Device, DeviceOps},
	errno,
	errno::EResult,
	file::{
		pty::{Pty, PtySecondary},
		Description,
	},
	memory::user::UserPtr,
	process,
	syscall::util,
};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// The number of PTY pairs created so far, used to name them.
static PTY_COUNT: AtomicU32 = AtomicU32::new(0);

/// Device wrapper around the secondary end of a PTY.
struct PtyDevice(PtySecondary);

impl DeviceOps for PtyDevice {
	fn read(&self, _off: u64, buf: &mut [u8]) -> EResult<usize> {
		self.0.read(buf)
	}

	fn write(&self, _off: u64, buf: &[u8]) -> EResult<usize> {
		self.0.write(buf)
	}

	fn ioctl(&self, request: u32, arg: usize) -> EResult<u32> {
		let proc = process::current().ok_or_else(|| errno!(ENOTTY))?;
		let space = proc
			.lock()
			.space
			.clone()
			.ok_or_else(|| errno!(ENOTTY))?;
		let space = space.lock();
		self.0.ioctl(&space, request, arg)
	}
}

pub fn openpty(fds: UserPtr<[u32; 2]>) -> EResult<usize> {
	let proc = util::current_proc()?;
	let (primary, secondary) = Pty::pair();
	let (pfd, sfd) = proc.lock().fds.add_file_pair(
		Description::PtyPrimary(primary),
		Description::PtySecondary(secondary.clone()),
	)?;
	// Give the pair its device name
	let n = PTY_COUNT.fetch_add(1, Relaxed);
	let name = alloc::format!("pty{n}");
	let dev = Device::new_char(Arc::new(PtyDevice(secondary)));
	if let Err(e) = device::register(name.as_bytes(), dev) {
		log::warn!("cannot register {name}: {e}");
	}
	util::with_space(&proc, |space| fds.copy_to_user(space, &[pfd, sfd]))?;
	Ok(0)
}
