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

//! The `mount` system call mounts a filesystem.
//!
//! The source is the name of a registered device, or empty for a memory-only
//! filesystem.

use crate::{
	device,
	errno,
	errno::EResult,
	file::{fs::FilesystemType, mountpoint},
	mac::Capabilities,
	process,
	syscall::util,
};

pub fn mount(src: usize, srclen: usize, target: usize, targetlen: usize, fstype: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::MANAGE_MOUNTS);
	process::mac_enforce(&proc, allowed, "mount")?;
	let src = util::user_path(&proc, src, srclen)?;
	let target = util::user_path(&proc, target, targetlen)?;
	let target = util::compound_at(&proc, util::AT_FDCWD, &target)?;
	let source = if src.is_empty() {
		0
	} else {
		let handle = device::fetch(&src);
		if handle == 0 {
			return Err(errno!(ENOENT));
		}
		handle
	};
	let fs_type = FilesystemType::from_code(fstype)?;
	mountpoint::mount(source, target, fs_type)?;
	Ok(0)
}
