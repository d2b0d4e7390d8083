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

//! The `umount` system call unmounts a filesystem.
//!
//! Without `force`, the operation fails while files are still open under
//! the mount.

use crate::{
	errno::EResult,
	file::mountpoint,
	mac::Capabilities,
	process,
	syscall::util,
};

pub fn umount(target: usize, len: usize, force: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::MANAGE_MOUNTS);
	process::mac_enforce(&proc, allowed, "umount")?;
	let target = util::user_path(&proc, target, len)?;
	let target = util::compound_at(&proc, util::AT_FDCWD, &target)?;
	mountpoint::umount(&target, force != 0)?;
	Ok(0)
}
