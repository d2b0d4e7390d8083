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

//! The `link` system call creates a hard link.

use crate::{
	errno::EResult,
	file::vfs,
	mac::FilterPerms,
	process,
	syscall::util,
};

pub fn link(target: usize, targetlen: usize, path: usize, pathlen: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let target = util::user_path(&proc, target, targetlen)?;
	let path = util::user_path(&proc, path, pathlen)?;
	let target = util::compound_at(&proc, util::AT_FDCWD, &target)?;
	let path = util::compound_at(&proc, util::AT_FDCWD, &path)?;
	let allowed = proc
		.lock()
		.mac
		.check_path_permissions(&path)
		.contains(FilterPerms::WRITE);
	process::mac_enforce(&proc, allowed, "link")?;
	vfs::create_hard_link(&path, &target)?;
	Ok(0)
}
