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

//! The `rename` system call renames a file.
//!
//! With the `keep` flag, the source link is kept, turning the operation into
//! a hard-link creation.

use crate::{
	errno::EResult,
	file::vfs,
	mac::FilterPerms,
	process,
	syscall::util,
};

pub fn rename(src: usize, srclen: usize, dst: usize, dstlen: usize, keep: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let src = util::user_path(&proc, src, srclen)?;
	let dst = util::user_path(&proc, dst, dstlen)?;
	let src = util::compound_at(&proc, util::AT_FDCWD, &src)?;
	let dst = util::compound_at(&proc, util::AT_FDCWD, &dst)?;
	let allowed = {
		let proc = proc.lock();
		proc.mac.check_path_permissions(&src).contains(FilterPerms::WRITE)
			&& proc.mac.check_path_permissions(&dst).contains(FilterPerms::WRITE)
	};
	process::mac_enforce(&proc, allowed, "rename")?;
	vfs::rename(&src, &dst, keep != 0)?;
	Ok(0)
}
