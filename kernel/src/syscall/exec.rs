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

//! The `exec` system call replaces the current program.
//!
//! On success, the calling thread never returns: a fresh thread starts the
//! new program. A failure before the image is fully built leaves the caller
//! untouched; a failure after the point of no return aborts the process.

use crate::{
	errno::EResult,
	file::vfs,
	mac::FilterPerms,
	memory::user::{UserArray, UserString},
	process,
	process::exec,
	syscall::util,
};

pub fn exec(path: UserString, argv: UserArray, envp: UserArray) -> EResult<usize> {
	let proc = util::current_proc()?;
	let (path, argv, envp) = util::with_space(&proc, |space| {
		Ok((
			path.copy_from_user(space)?,
			argv.copy_from_user(space)?,
			envp.copy_from_user(space)?,
		))
	})?;
	let path = util::compound_at(&proc, util::AT_FDCWD, &path)?;
	let resolved = vfs::resolve_path(&path, true)?;
	let allowed = proc
		.lock()
		.mac
		.check_path_permissions(&resolved)
		.contains(FilterPerms::EXECUTE);
	process::mac_enforce(&proc, allowed, "exec")?;
	let alloc_base = {
		let mut proc = proc.lock();
		proc.reroll_aslr();
		proc.alloc_base
	};
	let image = exec::load(&resolved, &argv, &envp, alloc_base)?;
	exec::exec(&proc, image)?;
	Ok(0)
}
