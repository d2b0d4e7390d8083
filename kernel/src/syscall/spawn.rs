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

//! The `spawn` system call creates a new process running the given program.
//!
//! Unlike `fork` followed by `exec`, the parent's address space is never
//! copied. The child inherits the CWD, the MAC context and the
//! non-close-on-exec file descriptors.

use crate::{
	errno::EResult,
	file::vfs,
	mac::{Capabilities, FilterPerms},
	memory::user::UserArray,
	process,
	process::exec,
	syscall::util,
};

pub fn spawn(path: usize, len: usize, argv: UserArray, envp: UserArray) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::SPAWN);
	process::mac_enforce(&proc, allowed, "spawn")?;
	let path = util::user_path(&proc, path, len)?;
	let (argv, envp) = util::with_space(&proc, |space| {
		Ok((argv.copy_from_user(space)?, envp.copy_from_user(space)?))
	})?;
	let path = util::compound_at(&proc, util::AT_FDCWD, &path)?;
	let resolved = vfs::resolve_path(&path, true)?;
	let allowed = proc
		.lock()
		.mac
		.check_path_permissions(&resolved)
		.contains(FilterPerms::EXECUTE);
	process::mac_enforce(&proc, allowed, "spawn")?;
	let pid = exec::spawn(&proc, &resolved, &argv, &envp)?;
	Ok(pid as usize)
}
