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

//! The `mprotect` system call changes the protection of a memory range.
//!
//! The range must be fully covered by a single existing mapping.

use crate::{
	errno::EResult,
	mac::Capabilities,
	process,
	syscall::{mmap::prot_to_flags, util},
};

pub fn mprotect(addr: usize, len: usize, prot: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::MODIFY_MEM);
	process::mac_enforce(&proc, allowed, "mprotect")?;
	util::with_space(&proc, |space| {
		space.remap_range(addr as u64, len, prot_to_flags(prot))?;
		Ok(0)
	})
}
