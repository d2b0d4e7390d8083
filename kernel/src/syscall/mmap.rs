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

//! The `mmap` system call maps memory into the calling process's address
//! space, either anonymous or file-backed.

use crate::{
	errno,
	errno::EResult,
	mac::Capabilities,
	memory,
	memory::vmm::MappingFlags,
	process,
	syscall::util,
};

/// Memory protection: readable.
pub const PROT_READ: u32 = 0x1;
/// Memory protection: writable.
pub const PROT_WRITE: u32 = 0x2;
/// Memory protection: executable.
pub const PROT_EXEC: u32 = 0x4;

/// Mapping flag: the mapping is backed by anonymous zeroed memory.
pub const MAP_ANON: u32 = 0x1;
/// Mapping flag: the hint is a requirement, not a hint.
pub const MAP_FIXED: u32 = 0x2;

/// Converts `PROT_*` bits into mapping flags.
pub(super) fn prot_to_flags(prot: u32) -> MappingFlags {
	let mut flags = MappingFlags::USER;
	if prot & PROT_WRITE == 0 {
		flags |= MappingFlags::READ_ONLY;
	}
	if prot & PROT_EXEC != 0 {
		flags |= MappingFlags::EXEC;
	}
	flags
}

pub fn mmap(
	hint: usize,
	len: usize,
	prot: u32,
	flags: u32,
	fd: i32,
	off: u64,
) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::MODIFY_MEM);
	process::mac_enforce(&proc, allowed, "mmap")?;
	if len == 0 {
		return Err(errno!(EINVAL));
	}
	let pages = memory::pages_for(len);
	let map_flags = prot_to_flags(prot);
	let alloc_base = proc.lock().alloc_base;
	let desc = if flags & MAP_ANON == 0 {
		Some(proc.lock().get_file(fd as u32)?)
	} else {
		None
	};
	util::with_space(&proc, |space| {
		let addr = if flags & MAP_FIXED != 0 {
			if !memory::is_aligned(hint as u64) {
				return Err(errno!(EINVAL));
			}
			hint as u64
		} else {
			let hint = if hint != 0 { hint as u64 } else { alloc_base };
			space
				.find_free(hint, pages)
				.ok_or_else(|| errno!(EAGAIN))?
		};
		match &desc {
			None => space.map_alloc(addr, pages, map_flags)?,
			Some(desc) => desc.as_file()?.mmap(space, addr, pages, map_flags, off)?,
		}
		Ok(addr as usize)
	})
}
