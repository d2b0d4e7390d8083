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

//! The `getdents` system call reads directory entries.
//!
//! Each record starts with a fixed header followed by the nul-terminated
//! name, padded to an 8-byte boundary; `d_reclen` gives the offset of the
//! next record. The file's seek index counts entries already returned, so
//! successive calls walk the whole directory.

use crate::{
	errno,
	errno::EResult,
	memory::user::UserSlice,
	syscall::util,
};
use alloc::vec::Vec;

/// The fixed part of a directory entry record.
const HEADER_LEN: usize = 8 + 2 + 1;

pub fn getdents(fd: u32, buf: usize, len: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let desc = proc.lock().get_file(fd)?;
	let file = desc.as_file()?;
	let entries = file.read_entries()?;
	let first = file.get_position() as usize;
	let mut out: Vec<u8> = Vec::new();
	let mut consumed = 0;
	for entry in entries.iter().skip(first) {
		let reclen = (HEADER_LEN + entry.name.len() + 1).next_multiple_of(8);
		if out.len() + reclen > len {
			break;
		}
		out.extend_from_slice(&entry.inode.to_ne_bytes());
		out.extend_from_slice(&(reclen as u16).to_ne_bytes());
		out.push(util::file_type_code(entry.typ) as u8);
		out.extend_from_slice(&entry.name);
		out.push(0);
		out.resize(out.len().next_multiple_of(8), 0);
		consumed += 1;
	}
	// The buffer cannot even fit the next entry
	if consumed == 0 && first < entries.len() {
		return Err(errno!(ERANGE));
	}
	file.set_position((first + consumed) as u64);
	util::with_space(&proc, |space| {
		UserSlice::from_raw(buf, out.len()).copy_to_user(space, &out)
	})
}
