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

//! File descriptors.
//!
//! A file descriptor is a small integer held by a process naming an entry in
//! its descriptor table. The table has a fixed number of slots; a slot is
//! free iff it holds no descriptor.

use crate::{errno, errno::EResult, file::Description, limits};
use core::array;

/// File descriptor flag: the descriptor is closed on a successful call to
/// `exec`.
pub const FD_CLOEXEC: u32 = 1;

/// A file descriptor, pointing to a [`Description`].
#[derive(Clone)]
pub struct FileDescriptor {
	/// The file descriptor's flags.
	pub flags: u32,
	/// The description the descriptor points to.
	desc: Description,
}

impl FileDescriptor {
	/// Creates a new file descriptor.
	pub fn new(flags: u32, desc: Description) -> Self {
		Self {
			flags,
			desc,
		}
	}

	/// Returns the description the descriptor points to.
	pub fn get(&self) -> &Description {
		&self.desc
	}
}

/// A process's table of file descriptors.
pub struct FileDescriptorTable([Option<FileDescriptor>; limits::OPEN_MAX]);

impl Default for FileDescriptorTable {
	fn default() -> Self {
		Self(array::from_fn(|_| None))
	}
}

impl FileDescriptorTable {
	/// Returns the free file descriptor with the lowest ID, at least `min`.
	fn find_free(&self, min: usize) -> EResult<u32> {
		self.0
			.iter()
			.enumerate()
			.skip(min)
			.find(|(_, fd)| fd.is_none())
			.map(|(id, _)| id as u32)
			.ok_or_else(|| errno!(EMFILE))
	}

	/// Creates a file descriptor pointing to `desc`, returning its ID.
	pub fn add_file(&mut self, flags: u32, desc: Description) -> EResult<u32> {
		let id = self.find_free(0)?;
		self.0[id as usize] = Some(FileDescriptor::new(flags, desc));
		Ok(id)
	}

	/// Creates a pair of file descriptors, ensuring the first is not kept if
	/// the creation of the second fails.
	pub fn add_file_pair(
		&mut self,
		desc0: Description,
		desc1: Description,
	) -> EResult<(u32, u32)> {
		let id0 = self.find_free(0)?;
		self.0[id0 as usize] = Some(FileDescriptor::new(0, desc0));
		match self.find_free(0) {
			Ok(id1) => {
				self.0[id1 as usize] = Some(FileDescriptor::new(0, desc1));
				Ok((id0, id1))
			}
			Err(e) => {
				self.0[id0 as usize] = None;
				Err(e)
			}
		}
	}

	/// Returns the file descriptor with the given ID.
	pub fn get_file(&self, id: u32) -> EResult<&FileDescriptor> {
		self.0
			.get(id as usize)
			.and_then(|fd| fd.as_ref())
			.ok_or_else(|| errno!(EBADF))
	}

	/// Returns a mutable reference to the file descriptor with the given ID.
	pub fn get_file_mut(&mut self, id: u32) -> EResult<&mut FileDescriptor> {
		self.0
			.get_mut(id as usize)
			.and_then(|fd| fd.as_mut())
			.ok_or_else(|| errno!(EBADF))
	}

	/// Tells whether `id` names an open file descriptor.
	pub fn is_valid_file(&self, id: u32) -> bool {
		self.0
			.get(id as usize)
			.map(|fd| fd.is_some())
			.unwrap_or(false)
	}

	/// Closes the file descriptor with the given ID.
	pub fn remove_file(&mut self, id: u32) -> EResult<()> {
		let slot = self.0.get_mut(id as usize).ok_or_else(|| errno!(EBADF))?;
		slot.take().map(|_| ()).ok_or_else(|| errno!(EBADF))
	}

	/// Makes `id` point to `desc`, closing what it pointed to before, and
	/// keeping previously-free slots free in between.
	pub fn replace_file(&mut self, id: u32, flags: u32, desc: Description) -> EResult<()> {
		let slot = self.0.get_mut(id as usize).ok_or_else(|| errno!(EBADF))?;
		*slot = Some(FileDescriptor::new(flags, desc));
		Ok(())
	}

	/// Duplicates the descriptor `id` onto the lowest free slot at least
	/// `min`, returning the new ID.
	///
	/// The new descriptor points to the same underlying description. Its
	/// flags are cleared unless `cloexec` is set.
	pub fn dup(&mut self, id: u32, min: u32, cloexec: bool) -> EResult<u32> {
		let desc = self.get_file(id)?.get().clone();
		let new_id = self.find_free(min as usize)?;
		let flags = if cloexec { FD_CLOEXEC } else { 0 };
		self.0[new_id as usize] = Some(FileDescriptor::new(flags, desc));
		Ok(new_id)
	}

	/// Closes every file descriptor.
	pub fn flush_files(&mut self) {
		for slot in &mut self.0 {
			*slot = None;
		}
	}

	/// Closes every file descriptor with the `FD_CLOEXEC` flag.
	pub fn flush_exec_files(&mut self) {
		for slot in &mut self.0 {
			if slot.as_ref().is_some_and(|fd| fd.flags & FD_CLOEXEC != 0) {
				*slot = None;
			}
		}
	}

	/// Clones the table, bumping the reference count of every open
	/// description.
	pub fn duplicate(&self) -> Self {
		Self(self.0.clone())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::file::pipe::Pipe;

	#[test_case]
	fn fd_lowest_free() {
		let mut table = FileDescriptorTable::default();
		let (r, w) = Pipe::pair(false);
		let fd0 = table
			.add_file(0, Description::PipeReader(r.clone()))
			.unwrap();
		let fd1 = table
			.add_file(0, Description::PipeWriter(w.clone()))
			.unwrap();
		assert_eq!((fd0, fd1), (0, 1));
		table.remove_file(0).unwrap();
		let fd2 = table.add_file(0, Description::PipeReader(r)).unwrap();
		assert_eq!(fd2, 0);
	}

	#[test_case]
	fn fd_dup_shares_object() {
		let mut table = FileDescriptorTable::default();
		let (r, w) = Pipe::pair(false);
		let rfd = table.add_file(0, Description::PipeReader(r)).unwrap();
		table.add_file(0, Description::PipeWriter(w)).unwrap();
		let dup = table.dup(rfd, 0, false).unwrap();
		// Closing the original leaves the duplicate usable
		table.remove_file(rfd).unwrap();
		let fd = table.get_file(dup).unwrap();
		let mut buf = [0u8; 1];
		// Still connected: the write end is open, reading would just block
		assert_eq!(fd.get().poll(crate::file::POLLIN), 0);
		assert!(fd.get().read(&mut buf).is_err());
	}

	#[test_case]
	fn fd_cloexec_flush() {
		let mut table = FileDescriptorTable::default();
		let (r, w) = Pipe::pair(false);
		let keep = table.add_file(0, Description::PipeReader(r)).unwrap();
		let lose = table
			.add_file(FD_CLOEXEC, Description::PipeWriter(w))
			.unwrap();
		table.flush_exec_files();
		assert!(table.is_valid_file(keep));
		assert!(!table.is_valid_file(lose));
	}

	#[test_case]
	fn fd_table_bounded() {
		let mut table = FileDescriptorTable::default();
		let (r, _w) = Pipe::pair(false);
		for _ in 0..limits::OPEN_MAX {
			table
				.add_file(0, Description::PipeReader(r.clone()))
				.unwrap();
		}
		assert!(table
			.add_file(0, Description::PipeReader(r.clone()))
			.is_err());
	}
}
