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

//! Files management.
//!
//! A [`File`] is an open file description on a mounted filesystem. A
//! [`Description`] is what a file descriptor actually points to: a file, one
//! end of a pipe, or one end of a pseudo-terminal.

pub mod fd;
pub mod fs;
pub mod mountpoint;
pub mod path;
pub mod pipe;
pub mod pty;
pub mod vfs;

use crate::{
	device,
	device::Device,
	errno,
	errno::EResult,
	file::{
		fs::{DirEntry, FileType, FsHandle, Stat},
		mountpoint::Mount,
		path::PathBuf,
		pipe::{PipeReader, PipeWriter},
		pty::{PtyPrimary, PtySecondary},
	},
	memory,
	memory::vmm::{AddressSpace, MappingFlags},
	sync::mutex::Mutex,
	time,
};
use alloc::{sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Initializes files management: mounts the root filesystem and populates
/// `/dev`.
///
/// `root` is the handle of the device to mount as root, `0` for none.
pub fn init(root: device::DeviceHandle) -> EResult<()> {
	mountpoint::init(fs::FilesystemType::Ext, root)?;
	let dev_dir = path::Path::new(b"/dev")?;
	vfs::create_node(dev_dir, FileType::Directory, 0o755, 0)?;
	// Create a device node for every registered device
	for handle in 1.. {
		let Some(dev) = device::get(handle) else {
			break;
		};
		let typ = if dev.is_block() {
			FileType::BlockDevice
		} else {
			FileType::CharDevice
		};
		let path = path::Path::root().compound(path::Path::new_unchecked(b"dev"))?;
		let path = path.compound(path::Path::new_unchecked(dev.name()))?;
		vfs::create_node(&path, typ, 0o666, handle)?;
	}
	Ok(())
}

/// Open flag: read-only access.
pub const O_RDONLY: u32 = 0b01;
/// Open flag: write-only access.
pub const O_WRONLY: u32 = 0b10;
/// Open flag: read-write access.
pub const O_RDWR: u32 = 0b11;
/// Open flag: do not follow a symbolic link in the final component.
pub const O_NOFOLLOW: u32 = 0x4;
/// Open flag: every write happens at the end of the file.
pub const O_APPEND: u32 = 0x8;
/// Open flag: the file descriptor is closed on `exec`.
pub const O_CLOEXEC: u32 = 0x10;
/// Open flag: reads and writes do not block.
pub const O_NONBLOCK: u32 = 0x20;

/// The mask of access mode bits in open flags.
pub const O_ACCMODE: u32 = 0b11;
/// The mask of status flags that can be changed after open.
pub const STATUS_FLAGS_MASK: u32 = O_APPEND | O_NONBLOCK;

/// Seek whence: from the start of the file.
pub const SEEK_SET: u32 = 0;
/// Seek whence: from the current position.
pub const SEEK_CUR: u32 = 1;
/// Seek whence: from the end of the file.
pub const SEEK_END: u32 = 2;

/// Poll event: data available for reading.
pub const POLLIN: u32 = 0x01;
/// Poll event: writing would not block.
pub const POLLOUT: u32 = 0x04;
/// Poll event: an error occurred.
pub const POLLERR: u32 = 0x08;
/// Poll event: the other end hung up.
pub const POLLHUP: u32 = 0x10;
/// Poll event: the file descriptor is invalid.
pub const POLLNVAL: u32 = 0x20;

/// The access mode of an open file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessMode {
	/// Read-only.
	Read,
	/// Write-only.
	Write,
	/// Read and write.
	ReadWrite,
}

impl AccessMode {
	/// Returns the access mode encoded in the given open flags.
	///
	/// A zero access field is accepted and means read-only, which some
	/// clients rely on.
	pub fn from_flags(flags: u32) -> Self {
		match flags & O_ACCMODE {
			O_WRONLY => Self::Write,
			O_RDWR => Self::ReadWrite,
			_ => Self::Read,
		}
	}

	/// Tells whether the mode allows reading.
	pub fn can_read(self) -> bool {
		matches!(self, Self::Read | Self::ReadWrite)
	}

	/// Tells whether the mode allows writing.
	pub fn can_write(self) -> bool {
		matches!(self, Self::Write | Self::ReadWrite)
	}
}

/// An open file description.
pub struct File {
	/// The absolute path of the file, in compound form.
	path: PathBuf,
	/// The mount the file lives on.
	mount: Arc<Mount>,
	/// The filesystem handle of the file.
	handle: FsHandle,
	/// The access mode the file was opened with.
	mode: AccessMode,
	/// The mutable status flags (`O_APPEND`, `O_NONBLOCK`).
	status_flags: AtomicU32,
	/// The current seek index.
	pos: Mutex<u64>,
	/// The backing device, for device nodes.
	device: Option<Arc<Device>>,
}

impl File {
	/// Opens the file at `path`, which must be absolute, in compound form
	/// and already resolved through symbolic links.
	pub fn open(path: PathBuf, flags: u32) -> EResult<Arc<Self>> {
		let mode = AccessMode::from_flags(flags);
		let (mount, rel) = mountpoint::resolve(&path)?;
		let handle = mount.fs.open(&rel, mode.can_write())?;
		let stat = mount.fs.stat(handle)?;
		let device = match stat.typ {
			FileType::CharDevice | FileType::BlockDevice => device::get(stat.device),
			_ => None,
		};
		mount.open_count.fetch_add(1, Relaxed);
		Ok(Arc::new(Self {
			path,
			mount,
			handle,
			mode,
			status_flags: AtomicU32::new(flags & STATUS_FLAGS_MASK),
			pos: Mutex::new(0),
			device,
		}))
	}

	/// Returns the absolute path of the file.
	pub fn get_path(&self) -> &PathBuf {
		&self.path
	}

	/// Returns the access mode of the file.
	pub fn get_mode(&self) -> AccessMode {
		self.mode
	}

	/// Returns the status flags of the file.
	pub fn get_flags(&self) -> u32 {
		self.status_flags.load(Relaxed)
	}

	/// Replaces the status flags of the file. Bits outside
	/// [`STATUS_FLAGS_MASK`] are ignored.
	pub fn set_flags(&self, flags: u32) {
		self.status_flags.store(flags & STATUS_FLAGS_MASK, Relaxed);
	}

	/// Returns the current seek index.
	pub fn get_position(&self) -> u64 {
		*self.pos.lock()
	}

	/// Sets the seek index.
	pub fn set_position(&self, pos: u64) {
		*self.pos.lock() = pos;
	}

	/// Returns the status of the file.
	pub fn stat(&self) -> EResult<Stat> {
		self.mount.fs.stat(self.handle)
	}

	/// Reads from the file at the current seek index, advancing it.
	pub fn read(&self, buf: &mut [u8]) -> EResult<usize> {
		if !self.mode.can_read() {
			return Err(errno!(EACCES));
		}
		let mut pos = self.pos.lock();
		let n = match &self.device {
			Some(dev) => dev.read(*pos, buf)?,
			None => self.mount.fs.read(self.handle, *pos, buf)?,
		};
		// A character device has no seek index to maintain
		if self.device.is_none() || self.device.as_ref().is_some_and(|d| d.is_block()) {
			*pos += n as u64;
		}
		Ok(n)
	}

	/// Writes to the file at the current seek index, advancing it.
	pub fn write(&self, buf: &[u8]) -> EResult<usize> {
		if !self.mode.can_write() {
			return Err(errno!(EACCES));
		}
		let mut pos = self.pos.lock();
		if self.get_flags() & O_APPEND != 0 {
			*pos = self.stat()?.byte_size;
		}
		let n = match &self.device {
			Some(dev) => dev.write(*pos, buf)?,
			None => self.mount.fs.write(self.handle, *pos, buf)?,
		};
		if self.device.is_none() || self.device.as_ref().is_some_and(|d| d.is_block()) {
			*pos += n as u64;
		}
		Ok(n)
	}

	/// Moves the seek index according to `whence`, returning the new index.
	pub fn seek(&self, off: i64, whence: u32) -> EResult<u64> {
		let mut pos = self.pos.lock();
		let base = match whence {
			SEEK_SET => 0,
			SEEK_CUR => *pos as i64,
			SEEK_END => self.stat()?.byte_size as i64,
			_ => return Err(errno!(EINVAL)),
		};
		let new = base.checked_add(off).ok_or_else(|| errno!(ERANGE))?;
		if new < 0 {
			return Err(errno!(EINVAL));
		}
		*pos = new as u64;
		Ok(new as u64)
	}

	/// Truncates or extends the file to `size` bytes.
	pub fn truncate(&self, size: u64) -> EResult<()> {
		if !self.mode.can_write() {
			return Err(errno!(EACCES));
		}
		self.mount.fs.truncate(self.handle, size)
	}

	/// Performs an ioctl on the backing device.
	pub fn ioctl(&self, request: u32, arg: usize) -> EResult<u32> {
		match &self.device {
			Some(dev) => dev.ioctl(request, arg),
			None => Err(errno!(ENOTTY)),
		}
	}

	/// Returns the entries of the directory.
	pub fn read_entries(&self) -> EResult<Vec<DirEntry>> {
		self.mount.fs.read_entries(self.handle)
	}

	/// Flushes the file to its backing storage.
	pub fn sync(&self) -> EResult<()> {
		match &self.device {
			Some(dev) => {
				dev.sync();
				Ok(())
			}
			None => self.mount.fs.synchronize(Some(self.handle)),
		}
	}

	/// Maps the file at `virt` in `space`.
	///
	/// Device files map the device's memory; regular files get a private
	/// copy of their contents.
	pub fn mmap(
		&self,
		space: &mut AddressSpace,
		virt: u64,
		pages: usize,
		flags: MappingFlags,
		off: u64,
	) -> EResult<()> {
		if let Some(dev) = &self.device {
			return dev.mmap(space, virt, pages, flags);
		}
		space.map_alloc(virt, pages, flags)?;
		// Read the contents into the fresh mapping through the direct map
		let phys = space.virtual_to_physical(virt);
		let buf = unsafe {
			core::slice::from_raw_parts_mut(
				memory::phys_to_virt(phys),
				pages * memory::PAGE_SIZE,
			)
		};
		self.mount.fs.read(self.handle, off, buf)?;
		Ok(())
	}
}

impl Drop for File {
	fn drop(&mut self) {
		self.mount.fs.close(self.handle);
		self.mount.open_count.fetch_sub(1, Relaxed);
	}
}

/// Synthesized status for objects that do not live on a filesystem.
fn anon_stat() -> Stat {
	let now = time::now();
	Stat {
		unique_identifier: 0,
		mode: 0o666,
		typ: FileType::CharDevice,
		hard_link_count: 1,
		byte_size: 0,
		access_time: now,
		modify_time: now,
		create_time: now,
		io_block_size: memory::PAGE_SIZE as u32,
		io_block_count: 0,
		device: 0,
	}
}

/// What a file descriptor points to.
#[derive(Clone)]
pub enum Description {
	/// A file on a filesystem.
	File(Arc<File>),
	/// The read end of a pipe.
	PipeReader(PipeReader),
	/// The write end of a pipe.
	PipeWriter(PipeWriter),
	/// The primary end of a pseudo-terminal.
	PtyPrimary(PtyPrimary),
	/// The secondary end of a pseudo-terminal.
	PtySecondary(PtySecondary),
}

impl Description {
	/// Reads from the object, returning the number of bytes read.
	pub fn read(&self, buf: &mut [u8]) -> EResult<usize> {
		match self {
			Self::File(file) => file.read(buf),
			Self::PipeReader(r) => r.read(buf),
			Self::PipeWriter(_) => Err(errno!(EACCES)),
			Self::PtyPrimary(p) => p.read(buf),
			Self::PtySecondary(s) => s.read(buf),
		}
	}

	/// Writes to the object, returning the number of bytes written.
	pub fn write(&self, buf: &[u8]) -> EResult<usize> {
		match self {
			Self::File(file) => file.write(buf),
			Self::PipeReader(_) => Err(errno!(EACCES)),
			Self::PipeWriter(w) => w.write(buf),
			Self::PtyPrimary(p) => p.write(buf),
			Self::PtySecondary(s) => s.write(buf),
		}
	}

	/// Moves the seek index, for objects that have one.
	pub fn seek(&self, off: i64, whence: u32) -> EResult<u64> {
		match self {
			Self::File(file) => file.seek(off, whence),
			_ => Err(errno!(ESPIPE)),
		}
	}

	/// Returns the status of the object.
	pub fn stat(&self) -> EResult<Stat> {
		match self {
			Self::File(file) => file.stat(),
			_ => Ok(anon_stat()),
		}
	}

	/// Performs an ioctl on the object.
	pub fn ioctl(&self, space: &AddressSpace, request: u32, arg: usize) -> EResult<u32> {
		match self {
			Self::File(file) => file.ioctl(request, arg),
			Self::PipeReader(_) | Self::PipeWriter(_) => Err(errno!(ENOTTY)),
			Self::PtyPrimary(p) => p.ioctl(space, request, arg),
			Self::PtySecondary(s) => s.ioctl(space, request, arg),
		}
	}

	/// Returns the ready events of the object among those in `events`.
	pub fn poll(&self, events: u32) -> u32 {
		let ready = match self {
			// A file on a filesystem never blocks
			Self::File(_) => POLLIN | POLLOUT,
			Self::PipeReader(r) => r.poll(),
			Self::PipeWriter(w) => w.poll(),
			Self::PtyPrimary(p) => p.poll(),
			Self::PtySecondary(s) => s.poll(),
		};
		ready & (events | POLLERR | POLLHUP)
	}

	/// Flushes the object to its backing storage.
	pub fn sync(&self) -> EResult<()> {
		match self {
			Self::File(file) => file.sync(),
			_ => Ok(()),
		}
	}

	/// Returns the underlying [`File`], if the object is one.
	pub fn as_file(&self) -> EResult<&Arc<File>> {
		match self {
			Self::File(file) => Ok(file),
			_ => Err(errno!(ESPIPE)),
		}
	}
}
