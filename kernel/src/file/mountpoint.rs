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

//! Mount points.
//!
//! Path resolution walks the mount with the longest matching prefix, so a
//! mount shadows the part of its parent filesystem underneath it.

use crate::{
	device::DeviceHandle,
	errno,
	errno::EResult,
	file::{
		fs::{FileType, FilesystemOps, FilesystemType},
		path::{Path, PathBuf},
		vfs,
	},
	limits,
	sync::mutex::Mutex,
};
use alloc::sync::Arc;
use arrayvec::ArrayVec;
use core::sync::atomic::{AtomicUsize, Ordering::Relaxed};

/// A mounted filesystem.
pub struct Mount {
	/// The handle of the source device. `0` for none.
	pub source: DeviceHandle,
	/// The path the filesystem is mounted on, in compound form.
	pub target: PathBuf,
	/// The kind of the filesystem.
	pub fs_type: FilesystemType,
	/// The filesystem instance.
	pub fs: Arc<dyn FilesystemOps>,
	/// The number of files currently open under the mount.
	pub open_count: AtomicUsize,
}

/// The mount table.
static MOUNTS: Mutex<ArrayVec<Arc<Mount>, { limits::MOUNT_MAX }>> =
	Mutex::new(ArrayVec::new_const());

/// Mounts the root filesystem. Must be called before any other operation on
/// the table.
pub fn init(fs_type: FilesystemType, source: DeviceHandle) -> EResult<()> {
	let fs = fs_type.mount(source)?;
	MOUNTS.lock().push(Arc::new(Mount {
		source,
		target: PathBuf::root(),
		fs_type,
		fs,
		open_count: AtomicUsize::new(0),
	}));
	Ok(())
}

/// Mounts a filesystem of kind `fs_type`, backed by the device `source`, on
/// the directory at `target`.
///
/// The target must exist and be a directory, and must not already carry a
/// mount.
pub fn mount(source: DeviceHandle, target: PathBuf, fs_type: FilesystemType) -> EResult<()> {
	// The target must be an existing directory
	let stat = vfs::stat_path(&target)?;
	if stat.typ != FileType::Directory {
		return Err(errno!(ENOTDIR));
	}
	let mut mounts = MOUNTS.lock();
	if mounts.iter().any(|m| *m.target == *target) {
		return Err(errno!(EBUSY));
	}
	if mounts.is_full() {
		return Err(errno!(EAGAIN));
	}
	let fs = fs_type.mount(source)?;
	mounts.push(Arc::new(Mount {
		source,
		target,
		fs_type,
		fs,
		open_count: AtomicUsize::new(0),
	}));
	Ok(())
}

/// Unmounts the filesystem mounted on `target`.
///
/// Without `force`, the operation fails if any file is still open under the
/// mount. The root filesystem and mounts with other mounts nested under them
/// cannot be unmounted.
pub fn umount(target: &Path, force: bool) -> EResult<()> {
	let mut mounts = MOUNTS.lock();
	let pos = mounts
		.iter()
		.position(|m| *m.target == *target)
		.ok_or_else(|| errno!(ENOENT))?;
	if target == Path::root() {
		return Err(errno!(EBUSY));
	}
	let nested = mounts
		.iter()
		.any(|m| *m.target != *target && m.target.starts_with(target));
	if nested {
		return Err(errno!(EBUSY));
	}
	if !force && mounts[pos].open_count.load(Relaxed) > 0 {
		return Err(errno!(EBUSY));
	}
	mounts.remove(pos);
	Ok(())
}

/// Resolves the mount holding `path`, returning it together with the path
/// relative to the mount's root, in compound form.
///
/// `path` must be in compound form.
pub fn resolve(path: &Path) -> EResult<(Arc<Mount>, PathBuf)> {
	let mounts = MOUNTS.lock();
	let mount = mounts
		.iter()
		.filter(|m| path.starts_with(&m.target))
		.max_by_key(|m| m.target.len())
		.ok_or_else(|| errno!(ENOENT))?;
	let rest = path.strip_prefix(&mount.target).unwrap();
	let rel = Path::root().compound(rest)?;
	Ok((mount.clone(), rel))
}

/// Calls `synchronize` on every mounted filesystem.
pub fn sync_all() -> EResult<()> {
	let mounts = MOUNTS.lock();
	for m in mounts.iter() {
		m.fs.synchronize(None)?;
	}
	Ok(())
}
