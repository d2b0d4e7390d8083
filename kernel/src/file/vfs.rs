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

//! The Virtual File System.
//!
//! The VFS ties paths, mounts and filesystem drivers together. Every path
//! it takes is absolute and in compound form; turning a process-relative
//! path into that form is the system call layer's business.

use crate::{
	errno,
	errno::EResult,
	file::{
		fs::{FileType, Stat},
		mountpoint,
		path::{Path, PathBuf},
		File,
	},
	limits,
};
use alloc::{collections::VecDeque, sync::Arc, vec::Vec};

/// Resolves symbolic links in `path`, returning the final path in compound
/// form.
///
/// If `follow_last` is unset, a symbolic link in the final component is not
/// dereferenced.
///
/// At most [`limits::SYMLOOP_MAX`] links are dereferenced; going further
/// fails with [`errno::ERANGE`].
pub fn resolve_path(path: &Path, follow_last: bool) -> EResult<PathBuf> {
	let mut hops = 0;
	let mut cur = PathBuf::root();
	let mut pending: VecDeque<Vec<u8>> = path.components().map(|c| c.to_vec()).collect();
	while let Some(comp) = pending.pop_front() {
		let next = cur.compound(Path::new_unchecked(&comp))?;
		let is_last = pending.is_empty();
		let (mount, rel) = mountpoint::resolve(&next)?;
		if follow_last || !is_last {
			if let Ok(target) = mount.fs.read_symbolic_link(&rel) {
				hops += 1;
				if hops > limits::SYMLOOP_MAX {
					return Err(errno!(ERANGE));
				}
				let target = Path::new(&target)?;
				if target.is_absolute() {
					cur = PathBuf::root();
				}
				for c in target.components().rev() {
					pending.push_front(c.to_vec());
				}
				continue;
			}
		}
		cur = next;
	}
	Ok(cur)
}

/// Opens the file at `path` with the given open flags.
///
/// `path` must be absolute and in compound form.
pub fn open(path: &Path, flags: u32) -> EResult<Arc<File>> {
	let follow = flags & crate::file::O_NOFOLLOW == 0;
	let resolved = resolve_path(path, follow)?;
	File::open(resolved, flags)
}

/// Returns the status of the file at `path`, following symbolic links.
pub fn stat_path(path: &Path) -> EResult<Stat> {
	stat_path_impl(path, true)
}

/// Returns the status of the file at `path` without following a symbolic
/// link in the final component.
pub fn lstat_path(path: &Path) -> EResult<Stat> {
	stat_path_impl(path, false)
}

fn stat_path_impl(path: &Path, follow: bool) -> EResult<Stat> {
	let resolved = resolve_path(path, follow)?;
	let (mount, rel) = mountpoint::resolve(&resolved)?;
	let handle = mount.fs.open(&rel, false)?;
	let res = mount.fs.stat(handle);
	mount.fs.close(handle);
	res
}

/// Resolves the parent directory of `path` through symbolic links,
/// returning the resolved path with the final component re-appended.
fn resolve_parent(path: &Path) -> EResult<PathBuf> {
	let name = path.file_name().ok_or_else(|| errno!(ENOENT))?;
	let parent = path.parent().unwrap_or(Path::root());
	let parent = resolve_path(parent, true)?;
	parent.compound(Path::new_unchecked(name))
}

/// Creates a node at `path`.
pub fn create_node(
	path: &Path,
	typ: FileType,
	mode: u16,
	device: crate::device::DeviceHandle,
) -> EResult<()> {
	let path = resolve_parent(path)?;
	let (mount, rel) = mountpoint::resolve(&path)?;
	mount.fs.create_node(&rel, typ, mode, device)
}

/// Removes the link at `path`.
pub fn unlink(path: &Path) -> EResult<()> {
	let path = resolve_parent(path)?;
	let (mount, rel) = mountpoint::resolve(&path)?;
	mount.fs.unlink(&rel)
}

/// Renames the file at `src` to `dst`. Both must live on the same mount.
pub fn rename(src: &Path, dst: &Path, keep: bool) -> EResult<()> {
	let src = resolve_parent(src)?;
	let dst = resolve_parent(dst)?;
	let (src_mount, src_rel) = mountpoint::resolve(&src)?;
	let (dst_mount, dst_rel) = mountpoint::resolve(&dst)?;
	if !Arc::ptr_eq(&src_mount, &dst_mount) {
		return Err(errno!(EBUSY));
	}
	src_mount.fs.rename(&src_rel, &dst_rel, keep)
}

/// Creates a symbolic link at `path` pointing to `target`.
pub fn create_symlink(path: &Path, target: &[u8]) -> EResult<()> {
	let path = resolve_parent(path)?;
	let (mount, rel) = mountpoint::resolve(&path)?;
	mount.fs.create_symlink(&rel, target)
}

/// Creates a hard link at `path` pointing to the file at `target`.
pub fn create_hard_link(path: &Path, target: &Path) -> EResult<()> {
	let path = resolve_parent(path)?;
	let target = resolve_path(target, false)?;
	let (mount, rel) = mountpoint::resolve(&path)?;
	let (target_mount, target_rel) = mountpoint::resolve(&target)?;
	if !Arc::ptr_eq(&mount, &target_mount) {
		return Err(errno!(EBUSY));
	}
	mount.fs.create_hard_link(&rel, &target_rel)
}

/// Returns the target of the symbolic link at `path`.
pub fn read_symbolic_link(path: &Path) -> EResult<Vec<u8>> {
	let path = resolve_parent(path)?;
	let (mount, rel) = mountpoint::resolve(&path)?;
	mount.fs.read_symbolic_link(&rel)
}
