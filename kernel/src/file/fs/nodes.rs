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

//! Generic node storage for the in-memory filesystem drivers.
//!
//! [`MemFs`] holds a tree of nodes and the table of open handles. The
//! differences between the ext-style and FAT-style drivers (name matching,
//! link support, mode handling) are factored out into [`FsPolicy`].

use crate::{
	device,
	device::DeviceHandle,
	errno,
	errno::EResult,
	file::{
		fs::{DirEntry, FileType, FilesystemOps, FsHandle, Stat},
		path::Path,
	},
	sync::mutex::Mutex,
	time,
	time::Timestamp,
};
use alloc::{collections::BTreeMap, vec::Vec};
use core::marker::PhantomData;

/// The unique identifier of the root node.
pub const ROOT_INODE: u64 = 1;

/// Behaviour differences between the filesystem kinds.
pub trait FsPolicy: Send + Sync + 'static {
	/// Tells whether name matching ignores ASCII case.
	const CASE_INSENSITIVE: bool;
	/// Tells whether symbolic links and hard links are supported.
	const SUPPORTS_LINKS: bool;
	/// When set, every node reports this mode and creation modes are
	/// ignored.
	const FORCE_MODE: Option<u16>;
	/// The preferred I/O block size, in bytes.
	const BLOCK_SIZE: u32;
}

/// The content of a node.
enum NodeContent {
	Regular(Vec<u8>),
	Directory(Vec<(Vec<u8>, u64)>),
	Symlink(Vec<u8>),
}

/// A file node.
struct Node {
	typ: FileType,
	mode: u16,
	nlink: u16,
	device: DeviceHandle,
	atime: Timestamp,
	mtime: Timestamp,
	ctime: Timestamp,
	content: NodeContent,
	/// The number of open handles on the node.
	open_count: usize,
	/// Set when the last link was removed while the node was still open.
	orphan: bool,
}

impl Node {
	fn new(typ: FileType, mode: u16, device: DeviceHandle) -> Self {
		let now = time::now();
		let content = match typ {
			FileType::Directory => NodeContent::Directory(Vec::new()),
			FileType::Symlink => NodeContent::Symlink(Vec::new()),
			_ => NodeContent::Regular(Vec::new()),
		};
		Self {
			typ,
			mode,
			nlink: 1,
			device,
			atime: now,
			mtime: now,
			ctime: now,
			content,
			open_count: 0,
			orphan: false,
		}
	}

	fn entries(&self) -> EResult<&Vec<(Vec<u8>, u64)>> {
		match &self.content {
			NodeContent::Directory(entries) => Ok(entries),
			_ => Err(errno!(ENOTDIR)),
		}
	}

	fn entries_mut(&mut self) -> EResult<&mut Vec<(Vec<u8>, u64)>> {
		match &mut self.content {
			NodeContent::Directory(entries) => Ok(entries),
			_ => Err(errno!(ENOTDIR)),
		}
	}
}

/// An open handle.
struct OpenHandle {
	ino: u64,
	write: bool,
}

struct Inner {
	nodes: BTreeMap<u64, Node>,
	handles: BTreeMap<FsHandle, OpenHandle>,
	next_ino: u64,
	next_handle: FsHandle,
}

impl Inner {
	fn node(&self, ino: u64) -> &Node {
		&self.nodes[&ino]
	}

	fn node_mut(&mut self, ino: u64) -> &mut Node {
		self.nodes.get_mut(&ino).unwrap()
	}

	fn names_eq<P: FsPolicy>(a: &[u8], b: &[u8]) -> bool {
		if P::CASE_INSENSITIVE {
			a.eq_ignore_ascii_case(b)
		} else {
			a == b
		}
	}

	/// Resolves `path` to a node, returning its identifier.
	fn lookup<P: FsPolicy>(&self, path: &Path) -> EResult<u64> {
		let mut ino = ROOT_INODE;
		for comp in path.components() {
			let entries = self.node(ino).entries()?;
			ino = entries
				.iter()
				.find(|(name, _)| Self::names_eq::<P>(name, comp))
				.map(|(_, ino)| *ino)
				.ok_or_else(|| errno!(ENOENT))?;
		}
		Ok(ino)
	}

	/// Resolves the parent directory of `path`, returning its identifier and
	/// the final component.
	fn lookup_parent<'p, P: FsPolicy>(&self, path: &'p Path) -> EResult<(u64, &'p [u8])> {
		let name = path.file_name().ok_or_else(|| errno!(ENOENT))?;
		let parent = path.parent().unwrap_or(Path::root());
		let ino = self.lookup::<P>(parent)?;
		Ok((ino, name))
	}

	/// Inserts a new node under the directory `parent`.
	fn add_node<P: FsPolicy>(
		&mut self,
		parent: u64,
		name: &[u8],
		node: Node,
	) -> EResult<u64> {
		if name.is_empty() || name.len() > crate::limits::NAME_MAX {
			return Err(errno!(ENAMETOOLONG));
		}
		let exists = self
			.node(parent)
			.entries()?
			.iter()
			.any(|(n, _)| Self::names_eq::<P>(n, name));
		if exists {
			return Err(errno!(EBUSY));
		}
		let ino = self.next_ino;
		self.next_ino += 1;
		self.nodes.insert(ino, node);
		let now = time::now();
		let parent = self.node_mut(parent);
		parent.entries_mut()?.push((name.to_vec(), ino));
		parent.mtime = now;
		Ok(ino)
	}

	/// Drops the node `ino` if it has no links and no open handles left.
	fn reap(&mut self, ino: u64) {
		let node = self.node(ino);
		if node.nlink == 0 && node.open_count == 0 {
			self.nodes.remove(&ino);
		}
	}
}

/// An in-memory filesystem, parameterized by the policy of its kind.
pub struct MemFs<P: FsPolicy> {
	inner: Mutex<Inner>,
	/// The backing device, `0` for none.
	backing: DeviceHandle,
	_policy: PhantomData<P>,
}

impl<P: FsPolicy> MemFs<P> {
	/// Creates an empty filesystem over the device `backing`.
	pub fn new(backing: DeviceHandle) -> Self {
		let mode = P::FORCE_MODE.unwrap_or(0o755);
		let mut nodes = BTreeMap::new();
		nodes.insert(ROOT_INODE, Node::new(FileType::Directory, mode, 0));
		Self {
			inner: Mutex::new(Inner {
				nodes,
				handles: BTreeMap::new(),
				next_ino: ROOT_INODE + 1,
				next_handle: 1,
			}),
			backing,
			_policy: PhantomData,
		}
	}

	fn mode_of(&self, mode: u16) -> u16 {
		P::FORCE_MODE.unwrap_or(mode)
	}
}

impl<P: FsPolicy> FilesystemOps for MemFs<P> {
	fn open(&self, path: &Path, write: bool) -> EResult<FsHandle> {
		let mut inner = self.inner.lock();
		let ino = inner.lookup::<P>(path)?;
		let handle = inner.next_handle;
		inner.next_handle += 1;
		inner.handles.insert(
			handle,
			OpenHandle {
				ino,
				write,
			},
		);
		inner.node_mut(ino).open_count += 1;
		Ok(handle)
	}

	fn close(&self, handle: FsHandle) {
		let mut inner = self.inner.lock();
		if let Some(h) = inner.handles.remove(&handle) {
			inner.node_mut(h.ino).open_count -= 1;
			inner.reap(h.ino);
		}
	}

	fn read(&self, handle: FsHandle, off: u64, buf: &mut [u8]) -> EResult<usize> {
		let mut inner = self.inner.lock();
		let ino = inner.handles.get(&handle).ok_or_else(|| errno!(EBADF))?.ino;
		let now = time::now();
		let node = inner.node_mut(ino);
		node.atime = now;
		let content = match &node.content {
			NodeContent::Regular(data) => data,
			NodeContent::Symlink(target) => target,
			NodeContent::Directory(_) => return Err(errno!(EINVAL)),
		};
		let off = (off as usize).min(content.len());
		let n = buf.len().min(content.len() - off);
		buf[..n].copy_from_slice(&content[off..(off + n)]);
		Ok(n)
	}

	fn write(&self, handle: FsHandle, off: u64, buf: &[u8]) -> EResult<usize> {
		let mut inner = self.inner.lock();
		let h = inner.handles.get(&handle).ok_or_else(|| errno!(EBADF))?;
		if !h.write {
			return Err(errno!(EACCES));
		}
		let ino = h.ino;
		let now = time::now();
		let node = inner.node_mut(ino);
		let NodeContent::Regular(data) = &mut node.content else {
			return Err(errno!(EINVAL));
		};
		let off = off as usize;
		if off + buf.len() > data.len() {
			data.resize(off + buf.len(), 0);
		}
		data[off..(off + buf.len())].copy_from_slice(buf);
		node.mtime = now;
		Ok(buf.len())
	}

	fn stat(&self, handle: FsHandle) -> EResult<Stat> {
		let inner = self.inner.lock();
		let ino = inner.handles.get(&handle).ok_or_else(|| errno!(EBADF))?.ino;
		let node = inner.node(ino);
		let size = match &node.content {
			NodeContent::Regular(data) => data.len() as u64,
			NodeContent::Symlink(target) => target.len() as u64,
			NodeContent::Directory(entries) => entries.len() as u64,
		};
		Ok(Stat {
			unique_identifier: ino,
			mode: node.mode,
			typ: node.typ,
			hard_link_count: node.nlink,
			byte_size: size,
			access_time: node.atime,
			modify_time: node.mtime,
			create_time: node.ctime,
			io_block_size: P::BLOCK_SIZE,
			io_block_count: size.div_ceil(P::BLOCK_SIZE as u64),
			device: node.device,
		})
	}

	fn truncate(&self, handle: FsHandle, size: u64) -> EResult<()> {
		let mut inner = self.inner.lock();
		let h = inner.handles.get(&handle).ok_or_else(|| errno!(EBADF))?;
		if !h.write {
			return Err(errno!(EACCES));
		}
		let ino = h.ino;
		let now = time::now();
		let node = inner.node_mut(ino);
		let NodeContent::Regular(data) = &mut node.content else {
			return Err(errno!(EINVAL));
		};
		data.resize(size as usize, 0);
		node.mtime = now;
		Ok(())
	}

	fn unlink(&self, path: &Path) -> EResult<()> {
		let mut inner = self.inner.lock();
		let (parent, name) = inner.lookup_parent::<P>(path)?;
		let entries = inner.node(parent).entries()?;
		let pos = entries
			.iter()
			.position(|(n, _)| Inner::names_eq::<P>(n, name))
			.ok_or_else(|| errno!(ENOENT))?;
		let ino = entries[pos].1;
		// A directory must be empty to be removed
		if let NodeContent::Directory(entries) = &inner.node(ino).content {
			if !entries.is_empty() {
				return Err(errno!(EBUSY));
			}
		}
		inner.node_mut(parent).entries_mut()?.remove(pos);
		let node = inner.node_mut(ino);
		node.nlink -= 1;
		if node.nlink == 0 {
			node.orphan = true;
		}
		inner.reap(ino);
		Ok(())
	}

	fn rename(&self, src: &Path, dst: &Path, keep: bool) -> EResult<()> {
		if keep && !P::SUPPORTS_LINKS {
			return Err(errno!(ENOTSUP));
		}
		let mut inner = self.inner.lock();
		let (src_parent, src_name) = inner.lookup_parent::<P>(src)?;
		let (dst_parent, dst_name) = inner.lookup_parent::<P>(dst)?;
		let ino = {
			let entries = inner.node(src_parent).entries()?;
			entries
				.iter()
				.find(|(n, _)| Inner::names_eq::<P>(n, src_name))
				.map(|(_, ino)| *ino)
				.ok_or_else(|| errno!(ENOENT))?
		};
		let exists = inner
			.node(dst_parent)
			.entries()?
			.iter()
			.any(|(n, _)| Inner::names_eq::<P>(n, dst_name));
		if exists {
			return Err(errno!(EBUSY));
		}
		let dst_name = dst_name.to_vec();
		inner.node_mut(dst_parent).entries_mut()?.push((dst_name, ino));
		if keep {
			inner.node_mut(ino).nlink += 1;
		} else {
			let entries = inner.node_mut(src_parent).entries_mut()?;
			let pos = entries
				.iter()
				.position(|(n, _)| Inner::names_eq::<P>(n, src_name))
				.unwrap();
			entries.remove(pos);
		}
		Ok(())
	}

	fn create_node(
		&self,
		path: &Path,
		typ: FileType,
		mode: u16,
		device: DeviceHandle,
	) -> EResult<()> {
		let mut inner = self.inner.lock();
		let (parent, name) = inner.lookup_parent::<P>(path)?;
		inner.add_node::<P>(parent, name, Node::new(typ, self.mode_of(mode), device))?;
		Ok(())
	}

	fn create_symlink(&self, path: &Path, target: &[u8]) -> EResult<()> {
		if !P::SUPPORTS_LINKS {
			return Err(errno!(ENOTSUP));
		}
		let mut inner = self.inner.lock();
		let (parent, name) = inner.lookup_parent::<P>(path)?;
		let mut node = Node::new(FileType::Symlink, 0o777, 0);
		node.content = NodeContent::Symlink(target.to_vec());
		inner.add_node::<P>(parent, name, node)?;
		Ok(())
	}

	fn create_hard_link(&self, path: &Path, target: &Path) -> EResult<()> {
		self.rename(target, path, true)
	}

	fn read_symbolic_link(&self, path: &Path) -> EResult<Vec<u8>> {
		let inner = self.inner.lock();
		let ino = inner.lookup::<P>(path)?;
		match &inner.node(ino).content {
			NodeContent::Symlink(target) => Ok(target.clone()),
			_ => Err(errno!(EINVAL)),
		}
	}

	fn read_entries(&self, handle: FsHandle) -> EResult<Vec<DirEntry>> {
		let inner = self.inner.lock();
		let ino = inner.handles.get(&handle).ok_or_else(|| errno!(EBADF))?.ino;
		let entries = inner.node(ino).entries()?;
		Ok(entries
			.iter()
			.map(|(name, ino)| DirEntry {
				inode: *ino,
				typ: inner.node(*ino).typ,
				name: name.clone(),
			})
			.collect())
	}

	fn synchronize(&self, _handle: Option<FsHandle>) -> EResult<()> {
		if let Some(dev) = device::get(self.backing) {
			dev.sync();
		}
		Ok(())
	}
}
