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

//! The ext-style filesystem driver.
//!
//! Case-sensitive names, permission bits, symbolic links and hard links.

use crate::file::fs::nodes::{FsPolicy, MemFs};

/// Policy of the ext-style filesystem.
pub struct ExtPolicy;

impl FsPolicy for ExtPolicy {
	const CASE_INSENSITIVE: bool = false;
	const SUPPORTS_LINKS: bool = true;
	const FORCE_MODE: Option<u16> = None;
	const BLOCK_SIZE: u32 = 1024;
}

/// The ext-style filesystem.
pub type ExtFs = MemFs<ExtPolicy>;

#[cfg(test)]
mod test {
	use super::*;
	use crate::file::{
		fs::{FileType, FilesystemOps},
		path::Path,
	};

	#[test_case]
	fn ext_create_read_write() {
		let fs = ExtFs::new(0);
		fs.create_node(Path::new_unchecked(b"/foo"), FileType::Regular, 0o644, 0)
			.unwrap();
		let h = fs.open(Path::new_unchecked(b"/foo"), true).unwrap();
		assert_eq!(fs.write(h, 0, b"hello").unwrap(), 5);
		let mut buf = [0u8; 16];
		assert_eq!(fs.read(h, 0, &mut buf).unwrap(), 5);
		assert_eq!(&buf[..5], b"hello");
		let stat = fs.stat(h).unwrap();
		assert_eq!(stat.byte_size, 5);
		assert_eq!(stat.mode, 0o644);
		assert_eq!(stat.typ, FileType::Regular);
		fs.close(h);
	}

	#[test_case]
	fn ext_case_sensitive() {
		let fs = ExtFs::new(0);
		fs.create_node(Path::new_unchecked(b"/Foo"), FileType::Regular, 0o644, 0)
			.unwrap();
		assert!(fs.open(Path::new_unchecked(b"/foo"), false).is_err());
		assert!(fs.open(Path::new_unchecked(b"/Foo"), false).is_ok());
	}

	#[test_case]
	fn ext_links() {
		let fs = ExtFs::new(0);
		fs.create_node(Path::new_unchecked(b"/a"), FileType::Regular, 0o644, 0)
			.unwrap();
		fs.create_hard_link(Path::new_unchecked(b"/b"), Path::new_unchecked(b"/a"))
			.unwrap();
		let h = fs.open(Path::new_unchecked(b"/b"), true).unwrap();
		fs.write(h, 0, b"x").unwrap();
		assert_eq!(fs.stat(h).unwrap().hard_link_count, 2);
		fs.close(h);
		// Contents are shared through both links
		let h = fs.open(Path::new_unchecked(b"/a"), false).unwrap();
		let mut buf = [0u8; 1];
		assert_eq!(fs.read(h, 0, &mut buf).unwrap(), 1);
		assert_eq!(buf[0], b'x');
		fs.close(h);
		fs.create_symlink(Path::new_unchecked(b"/l"), b"/a").unwrap();
		assert_eq!(
			fs.read_symbolic_link(Path::new_unchecked(b"/l")).unwrap(),
			b"/a".to_vec()
		);
	}

	#[test_case]
	fn ext_unlink() {
		let fs = ExtFs::new(0);
		fs.create_node(Path::new_unchecked(b"/tmp"), FileType::Directory, 0o755, 0)
			.unwrap();
		fs.create_node(Path::new_unchecked(b"/tmp/f"), FileType::Regular, 0o644, 0)
			.unwrap();
		// A non-empty directory cannot be removed
		assert!(fs.unlink(Path::new_unchecked(b"/tmp")).is_err());
		fs.unlink(Path::new_unchecked(b"/tmp/f")).unwrap();
		assert!(fs.open(Path::new_unchecked(b"/tmp/f"), false).is_err());
		fs.unlink(Path::new_unchecked(b"/tmp")).unwrap();
	}
}
