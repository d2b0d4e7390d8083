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

//! The FAT-style filesystem driver.
//!
//! Case-insensitive (case-preserving) names, no permission bits, no links of
//! either kind.

use crate::file::fs::nodes::{FsPolicy, MemFs};

/// Policy of the FAT-style filesystem.
pub struct FatPolicy;

impl FsPolicy for FatPolicy {
	const CASE_INSENSITIVE: bool = true;
	const SUPPORTS_LINKS: bool = false;
	const FORCE_MODE: Option<u16> = Some(0o777);
	const BLOCK_SIZE: u32 = 512;
}

/// The FAT-style filesystem.
pub type FatFs = MemFs<FatPolicy>;

#[cfg(test)]
mod test {
	use super::*;
	use crate::file::{
		fs::{FileType, FilesystemOps},
		path::Path,
	};

	#[test_case]
	fn fat_case_insensitive() {
		let fs = FatFs::new(0);
		fs.create_node(Path::new_unchecked(b"/ReadMe.TXT"), FileType::Regular, 0o644, 0)
			.unwrap();
		let h = fs.open(Path::new_unchecked(b"/readme.txt"), false).unwrap();
		// The mode given at creation is ignored
		assert_eq!(fs.stat(h).unwrap().mode, 0o777);
		fs.close(h);
		// Two names differing only by case collide
		assert!(fs
			.create_node(Path::new_unchecked(b"/README.txt"), FileType::Regular, 0o644, 0)
			.is_err());
	}

	#[test_case]
	fn fat_no_links() {
		let fs = FatFs::new(0);
		fs.create_node(Path::new_unchecked(b"/a"), FileType::Regular, 0o644, 0)
			.unwrap();
		assert!(fs.create_symlink(Path::new_unchecked(b"/l"), b"/a").is_err());
		assert!(fs
			.create_hard_link(Path::new_unchecked(b"/b"), Path::new_unchecked(b"/a"))
			.is_err());
	}
}
