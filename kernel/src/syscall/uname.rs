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

//! The `uname` system call returns system information.

use crate::{
	errno::EResult,
	memory::user::UserPtr,
	syscall::util,
	HOSTNAME, NAME, VERSION,
};
use macros::AnyRepr;

/// The length of each field of [`UtsName`].
const FIELD_LEN: usize = 65;

/// System information returned by `uname`.
#[repr(C)]
#[derive(AnyRepr, Clone)]
pub struct UtsName {
	/// The kernel's name.
	pub sysname: [u8; FIELD_LEN],
	/// The hostname.
	pub nodename: [u8; FIELD_LEN],
	/// The kernel's release.
	pub release: [u8; FIELD_LEN],
	/// The kernel's version.
	pub version: [u8; FIELD_LEN],
	/// The machine's architecture.
	pub machine: [u8; FIELD_LEN],
}

fn field(src: &[u8]) -> [u8; FIELD_LEN] {
	let mut buf = [0; FIELD_LEN];
	let len = src.len().min(FIELD_LEN - 1);
	buf[..len].copy_from_slice(&src[..len]);
	buf
}

pub fn uname(buf: UserPtr<UtsName>) -> EResult<usize> {
	let proc = util::current_proc()?;
	let uts = UtsName {
		sysname: field(NAME.as_bytes()),
		nodename: field(&HOSTNAME.lock()),
		release: field(VERSION.as_bytes()),
		version: field(VERSION.as_bytes()),
		machine: field(b"x86_64"),
	};
	util::with_space(&proc, |space| buf.copy_to_user(space, &uts))?;
	Ok(0)
}
