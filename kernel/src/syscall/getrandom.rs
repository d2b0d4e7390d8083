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

//! The `getrandom` system call fills a buffer with entropy.

use crate::{
	errno::EResult,
	mac::Capabilities,
	memory::user::UserSlice,
	process,
	rand,
	syscall::{read::MAX_CHUNK, util},
};
use alloc::vec;

pub fn getrandom(buf: usize, len: usize) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::ENTROPY);
	process::mac_enforce(&proc, allowed, "getrandom")?;
	let len = len.min(MAX_CHUNK);
	let mut kbuf = vec![0u8; len];
	rand::fill(&mut kbuf);
	util::with_space(&proc, |space| {
		UserSlice::from_raw(buf, len).copy_to_user(space, &kbuf)
	})
}
