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

//! The `integrity_setup` system call installs the kernel integrity policy.

use crate::{
	errno,
	errno::EResult,
	integrity,
	integrity::IntegrityAction,
	mac::Capabilities,
	process,
	syscall::util,
};

/// Integrity action code: warn in the kernel log.
pub const INTEGRITY_WARN: u32 = 0;
/// Integrity action code: panic.
pub const INTEGRITY_PANIC: u32 = 1;

pub fn integrity_setup(min_free_pages: usize, action: u32) -> EResult<usize> {
	let proc = util::current_proc()?;
	let allowed = proc.lock().mac.has_capabilities(Capabilities::MANAGE_POWER);
	process::mac_enforce(&proc, allowed, "integrity_setup")?;
	let action = match action {
		INTEGRITY_WARN => IntegrityAction::Warn,
		INTEGRITY_PANIC => IntegrityAction::Panic,
		_ => return Err(errno!(EINVAL)),
	};
	integrity::setup(min_free_pages, action);
	Ok(0)
}
