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

//! The MAC system calls manage the calling process's mandatory access
//! control context.
//!
//! Once `lock_mac` was called, capabilities can only shrink and the
//! enforcement action is frozen.

use crate::{
	errno,
	errno::EResult,
	limits,
	mac::{Capabilities, EnforcementAction, Filter, FilterPerms, FilterTarget},
	memory::user::UserPtr,
	syscall::util,
};
use arrayvec::ArrayVec;
use macros::AnyRepr;

/// Enforcement code: silent denial.
pub const MAC_DENY: u32 = 0;
/// Enforcement code: denial logged to the kernel log.
pub const MAC_DENY_AND_SCREAM: u32 = 1;
/// Enforcement code: the offending process is killed.
pub const MAC_KILL: u32 = 2;

/// Filter kind: path prefix.
pub const MAC_FILTER_PATH: u32 = 0;
/// Filter kind: device handle.
pub const MAC_FILTER_DEVICE: u32 = 1;

/// A MAC filter, as described by userspace.
#[repr(C)]
#[derive(AnyRepr, Clone)]
pub struct UserMacFilter {
	/// One of the `MAC_FILTER_*` constants.
	pub kind: u32,
	/// The granted permission bits.
	pub perms: u32,
	/// The device handle, for device filters.
	pub device: u32,
	/// The length of `path`, for path filters.
	pub path_len: u32,
	/// The path prefix, for path filters.
	pub path: [u8; limits::PATH_MAX],
}

pub fn get_mac_capabilities() -> EResult<usize> {
	let proc = util::current_proc()?;
	let caps = proc.lock().mac.capabilities();
	Ok(caps.bits() as usize)
}

pub fn set_mac_capabilities(caps: u32) -> EResult<usize> {
	let caps = Capabilities::from_bits(caps).ok_or_else(|| errno!(EINVAL))?;
	let proc = util::current_proc()?;
	proc.lock().mac.set_capabilities(caps);
	Ok(0)
}

pub fn lock_mac() -> EResult<usize> {
	let proc = util::current_proc()?;
	proc.lock().mac.lock();
	Ok(0)
}

pub fn add_mac_filter(filter: UserPtr<UserMacFilter>) -> EResult<usize> {
	let proc = util::current_proc()?;
	let filter = util::with_space(&proc, |space| {
		filter.copy_from_user(space)?.ok_or_else(|| errno!(EFAULT))
	})?;
	let perms = FilterPerms::from_bits(filter.perms).ok_or_else(|| errno!(EINVAL))?;
	let target = match filter.kind {
		MAC_FILTER_PATH => {
			let len = filter.path_len as usize;
			if len > limits::PATH_MAX {
				return Err(errno!(ENAMETOOLONG));
			}
			let mut path = ArrayVec::new();
			path.try_extend_from_slice(&filter.path[..len])
				.map_err(|_| errno!(ENAMETOOLONG))?;
			FilterTarget::Path(path)
		}
		MAC_FILTER_DEVICE => FilterTarget::Device(filter.device),
		_ => return Err(errno!(EINVAL)),
	};
	proc.lock().mac.add_filter(Filter {
		target,
		perms,
	})?;
	Ok(0)
}

pub fn set_mac_enforcement(action: u32) -> EResult<usize> {
	let action = match action {
		MAC_DENY => EnforcementAction::Deny,
		MAC_DENY_AND_SCREAM => EnforcementAction::DenyAndScream,
		MAC_KILL => EnforcementAction::Kill,
		_ => return Err(errno!(EINVAL)),
	};
	let proc = util::current_proc()?;
	proc.lock().mac.set_enforcement(action)?;
	Ok(0)
}
