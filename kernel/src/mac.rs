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

//! Mandatory access control.
//!
//! Every process carries a [`MacContext`]: a set of capability bits gating
//! whole syscall families, plus filters gating individual paths and devices.
//!
//! Once a context is locked, its capability set can only shrink and its
//! enforcement action is frozen.

use crate::{device::DeviceHandle, errno, errno::EResult, file::path::Path, limits};
use arrayvec::ArrayVec;
use bitflags::bitflags;

bitflags! {
	/// Capability bits, each gating a family of system calls.
	#[derive(Clone, Copy, Debug, Eq, PartialEq)]
	pub struct Capabilities: u32 {
		/// Changing scheduling parameters.
		const CHANGE_SCHED = 1 << 0;
		/// Creating new processes.
		const SPAWN = 1 << 1;
		/// Reading from the entropy pool.
		const ENTROPY = 1 << 2;
		/// Changing memory mappings and protections.
		const MODIFY_MEM = 1 << 3;
		/// Using the network.
		const USE_NET = 1 << 4;
		/// Administrating the network.
		const MANAGE_NET = 1 << 5;
		/// Mounting and unmounting filesystems.
		const MANAGE_MOUNTS = 1 << 6;
		/// Power management.
		const MANAGE_POWER = 1 << 7;
		/// Tracing other processes.
		const TRACE = 1 << 8;
	}
}

bitflags! {
	/// Permissions granted by a filter.
	#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
	pub struct FilterPerms: u32 {
		/// Reading is allowed.
		const READ = 1 << 0;
		/// Writing is allowed.
		const WRITE = 1 << 1;
		/// Executing is allowed.
		const EXECUTE = 1 << 2;
		/// Writes may only append.
		const APPEND_ONLY = 1 << 3;
		/// Locking is allowed.
		const LOCK = 1 << 4;
		/// The filter also covers everything under the path.
		const INCLUDES_CONTENTS = 1 << 5;
		/// The granted permissions are inverted: the filter denies them
		/// instead.
		const DENY_INSTEAD = 1 << 6;
	}
}

/// What to do when a check fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnforcementAction {
	/// Return an access error.
	Deny,
	/// Log the denial, then return an access error.
	DenyAndScream,
	/// Kill the offending process.
	Kill,
}

/// The subject of a filter.
#[derive(Clone, Debug)]
pub enum FilterTarget {
	/// A path prefix.
	Path(ArrayVec<u8, { limits::PATH_MAX }>),
	/// A device, matched by handle.
	Device(DeviceHandle),
}

/// A MAC filter.
#[derive(Clone, Debug)]
pub struct Filter {
	/// What the filter applies to.
	pub target: FilterTarget,
	/// The permissions it grants (or denies, with
	/// [`FilterPerms::DENY_INSTEAD`]).
	pub perms: FilterPerms,
}

/// The MAC context of a process.
#[derive(Clone, Debug)]
pub struct MacContext {
	/// The enforcement action on denial.
	action: EnforcementAction,
	/// The capability set.
	caps: Capabilities,
	/// The filter list.
	filters: ArrayVec<Filter, { limits::MAC_FILTER_MAX }>,
	/// Tells whether the context is locked.
	locked: bool,
}

impl Default for MacContext {
	/// The default context: every capability, no filter, silent denial.
	fn default() -> Self {
		Self {
			action: EnforcementAction::Deny,
			caps: Capabilities::all(),
			filters: ArrayVec::new(),
			locked: false,
		}
	}
}

impl MacContext {
	/// Returns the capability set.
	pub fn capabilities(&self) -> Capabilities {
		self.caps
	}

	/// Returns the enforcement action.
	pub fn action(&self) -> EnforcementAction {
		self.action
	}

	/// Tells whether the context is locked.
	pub fn is_locked(&self) -> bool {
		self.locked
	}

	/// Replaces the capability set.
	///
	/// When the context is locked, the new set is intersected with the
	/// current one instead, so capabilities can only be weakened.
	pub fn set_capabilities(&mut self, caps: Capabilities) {
		if self.locked {
			self.caps &= caps;
		} else {
			self.caps = caps;
		}
	}

	/// Tells whether the context holds every capability in `caps`.
	pub fn has_capabilities(&self, caps: Capabilities) -> bool {
		self.caps.contains(caps)
	}

	/// Locks the context: the enforcement action is frozen and capabilities
	/// can only be weakened from now on.
	pub fn lock(&mut self) {
		self.locked = true;
	}

	/// Sets the enforcement action. Fails when the context is locked.
	pub fn set_enforcement(&mut self, action: EnforcementAction) -> EResult<()> {
		if self.locked {
			return Err(errno!(EPERM));
		}
		self.action = action;
		Ok(())
	}

	/// Adds a filter to the context.
	pub fn add_filter(&mut self, filter: Filter) -> EResult<()> {
		if self.filters.is_full() {
			return Err(errno!(ERANGE));
		}
		self.filters.push(filter);
		Ok(())
	}

	/// Returns the effective permissions for `path`.
	///
	/// The longest matching path filter wins. A filter without
	/// [`FilterPerms::INCLUDES_CONTENTS`] only matches the path itself.
	/// With no filter registered at all, everything is permitted; with
	/// filters but no match, everything is denied.
	pub fn check_path_permissions(&self, path: &Path) -> FilterPerms {
		if self.filters.is_empty() {
			return FilterPerms::all() - FilterPerms::DENY_INSTEAD;
		}
		let best = self
			.filters
			.iter()
			.filter_map(|f| match &f.target {
				FilterTarget::Path(prefix) => {
					let prefix = Path::new_unchecked(prefix.as_slice());
					let matches = if f.perms.contains(FilterPerms::INCLUDES_CONTENTS) {
						path.starts_with(prefix)
					} else {
						path == prefix
					};
					matches.then_some((prefix.len(), f.perms))
				}
				FilterTarget::Device(_) => None,
			})
			.max_by_key(|(len, _)| *len);
		match best {
			Some((_, perms)) if perms.contains(FilterPerms::DENY_INSTEAD) => {
				// Invert: what the filter names is denied, the rest granted
				(FilterPerms::all() - perms) - FilterPerms::DENY_INSTEAD
			}
			Some((_, perms)) => perms,
			None => FilterPerms::empty(),
		}
	}

	/// Returns the effective permissions for the device with the given
	/// handle, matched by equality.
	pub fn check_device_permissions(&self, device: DeviceHandle) -> FilterPerms {
		if self.filters.is_empty() {
			return FilterPerms::all() - FilterPerms::DENY_INSTEAD;
		}
		let found = self.filters.iter().find_map(|f| match &f.target {
			FilterTarget::Device(handle) if *handle == device => Some(f.perms),
			_ => None,
		});
		match found {
			Some(perms) if perms.contains(FilterPerms::DENY_INSTEAD) => {
				(FilterPerms::all() - perms) - FilterPerms::DENY_INSTEAD
			}
			Some(perms) => perms,
			None => FilterPerms::empty(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn path_filter(prefix: &[u8], perms: FilterPerms) -> Filter {
		let mut target = ArrayVec::new();
		target.try_extend_from_slice(prefix).unwrap();
		Filter {
			target: FilterTarget::Path(target),
			perms,
		}
	}

	#[test_case]
	fn mac_empty_filters_permit_all() {
		let ctx = MacContext::default();
		let perms = ctx.check_path_permissions(Path::new_unchecked(b"/anything"));
		assert!(perms.contains(FilterPerms::READ | FilterPerms::WRITE | FilterPerms::EXECUTE));
	}

	#[test_case]
	fn mac_longest_prefix_wins() {
		let mut ctx = MacContext::default();
		ctx.add_filter(path_filter(
			b"/usr",
			FilterPerms::READ | FilterPerms::INCLUDES_CONTENTS,
		))
		.unwrap();
		ctx.add_filter(path_filter(
			b"/usr/bin",
			FilterPerms::READ | FilterPerms::EXECUTE | FilterPerms::INCLUDES_CONTENTS,
		))
		.unwrap();
		let perms = ctx.check_path_permissions(Path::new_unchecked(b"/usr/bin/sh"));
		assert!(perms.contains(FilterPerms::EXECUTE));
		let perms = ctx.check_path_permissions(Path::new_unchecked(b"/usr/share/doc"));
		assert!(!perms.contains(FilterPerms::EXECUTE));
		assert!(perms.contains(FilterPerms::READ));
		// No match at all: deny
		let perms = ctx.check_path_permissions(Path::new_unchecked(b"/etc/passwd"));
		assert!(perms.is_empty());
	}

	#[test_case]
	fn mac_deny_instead_inverts() {
		let mut ctx = MacContext::default();
		ctx.add_filter(path_filter(
			b"/secret",
			FilterPerms::READ
				| FilterPerms::WRITE
				| FilterPerms::INCLUDES_CONTENTS
				| FilterPerms::DENY_INSTEAD,
		))
		.unwrap();
		let perms = ctx.check_path_permissions(Path::new_unchecked(b"/secret/key"));
		assert!(!perms.contains(FilterPerms::READ));
		assert!(!perms.contains(FilterPerms::WRITE));
		assert!(perms.contains(FilterPerms::EXECUTE));
	}

	#[test_case]
	fn mac_lock_monotonic() {
		let mut ctx = MacContext::default();
		ctx.set_capabilities(Capabilities::SPAWN | Capabilities::ENTROPY);
		ctx.lock();
		ctx.set_capabilities(
			Capabilities::SPAWN | Capabilities::ENTROPY | Capabilities::MODIFY_MEM,
		);
		assert_eq!(
			ctx.capabilities(),
			Capabilities::SPAWN | Capabilities::ENTROPY
		);
		// The enforcement action is frozen
		assert!(ctx.set_enforcement(EnforcementAction::Kill).is_err());
		// Weakening still works
		ctx.set_capabilities(Capabilities::SPAWN);
		assert_eq!(ctx.capabilities(), Capabilities::SPAWN);
	}

	#[test_case]
	fn mac_device_match() {
		let mut ctx = MacContext::default();
		ctx.add_filter(Filter {
			target: FilterTarget::Device(3),
			perms: FilterPerms::READ,
		})
		.unwrap();
		assert!(ctx
			.check_device_permissions(3)
			.contains(FilterPerms::READ));
		assert!(ctx.check_device_permissions(4).is_empty());
	}
}
