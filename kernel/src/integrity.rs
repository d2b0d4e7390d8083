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

//! Kernel integrity policy.
//!
//! The policy sets a floor on free physical memory. When the floor is
//! crossed, the configured action fires: a warning in the kernel log, or a
//! panic for systems that prefer a halt over degraded operation. The check
//! runs from the timer tick.

use crate::{memory::frame, sync::mutex::Mutex};

/// What to do when the policy is violated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntegrityAction {
	/// Log a warning.
	Warn,
	/// Panic.
	Panic,
}

#[derive(Clone, Copy)]
struct Policy {
	/// The minimum number of free physical pages.
	min_free_pages: usize,
	/// The action on violation.
	action: IntegrityAction,
	/// Set after a warning fired, cleared when back over the floor.
	tripped: bool,
}

/// The current policy, if any.
static POLICY: Mutex<Option<Policy>> = Mutex::new(None);

/// Installs the integrity policy. A zero floor removes it.
pub fn setup(min_free_pages: usize, action: IntegrityAction) {
	let mut policy = POLICY.lock();
	*policy = (min_free_pages > 0).then_some(Policy {
		min_free_pages,
		action,
		tripped: false,
	});
}

/// Checks the policy. Called from the timer tick.
pub fn check() {
	let mut policy = POLICY.lock();
	let Some(p) = policy.as_mut() else {
		return;
	};
	let free = frame::stats().free;
	if free >= p.min_free_pages {
		p.tripped = false;
		return;
	}
	match p.action {
		IntegrityAction::Warn => {
			if !p.tripped {
				p.tripped = true;
				log::warn!(
					"integrity: free memory below floor ({free} < {min} pages)",
					min = p.min_free_pages
				);
			}
		}
		IntegrityAction::Panic => {
			panic!("integrity: free memory below floor ({free} pages left)");
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn integrity_setup_clear() {
		setup(1, IntegrityAction::Warn);
		check();
		assert!(POLICY.lock().is_some());
		setup(0, IntegrityAction::Warn);
		assert!(POLICY.lock().is_none());
	}
}
