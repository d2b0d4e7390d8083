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

//! Once-initialized global values.

use core::ops::Deref;

/// A value initialized once during boot, then read-only.
///
/// Accessing the value before initialization is an invariant violation and
/// panics.
pub struct OnceInit<T>(spin::Once<T>);

impl<T> OnceInit<T> {
	/// Creates a new, uninitialized instance.
	pub const fn new() -> Self {
		Self(spin::Once::new())
	}

	/// Initializes the value.
	///
	/// If already initialized, the function does nothing.
	pub fn init(&self, val: T) {
		self.0.call_once(|| val);
	}

	/// Tells whether the value has been initialized.
	pub fn is_init(&self) -> bool {
		self.0.is_completed()
	}
}

impl<T> Deref for OnceInit<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		self.0.get().expect("global accessed before initialization")
	}
}
