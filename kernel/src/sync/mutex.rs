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

//! Mutual exclusion primitives.
//!
//! [`Mutex`] is a plain spinlock. [`IntMutex`] additionally masks interrupts
//! on the current core while held, which is required for any structure also
//! touched from interrupt context (scheduler queues, wait queues).

use crate::arch::x86;
use core::{
	fmt,
	mem::ManuallyDrop,
	ops::{Deref, DerefMut},
};

/// A spinning mutual exclusion primitive.
pub struct Mutex<T: ?Sized>(spin::Mutex<T>);

impl<T> Mutex<T> {
	/// Creates a new instance wrapping the given `data`.
	pub const fn new(data: T) -> Self {
		Self(spin::Mutex::new(data))
	}

	/// Consumes the mutex and returns the inner value.
	pub fn into_inner(self) -> T {
		self.0.into_inner()
	}
}

impl<T: ?Sized> Mutex<T> {
	/// Acquires the mutex, spinning until it becomes available.
	pub fn lock(&self) -> spin::MutexGuard<'_, T> {
		self.0.lock()
	}
}

impl<T: Default> Default for Mutex<T> {
	fn default() -> Self {
		Self::new(Default::default())
	}
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.lock(), f)
	}
}

/// A spinning mutex masking interrupts while held.
///
/// The interrupt flag is restored to its previous state when the guard is
/// dropped.
pub struct IntMutex<T: ?Sized>(spin::Mutex<T>);

impl<T> IntMutex<T> {
	/// Creates a new instance wrapping the given `data`.
	pub const fn new(data: T) -> Self {
		Self(spin::Mutex::new(data))
	}
}

impl<T: ?Sized> IntMutex<T> {
	/// Acquires the mutex with interrupts masked.
	pub fn lock(&self) -> IntMutexGuard<'_, T> {
		let enable = x86::is_interrupt_enabled();
		x86::cli();
		IntMutexGuard {
			guard: ManuallyDrop::new(self.0.lock()),
			enable,
		}
	}
}

impl<T: Default> Default for IntMutex<T> {
	fn default() -> Self {
		Self::new(Default::default())
	}
}

/// Unlocks the associated [`IntMutex`] and restores the interrupt flag when
/// dropped.
pub struct IntMutexGuard<'m, T: ?Sized> {
	guard: ManuallyDrop<spin::MutexGuard<'m, T>>,
	enable: bool,
}

impl<T: ?Sized> Deref for IntMutexGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		&self.guard
	}
}

impl<T: ?Sized> DerefMut for IntMutexGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.guard
	}
}

impl<T: ?Sized> Drop for IntMutexGuard<'_, T> {
	fn drop(&mut self) {
		// Release the lock before re-enabling interrupts
		unsafe {
			ManuallyDrop::drop(&mut self.guard);
		}
		if self.enable {
			x86::sti();
		}
	}
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for IntMutex<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&*self.lock(), f)
	}
}
