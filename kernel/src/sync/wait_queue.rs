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

//! Queue of threads waiting on a resource.
//!
//! Blocking I/O does not spin: a thread registers itself on the queue, turns
//! [`Blocked`] and yields. The thread releasing the resource wakes the next
//! waiter.
//!
//! [`Blocked`]: crate::process::scheduler::State::Blocked

use crate::{
	errno::EResult,
	process::scheduler,
	process::scheduler::{State, Tid},
	sync::mutex::IntMutex,
};
use alloc::collections::VecDeque;
use core::fmt;

/// Queue of threads waiting on a resource.
pub struct WaitQueue(IntMutex<VecDeque<Tid>>);

impl Default for WaitQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl WaitQueue {
	/// Creates a new empty queue.
	pub const fn new() -> Self {
		Self(IntMutex::new(VecDeque::new()))
	}

	/// Makes the current thread wait (sleep) until woken up.
	pub fn wait(&self) -> EResult<()> {
		let tid = scheduler::current_tid();
		{
			// Enqueue and block before releasing the lock, so that a waker on
			// another core cannot miss us
			let mut queue = self.0.lock();
			queue.push_back(tid);
			scheduler::set_current_state(State::Blocked);
		}
		scheduler::yield_now();
		// Make sure the thread is dequeued, in case it was woken up by
		// something else than the waker
		let mut queue = self.0.lock();
		if let Some(i) = queue.iter().position(|t| *t == tid) {
			let _ = queue.remove(i);
		}
		Ok(())
	}

	/// Makes the current thread wait until the given closure returns `Some`.
	pub fn wait_until<F: FnMut() -> Option<T>, T>(&self, mut f: F) -> EResult<T> {
		loop {
			if let Some(val) = f() {
				break Ok(val);
			}
			self.wait()?;
		}
	}

	/// Wakes the next thread in queue, if any.
	pub fn wake_next(&self) {
		if let Some(tid) = self.0.lock().pop_front() {
			scheduler::wake(tid);
		}
	}

	/// Wakes all threads in queue.
	pub fn wake_all(&self) {
		let mut queue = self.0.lock();
		while let Some(tid) = queue.pop_front() {
			scheduler::wake(tid);
		}
	}
}

impl fmt::Debug for WaitQueue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("WaitQueue")
	}
}
