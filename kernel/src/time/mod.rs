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

//! Time keeping.
//!
//! The hardware timers themselves (LAPIC timer calibration against HPET or
//! PIT) are bootstrap glue. The kernel core only consumes the resulting
//! periodic tick, which drives scheduling and the monotonic clock.

use core::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// The frequency of the scheduler tick, in hertz.
pub const TICK_RATE: u64 = 1000;
/// The period of the scheduler tick, in microseconds.
pub const TICK_PERIOD_US: u64 = 1_000_000 / TICK_RATE;

/// The number of timer ticks since boot, across all cores the bootstrap
/// core's timer.
static TICKS: AtomicU64 = AtomicU64::new(0);
/// The wall clock time at boot, in seconds since the Unix epoch.
static BOOT_TIME: AtomicU64 = AtomicU64::new(0);

/// A point in time, in seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Timestamp {
	/// Seconds since the Unix epoch.
	pub sec: u64,
	/// Nanoseconds within the current second.
	pub nsec: u32,
}

/// Initializes time keeping with the wall clock time at boot.
pub fn init(boot_time: u64) {
	BOOT_TIME.store(boot_time, Relaxed);
}

/// Registers one timer tick. Called from the timer interrupt on the
/// bootstrap core.
pub fn tick() {
	TICKS.fetch_add(1, Relaxed);
}

/// Returns the number of timer ticks since boot.
pub fn ticks() -> u64 {
	TICKS.load(Relaxed)
}

/// Returns the time elapsed since boot, in microseconds.
pub fn uptime_us() -> u64 {
	ticks() * TICK_PERIOD_US
}

/// Returns the current wall clock time.
pub fn now() -> Timestamp {
	let us = uptime_us();
	Timestamp {
		sec: BOOT_TIME.load(Relaxed) + us / 1_000_000,
		nsec: ((us % 1_000_000) * 1000) as u32,
	}
}
