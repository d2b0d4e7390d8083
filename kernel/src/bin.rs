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

//! Executable wrapper around the kernel library.
//!
//! The bootstrap glue jumps to [`kernel::kernel_main`] with the boot
//! information once the machine is in a defined state.

#![no_std]
#![no_main]

extern crate kernel;

/// Placeholder entry point, overridden by the bootstrap glue at link time.
///
/// Nothing can be done without the boot information, so the fallback halts.
#[no_mangle]
extern "C" fn _start() -> ! {
	kernel::arch::x86::halt();
}
