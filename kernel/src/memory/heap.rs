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

//! The kernel heap.
//!
//! Kernel objects are allocated out of a contiguous run of physical frames
//! reserved at boot, accessed through the direct mapping.

use crate::{memory, memory::frame};
use linked_list_allocator::LockedHeap;

/// The size of the kernel heap, in pages.
const HEAP_PAGES: usize = 4096;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initializes the kernel heap.
///
/// The frame allocator must be initialized beforehand.
pub fn init() {
	let base = frame::alloc(HEAP_PAGES).expect("cannot allocate the kernel heap");
	unsafe {
		ALLOCATOR
			.lock()
			.init(memory::phys_to_virt(base), HEAP_PAGES * memory::PAGE_SIZE);
	}
}
