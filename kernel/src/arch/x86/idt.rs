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

//! Interrupt table plumbing.
//!
//! The stubs in `int.s` save the full register state, hand a [`TrapFrame`]
//! pointer to the handlers below, then restore and `iretq`. Everything else
//! (APIC setup, timer calibration) is the bootstrap code's business.

use crate::arch::x86::TrapFrame;
use spin::Once;
use x86_64::{
	structures::idt::InterruptDescriptorTable,
	PrivilegeLevel, VirtAddr,
};

/// The vector used by the scheduler timer.
pub const TIMER_VECTOR: usize = 0x20;
/// The vector used for system calls.
pub const SYSCALL_VECTOR: usize = 0x80;
/// The vector used for voluntary rescheduling.
pub const YIELD_VECTOR: usize = 0x81;

extern "C" {
	fn isr_timer();
	fn isr_yield();
	fn isr_syscall();
	fn isr_fault();
}

/// The interrupt descriptor table, shared by every core.
static IDT: Once<InterruptDescriptorTable> = Once::new();

/// Builds the table on first call, then loads it on the current core.
pub(super) fn init() {
	let idt = IDT.call_once(|| {
		let mut idt = InterruptDescriptorTable::new();
		unsafe {
			idt[TIMER_VECTOR].set_handler_addr(VirtAddr::new(isr_timer as usize as u64));
			idt[YIELD_VECTOR]
				.set_handler_addr(VirtAddr::new(isr_yield as usize as u64))
				.set_privilege_level(PrivilegeLevel::Ring3);
			idt[SYSCALL_VECTOR]
				.set_handler_addr(VirtAddr::new(isr_syscall as usize as u64))
				.set_privilege_level(PrivilegeLevel::Ring3);
			idt.page_fault
				.set_handler_addr(VirtAddr::new(isr_fault as usize as u64));
			idt.general_protection_fault
				.set_handler_addr(VirtAddr::new(isr_fault as usize as u64));
		}
		idt
	});
	idt.load();
}

#[no_mangle]
extern "C" fn timer_interrupt_handler(frame: *mut TrapFrame) {
	super::end_of_interrupt();
	// The bootstrap core's timer drives the clock and the integrity checks
	if super::core_id() == 0 {
		crate::time::tick();
		crate::integrity::check();
	}
	crate::process::scheduler::tick(unsafe { &mut *frame });
}

#[no_mangle]
extern "C" fn yield_interrupt_handler(frame: *mut TrapFrame) {
	crate::process::scheduler::tick(unsafe { &mut *frame });
}

#[no_mangle]
extern "C" fn syscall_interrupt_handler(frame: *mut TrapFrame) {
	crate::syscall::handler(unsafe { &mut *frame });
}

#[no_mangle]
extern "C" fn fault_interrupt_handler(frame: *mut TrapFrame) {
	crate::process::fault_handler(unsafe { &mut *frame });
}
