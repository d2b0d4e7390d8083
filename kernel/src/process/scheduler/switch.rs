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

//! Context installation.
//!
//! The actual register save/restore happens in the interrupt path: the
//! functions here handle what is not part of the [`TrapFrame`]: the address
//! space, the FPU state, the TLS pointer and the kernel stack used on ring
//! transitions.

use crate::{
	arch::x86,
	arch::x86::TrapFrame,
	memory,
	memory::vmm,
	process::scheduler,
	process::scheduler::Thread,
};
use x86_64::registers::model_specific::Msr;

/// The `IA32_FS_BASE` MSR, backing the TLS pointer.
const IA32_FS_BASE: u32 = 0xc000_0100;

/// Installs everything but the register state of `th` on the current core.
pub(super) fn install(th: &Thread) {
	if th.table != 0 {
		vmm::bind_table(th.table);
	} else {
		vmm::bind_kernel();
	}
	th.fp.restore();
	load_tls(th.tls);
	if th.kernel_stack != 0 {
		let top = memory::phys_to_virt(th.kernel_stack) as u64
			+ (super::KERNEL_STACK_PAGES * memory::PAGE_SIZE) as u64;
		x86::set_kernel_stack(top);
	}
}

/// Re-installs the kernel's own context, used when a core goes idle.
pub(super) fn install_kernel() {
	vmm::bind_kernel();
}

/// Writes the TLS pointer of the current core.
pub(super) fn load_tls(tls: u64) {
	unsafe {
		Msr::new(IA32_FS_BASE).write(tls);
	}
}

/// First function executed by a kernel thread.
///
/// `entry` is the thread's entry point, smuggled through the first argument
/// register by [`kernel_frame`].
extern "C" fn kthread_trampoline(entry: usize, arg: usize) -> ! {
	let entry: fn(usize) = unsafe { core::mem::transmute(entry) };
	entry(arg);
	scheduler::bail();
}

/// Builds the initial register state of a kernel thread.
///
/// The thread starts in [`kthread_trampoline`] on its own stack, with
/// interrupts enabled.
pub(super) fn kernel_frame(
	entry: fn(usize),
	arg: usize,
	stack_phys: u64,
	stack_pages: usize,
) -> TrapFrame {
	let top = memory::phys_to_virt(stack_phys) as u64
		+ (stack_pages * memory::PAGE_SIZE) as u64;
	TrapFrame {
		rdi: entry as usize as u64,
		rsi: arg as u64,
		rip: kthread_trampoline as usize as u64,
		cs: x86::KERNEL_CS as u64,
		// Keep the ABI-required stack alignment at function entry
		rsp: top - 8,
		ss: x86::KERNEL_SS as u64,
		rflags: x86::RFLAGS_IF,
		..Default::default()
	}
}

/// Builds the initial register state of a user thread.
pub fn user_frame(entry: u64, stack: u64) -> TrapFrame {
	TrapFrame {
		rip: entry,
		cs: x86::USER_CS as u64,
		rsp: stack,
		ss: x86::USER_SS as u64,
		rflags: x86::RFLAGS_IF,
		..Default::default()
	}
}
