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

//! x86_64-specific code.

pub mod idt;

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed};
use x86_64::instructions::{hlt, interrupts, port::Port};

/// The maximum number of hardware cores supported by the kernel.
pub const MAX_CORES: usize = 8;

/// The kernel code segment selector.
pub const KERNEL_CS: u16 = 0x08;
/// The kernel data segment selector.
pub const KERNEL_SS: u16 = 0x10;
/// The user data segment selector.
pub const USER_SS: u16 = 0x1b;
/// The user code segment selector.
pub const USER_CS: u16 = 0x23;
/// RFLAGS with only the interrupt flag set.
pub const RFLAGS_IF: u64 = 0x202;

/// The kernel stack tops of each core, consumed by the TSS glue when a core
/// takes an interrupt from userspace.
pub static KERNEL_STACK_TOPS: [AtomicU64; MAX_CORES] = {
	#[allow(clippy::declare_interior_mutable_const)]
	const TOP: AtomicU64 = AtomicU64::new(0);
	[TOP; MAX_CORES]
};

/// Publishes the kernel stack top of the current core for ring transitions.
#[inline]
pub fn set_kernel_stack(top: u64) {
	KERNEL_STACK_TOPS[core_id()].store(top, Relaxed);
}

/// The number of cores that went through [`init_core`].
static ONLINE_CORES: AtomicUsize = AtomicUsize::new(0);

#[cfg(target_arch = "x86_64")]
core::arch::global_asm!(include_str!("int.s"));

/// Disables maskable interrupts on the current core.
#[inline]
pub fn cli() {
	interrupts::disable();
}

/// Enables maskable interrupts on the current core.
#[inline]
pub fn sti() {
	interrupts::enable();
}

/// Tells whether maskable interrupts are enabled on the current core.
#[inline]
pub fn is_interrupt_enabled() -> bool {
	interrupts::are_enabled()
}

/// Halts the current core until the next interrupt, with interrupts enabled.
#[inline]
pub fn idle() {
	interrupts::enable_and_hlt();
}

/// Halts the current core forever.
pub fn halt() -> ! {
	loop {
		cli();
		hlt();
	}
}

/// Returns the identifier of the current core, in `0..MAX_CORES`.
#[inline]
pub fn core_id() -> usize {
	// The BSP has ID `0`. APs write their ID in `IA32_TSC_AUX` during early
	// init, which `rdpid`-less cores can also read back with `rdtscp`
	let id: u64;
	unsafe {
		core::arch::asm!(
			"rdtscp",
			out("rcx") id,
			out("rax") _,
			out("rdx") _,
			options(nomem, nostack)
		);
	}
	(id as usize) % MAX_CORES
}

/// Returns the number of cores currently online.
#[inline]
pub fn core_count() -> usize {
	ONLINE_CORES.load(Relaxed).max(1)
}

/// Per-core initialization: assigns the core its ID and loads the interrupt
/// table.
///
/// This function must be called exactly once on every core, the bootstrap
/// core first.
pub fn init_core() {
	let id = ONLINE_CORES.fetch_add(1, Relaxed) as u64;
	unsafe {
		x86_64::registers::model_specific::Msr::new(0xc0000103).write(id);
	}
	idt::init();
}

/// Acknowledges the current interrupt to the interrupt controller.
#[inline]
pub fn end_of_interrupt() {
	unsafe {
		Port::<u8>::new(0x20).write(0x20);
	}
}

/// Triggers a reschedule of the current core by raising the yield interrupt.
///
/// The current thread's context is saved by the interrupt path, making this
/// function a valid suspension point from kernel code.
#[inline]
pub fn trigger_reschedule() {
	unsafe {
		core::arch::asm!("int 0x81");
	}
}

/// Saved general-purpose registers of an interrupted thread.
///
/// The layout matches the order in which the interrupt stubs in `int.s` push
/// registers, followed by the frame pushed by the CPU itself.
#[repr(C)]
#[derive(Clone, Debug, Default)]
pub struct TrapFrame {
	/// Saved `r15` register.
	pub r15: u64,
	/// Saved `r14` register.
	pub r14: u64,
	/// Saved `r13` register.
	pub r13: u64,
	/// Saved `r12` register.
	pub r12: u64,
	/// Saved `r11` register.
	pub r11: u64,
	/// Saved `r10` register.
	pub r10: u64,
	/// Saved `r9` register.
	pub r9: u64,
	/// Saved `r8` register.
	pub r8: u64,
	/// Saved `rbp` register.
	pub rbp: u64,
	/// Saved `rdi` register.
	pub rdi: u64,
	/// Saved `rsi` register.
	pub rsi: u64,
	/// Saved `rdx` register.
	pub rdx: u64,
	/// Saved `rcx` register.
	pub rcx: u64,
	/// Saved `rbx` register.
	pub rbx: u64,
	/// Saved `rax` register.
	pub rax: u64,
	/// Pushed by the CPU on interrupt entry.
	pub rip: u64,
	/// Pushed by the CPU on interrupt entry.
	pub cs: u64,
	/// Pushed by the CPU on interrupt entry.
	pub rflags: u64,
	/// Pushed by the CPU on interrupt entry.
	pub rsp: u64,
	/// Pushed by the CPU on interrupt entry.
	pub ss: u64,
}

impl TrapFrame {
	/// Tells whether the frame was captured while running in userspace.
	pub fn is_userspace(&self) -> bool {
		self.cs & 0b11 == 0b11
	}

	/// Returns the system call number.
	#[inline]
	pub fn syscall_id(&self) -> usize {
		self.rax as usize
	}

	/// Returns the `n`th system call argument, `n` in `0..6`.
	#[inline]
	pub fn syscall_arg(&self, n: u8) -> usize {
		match n {
			0 => self.rdi as usize,
			1 => self.rsi as usize,
			2 => self.rdx as usize,
			3 => self.rcx as usize,
			4 => self.r8 as usize,
			5 => self.r9 as usize,
			_ => 0,
		}
	}

	/// Writes the system call return value and error code.
	#[inline]
	pub fn set_syscall_return(&mut self, result: u64, errno: u32) {
		self.rax = result;
		self.rdx = errno as u64;
	}
}

/// Saved FPU/SSE state of a thread, in `fxsave` format.
#[repr(C, align(16))]
#[derive(Clone)]
pub struct FpState(pub [u8; 512]);

impl Default for FpState {
	fn default() -> Self {
		Self([0; 512])
	}
}

impl FpState {
	/// Stores the current FPU state into `self`.
	pub fn save(&mut self) {
		unsafe {
			core::arch::asm!("fxsave64 [{}]", in(reg) self.0.as_mut_ptr());
		}
	}

	/// Restores the FPU state from `self`.
	pub fn restore(&self) {
		unsafe {
			core::arch::asm!("fxrstor64 [{}]", in(reg) self.0.as_ptr());
		}
	}
}
