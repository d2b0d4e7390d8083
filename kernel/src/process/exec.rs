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

//! Program execution.
//!
//! Execution is two-phase. [`load`] builds a complete [`ProgramImage`] (a
//! fresh address space with the program and its initial stack) without
//! touching the calling process, so any failure up to that point leaves the
//! caller intact. Installing the image is the point of no return: a failure
//! after it aborts the process rather than leave it half-mapped.

use crate::{
	errno,
	errno::EResult,
	file::{path::Path, vfs, O_RDONLY},
	memory,
	memory::{
		vmm::{AddressSpace, MappingFlags},
		PAGE_SIZE,
	},
	process,
	process::{
		pid::Pid,
		scheduler,
		scheduler::switch,
		Process,
	},
	sync::mutex::{IntMutex, Mutex},
};
use alloc::{sync::Arc, vec::Vec};
use xmas_elf::{header, program, ElfFile};

/// The size of a process's initial stack, in pages.
const STACK_PAGES: usize = 32;
/// The offset of the stack region from the process's allocation base.
const STACK_OFFSET: u64 = 0x1000_0000;

/// A program loaded in a fresh address space, ready to run.
pub struct ProgramImage {
	/// The address space holding the program.
	pub space: AddressSpace,
	/// The initial register state.
	pub frame: crate::arch::x86::TrapFrame,
}

/// Reads the whole file at `path`.
fn read_binary(path: &Path) -> EResult<Vec<u8>> {
	let file = vfs::open(path, O_RDONLY)?;
	let size = file.stat()?.byte_size as usize;
	let mut buf = alloc::vec![0u8; size];
	let mut off = 0;
	while off < size {
		let n = file.read(&mut buf[off..])?;
		if n == 0 {
			break;
		}
		off += n;
	}
	buf.truncate(off);
	Ok(buf)
}

/// Maps a loadable segment into `space` and copies its contents.
fn load_segment(space: &mut AddressSpace, data: &[u8], ph: program::ProgramHeader) -> EResult<()> {
	let vaddr = ph.virtual_addr();
	let mem_size = ph.mem_size() as usize;
	let file_size = ph.file_size() as usize;
	let off = ph.offset() as usize;
	if mem_size == 0 {
		return Ok(());
	}
	let start = vaddr & !(PAGE_SIZE as u64 - 1);
	let pages = memory::pages_for((vaddr - start) as usize + mem_size);
	let mut flags = MappingFlags::USER;
	if !ph.flags().is_write() {
		flags |= MappingFlags::READ_ONLY;
	}
	if ph.flags().is_execute() {
		flags |= MappingFlags::EXEC;
	}
	space.map_alloc(start, pages, flags)?;
	// The backing frames are contiguous: copy through the direct mapping
	let phys = space.virtual_to_physical(vaddr);
	let src = data
		.get(off..(off + file_size))
		.ok_or_else(|| errno!(EINVAL))?;
	unsafe {
		core::ptr::copy_nonoverlapping(src.as_ptr(), memory::phys_to_virt(phys), file_size);
	}
	Ok(())
}

/// Builds the initial stack: argument and environment strings, the pointer
/// arrays and `argc`, per the System V ABI.
///
/// Returns the initial stack pointer.
fn build_stack(
	space: &mut AddressSpace,
	base: u64,
	argv: &[Vec<u8>],
	envp: &[Vec<u8>],
) -> EResult<u64> {
	space.map_alloc(base, STACK_PAGES, MappingFlags::USER)?;
	let len = STACK_PAGES * PAGE_SIZE;
	let phys = space.virtual_to_physical(base);
	let stack = unsafe { core::slice::from_raw_parts_mut(memory::phys_to_virt(phys), len) };
	// Copy the strings, remembering the userspace address of each
	let mut top = len;
	let mut ptrs = Vec::with_capacity(argv.len() + envp.len());
	for s in argv.iter().chain(envp.iter()) {
		top = top
			.checked_sub(s.len() + 1)
			.ok_or_else(|| errno!(ERANGE))?;
		stack[top..(top + s.len())].copy_from_slice(s);
		stack[top + s.len()] = 0;
		ptrs.push(base + top as u64);
	}
	// Pointer arrays, from the top down: envp (null-terminated), argv
	// (null-terminated), then argc; keep the final pointer 16-byte aligned
	let words = argv.len() + envp.len() + 3;
	let mut cursor = (top / 8)
		.checked_sub(words)
		.ok_or_else(|| errno!(ERANGE))?
		& !1;
	let rsp = base + (cursor * 8) as u64;
	let write_word = |stack: &mut [u8], cursor: &mut usize, val: u64| {
		stack[*cursor * 8..(*cursor * 8 + 8)].copy_from_slice(&val.to_ne_bytes());
		*cursor += 1;
	};
	write_word(stack, &mut cursor, argv.len() as u64);
	for ptr in &ptrs[..argv.len()] {
		write_word(stack, &mut cursor, *ptr);
	}
	write_word(stack, &mut cursor, 0);
	for ptr in &ptrs[argv.len()..] {
		write_word(stack, &mut cursor, *ptr);
	}
	write_word(stack, &mut cursor, 0);
	Ok(rsp)
}

/// Loads the program at `path` into a fresh address space.
///
/// `alloc_base` is the (randomised) base address for the stack region.
pub fn load(
	path: &Path,
	argv: &[Vec<u8>],
	envp: &[Vec<u8>],
	alloc_base: u64,
) -> EResult<ProgramImage> {
	let data = read_binary(path)?;
	let elf = ElfFile::new(&data).map_err(|_| errno!(EINVAL))?;
	if elf.header.pt2.type_().as_type() != header::Type::Executable {
		return Err(errno!(ENOTSUP));
	}
	let mut space = AddressSpace::new()?;
	for ph in elf.program_iter() {
		if ph.get_type() == Ok(program::Type::Load) {
			load_segment(&mut space, &data, ph)?;
		}
	}
	let stack_base = alloc_base + STACK_OFFSET;
	let rsp = build_stack(&mut space, stack_base, argv, envp)?;
	let frame = switch::user_frame(elf.header.pt2.entry_point(), rsp);
	Ok(ProgramImage {
		space,
		frame,
	})
}

/// Replaces the current program of the process with the given image.
///
/// Every thread of the process and every close-on-exec descriptor is
/// flushed, then a fresh thread starts the new program. The calling thread
/// is among the flushed ones: the system call dispatcher notices it turned
/// zombie and never returns to the old program.
///
/// A failure in here aborts the process: the old program cannot be resumed
/// anymore.
pub fn exec(proc_arc: &Arc<IntMutex<Process>>, image: ProgramImage) -> EResult<()> {
	let table = image.space.table_addr();
	let pid;
	{
		let mut proc = proc_arc.lock();
		pid = proc.get_pid();
		proc.flush_threads();
		proc.flush_exec_files();
		proc.tls = 0;
		// The old space may still be bound to this core: leave it before it
		// is dropped
		crate::memory::vmm::bind_kernel();
		proc.space = Some(Arc::new(Mutex::new(image.space)));
	}
	match scheduler::create_user_thread(image.frame, table, 0, pid) {
		Ok(tid) => {
			proc_arc.lock().add_thread(tid);
			Ok(())
		}
		Err(e) => {
			// Do not leave a thread-less, half-replaced process around
			process::do_exit(proc_arc, 127);
			Err(e)
		}
	}
}

/// Creates a new process running the program at `path`.
///
/// The child inherits the parent's CWD, MAC context and non-close-on-exec
/// file descriptors. Returns the child's PID.
pub fn spawn(
	parent_arc: &Arc<IntMutex<Process>>,
	path: &Path,
	argv: &[Vec<u8>],
	envp: &[Vec<u8>],
) -> EResult<Pid> {
	let proc = process::create_process(Some(parent_arc))?;
	let pid = proc.lock().get_pid();
	let res = (|| {
		// Lock order: parent before child
		let fds = parent_arc.lock().fds.duplicate();
		let alloc_base = {
			let mut proc = proc.lock();
			proc.fds = fds;
			proc.fds.flush_exec_files();
			proc.alloc_base
		};
		let image = load(path, argv, envp, alloc_base)?;
		let table = image.space.table_addr();
		proc.lock().space = Some(Arc::new(Mutex::new(image.space)));
		let tid = scheduler::create_user_thread(image.frame, table, 0, pid)?;
		proc.lock().add_thread(tid);
		Ok(pid)
	})();
	if res.is_err() {
		parent_arc.lock().children.retain(|c| *c != pid);
		process::delete_process(pid);
	}
	res
}
