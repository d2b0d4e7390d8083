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

//! Processes.
//!
//! A process owns an address space, a file descriptor table, a current
//! working directory and a MAC context. Its threads are scheduled
//! independently. Parent/child links are stored as PIDs in both directions
//! and validated through the process table at use, so no reference cycle can
//! form.
//!
//! An exited process stays in the table as a zombie until its parent reaps
//! it with `wait`.

pub mod exec;
pub mod pid;
pub mod scheduler;

use crate::{
	arch::x86::TrapFrame,
	errno,
	errno::EResult,
	file::{fd::FileDescriptorTable, path::PathBuf, Description},
	limits,
	mac::{EnforcementAction, MacContext},
	memory::vmm::AddressSpace,
	process::{
		pid::{Pid, PidHandle},
		scheduler::Tid,
	},
	rand,
	sync::{mutex::IntMutex, mutex::Mutex, wait_queue::WaitQueue},
};
use alloc::{sync::Arc, vec::Vec};
use arrayvec::ArrayVec;
use hashbrown::HashMap;

/// `wait` option: do not block when no child has exited yet.
pub const WNOHANG: u32 = 1;
/// Bit set in an exit word to tell the child exited normally.
pub const WEXITED: usize = 1;

/// The exit code of a process killed by the MAC layer.
pub const MAC_KILL_CODE: u8 = 42;

/// The lowest address the ASLR base can take.
const ASLR_BASE: u64 = 0x4000_0000;
/// The mask of random bits mixed into the ASLR base.
const ASLR_MASK: u64 = 0x1f_ffff_f000;

/// Encodes an exit code into the word returned by `wait`.
pub fn encode_exit_word(code: u8) -> usize {
	((code as usize) << 8) | WEXITED
}

/// A process.
pub struct Process {
	/// The process's ID.
	pid: PidHandle,
	/// The parent's PID. `0` for none.
	pub parent: Pid,

	/// The process's address space. Dropped when the process is reaped.
	pub space: Option<Arc<Mutex<AddressSpace>>>,
	/// The file descriptor table.
	pub fds: FileDescriptorTable,
	/// The PIDs of the children processes.
	pub children: ArrayVec<Pid, { limits::CHILD_MAX }>,
	/// The current working directory, absolute and in compound form.
	pub cwd: PathBuf,
	/// The TIDs of the process's threads.
	pub threads: Vec<Tid>,

	/// The thread-local storage pointer.
	pub tls: u64,
	/// The base address for memory mappings, re-randomised on `exec`.
	pub alloc_base: u64,

	/// The exit code, valid once `did_exit` is set.
	pub exit_code: u8,
	/// Tells whether the process has exited (zombie until reaped).
	pub did_exit: bool,
	/// Orders zombies by time of death, so `wait(-1)` reaps the child that
	/// exited first.
	exit_seq: u64,

	/// The MAC context.
	pub mac: MacContext,

	/// The PID of the tracing process. `0` for none.
	pub tracer_pid: Pid,
	/// The file descriptor the tracer reads events from.
	pub tracer_fd: u32,
}

/// The process table.
static PROCESSES: Mutex<Option<HashMap<Pid, Arc<IntMutex<Process>>>>> = Mutex::new(None);

/// Wait queue woken whenever a process exits.
static EXIT_QUEUE: WaitQueue = WaitQueue::new();

/// Source of [`Process::exit_seq`] values.
static EXIT_SEQ: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(1);

/// Initializes process management.
pub fn init() {
	*PROCESSES.lock() = Some(HashMap::new());
}

impl Process {
	/// Returns the process's ID.
	pub fn get_pid(&self) -> Pid {
		self.pid.get()
	}

	/// Re-randomises the base address for memory mappings.
	pub fn reroll_aslr(&mut self) {
		self.alloc_base = ASLR_BASE + (rand::next_u64() & ASLR_MASK);
	}

	/// Registers a thread as belonging to the process.
	pub fn add_thread(&mut self, tid: Tid) {
		self.threads.push(tid);
	}

	/// Unregisters a thread.
	pub fn remove_thread(&mut self, tid: Tid) {
		self.threads.retain(|t| *t != tid);
	}

	/// Terminates every thread of the process.
	pub fn flush_threads(&mut self) {
		for tid in self.threads.drain(..) {
			let _ = scheduler::delete_thread(tid);
		}
	}

	/// Closes every open file descriptor.
	pub fn flush_files(&mut self) {
		self.fds.flush_files();
	}

	/// Closes every file descriptor with the close-on-exec flag.
	pub fn flush_exec_files(&mut self) {
		self.fds.flush_exec_files();
	}

	/// Creates a file descriptor pointing to `desc`, returning its ID.
	pub fn add_file(&mut self, flags: u32, desc: Description) -> EResult<u32> {
		self.fds.add_file(flags, desc)
	}

	/// Closes the file descriptor `id`.
	pub fn remove_file(&mut self, id: u32) -> EResult<()> {
		self.fds.remove_file(id)
	}

	/// Returns the description behind the file descriptor `id`.
	pub fn get_file(&self, id: u32) -> EResult<Description> {
		Ok(self.fds.get_file(id)?.get().clone())
	}

	/// Makes the file descriptor `id` point to `desc`.
	pub fn replace_file(&mut self, id: u32, flags: u32, desc: Description) -> EResult<()> {
		self.fds.replace_file(id, flags, desc)
	}

	/// Tells whether `id` names an open file descriptor.
	pub fn is_valid_file(&self, id: u32) -> bool {
		self.fds.is_valid_file(id)
	}

	/// Tells whether the process with the given PID is a child of this
	/// process.
	pub fn is_child(&self, pid: Pid) -> bool {
		self.children.contains(&pid)
	}
}

fn table_insert(pid: Pid, proc: Arc<IntMutex<Process>>) -> EResult<()> {
	let mut table = PROCESSES.lock();
	let table = table.as_mut().ok_or_else(|| errno!(EAGAIN))?;
	if table.len() >= limits::PROCESS_MAX {
		return Err(errno!(EAGAIN));
	}
	table.insert(pid, proc);
	Ok(())
}

/// Creates a new process.
///
/// The new process gets a fresh address space, an empty file descriptor
/// table, and inherits the CWD and MAC context of `parent` when given.
pub fn create_process(
	parent: Option<&Arc<IntMutex<Process>>>,
) -> EResult<Arc<IntMutex<Process>>> {
	let pid = PidHandle::unique()?;
	let raw_pid = pid.get();
	let space = AddressSpace::new()?;
	let (parent_pid, cwd, mac) = match parent {
		Some(parent) => {
			let mut parent = parent.lock();
			if parent.children.is_full() {
				return Err(errno!(EAGAIN));
			}
			parent.children.push(raw_pid);
			(parent.get_pid(), parent.cwd.clone(), parent.mac.clone())
		}
		None => (0, PathBuf::root(), MacContext::default()),
	};
	let mut proc = Process {
		pid,
		parent: parent_pid,
		space: Some(Arc::new(Mutex::new(space))),
		fds: FileDescriptorTable::default(),
		children: ArrayVec::new(),
		cwd,
		threads: Vec::new(),
		tls: 0,
		alloc_base: 0,
		exit_code: 0,
		did_exit: false,
		exit_seq: 0,
		mac,
		tracer_pid: 0,
		tracer_fd: 0,
	};
	proc.reroll_aslr();
	let proc = Arc::new(IntMutex::new(proc));
	if let Err(e) = table_insert(raw_pid, proc.clone()) {
		if let Some(parent) = parent {
			parent.lock().children.retain(|c| *c != raw_pid);
		}
		return Err(e);
	}
	Ok(proc)
}

/// Removes the process from the table, dropping it once the last reference
/// is gone.
pub fn delete_process(pid: Pid) {
	let mut table = PROCESSES.lock();
	if let Some(table) = table.as_mut() {
		table.remove(&pid);
	}
}

/// Returns the process with the given PID.
pub fn get_by_pid(pid: Pid) -> Option<Arc<IntMutex<Process>>> {
	PROCESSES.lock().as_ref()?.get(&pid).cloned()
}

/// Returns the process owning the thread with the given TID.
pub fn get_by_thread(tid: Tid) -> Option<Arc<IntMutex<Process>>> {
	let threads = scheduler::threads_of(0);
	// Kernel threads have no process
	if threads.contains(&tid) {
		return None;
	}
	let table = PROCESSES.lock();
	table
		.as_ref()?
		.values()
		.find(|proc| proc.lock().threads.contains(&tid))
		.cloned()
}

/// Returns the process running on the current core, if any.
pub fn current() -> Option<Arc<IntMutex<Process>>> {
	get_by_pid(scheduler::current_pid()?)
}

/// Forks the process `parent`.
///
/// The child gets a deep copy of the address space, a clone of the file
/// descriptor table sharing the open descriptions, the same CWD and the MAC
/// context with its lock state. Its single thread resumes from `frame` with
/// a zero return value.
///
/// Returns the child's PID.
pub fn fork(parent_arc: &Arc<IntMutex<Process>>, frame: &TrapFrame) -> EResult<Pid> {
	let pid = PidHandle::unique()?;
	let raw_pid = pid.get();
	let child = {
		let mut parent = parent_arc.lock();
		if parent.children.is_full() {
			return Err(errno!(EAGAIN));
		}
		let space = parent
			.space
			.as_ref()
			.ok_or_else(|| errno!(EAGAIN))?
			.lock()
			.fork()?;
		let child = Process {
			pid,
			parent: parent.get_pid(),
			space: Some(Arc::new(Mutex::new(space))),
			fds: parent.fds.duplicate(),
			children: ArrayVec::new(),
			cwd: parent.cwd.clone(),
			threads: Vec::new(),
			tls: parent.tls,
			alloc_base: parent.alloc_base,
			exit_code: 0,
			did_exit: false,
			exit_seq: 0,
			mac: parent.mac.clone(),
			tracer_pid: parent.tracer_pid,
			tracer_fd: parent.tracer_fd,
		};
		parent.children.push(raw_pid);
		child
	};
	let table = child.space.as_ref().unwrap().lock().table_addr();
	let tls = child.tls;
	let proc = Arc::new(IntMutex::new(child));
	// The child returns zero from the fork
	let mut child_frame = frame.clone();
	child_frame.set_syscall_return(0, 0);
	let res = table_insert(raw_pid, proc.clone())
		.and_then(|_| scheduler::create_user_thread(child_frame, table, tls, raw_pid));
	match res {
		Ok(tid) => {
			proc.lock().add_thread(tid);
			Ok(raw_pid)
		}
		Err(e) => {
			delete_process(raw_pid);
			parent_arc.lock().children.retain(|c| *c != raw_pid);
			Err(e)
		}
	}
}

/// Terminates the process: every thread and open file is flushed, the exit
/// code recorded, and the process becomes a zombie until reaped by `wait`.
///
/// If the caller is a thread of the terminated process, it must not return
/// to userspace; terminating from a system call is handled by the dispatcher
/// noticing the current thread turned zombie.
pub fn do_exit(proc_arc: &Arc<IntMutex<Process>>, code: u8) {
	let children = {
		let mut proc = proc_arc.lock();
		if proc.did_exit {
			return;
		}
		proc.flush_threads();
		proc.flush_files();
		proc.exit_code = code;
		proc.did_exit = true;
		proc.exit_seq = EXIT_SEQ.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
		core::mem::take(&mut proc.children)
	};
	// Orphaned children are inherited by init
	for child in children {
		if let Some(child) = get_by_pid(child) {
			child.lock().parent = pid::INIT_PID;
		}
	}
	EXIT_QUEUE.wake_all();
}

/// Waits for a child of `parent_arc` to exit.
///
/// `pid` names the child to wait for; `-1` waits for any child. Every child
/// is checked so that an already-exited one is found no matter its position.
///
/// On success, returns the reaped child's PID and its encoded exit word.
/// With [`WNOHANG`] and no exited child, returns `(0, 0)` immediately.
pub fn wait(parent_arc: &Arc<IntMutex<Process>>, pid: i32, options: u32) -> EResult<(Pid, usize)> {
	EXIT_QUEUE.wait_until(|| {
		let mut parent = parent_arc.lock();
		let candidates: Vec<Pid> = parent
			.children
			.iter()
			.copied()
			.filter(|child| pid == -1 || *child as i32 == pid)
			.collect();
		if candidates.is_empty() {
			return Some(Err(errno!(ECHILD)));
		}
		// Among the exited children, reap the one that died first
		let first_dead = candidates
			.into_iter()
			.filter_map(|child_pid| {
				let child_arc = get_by_pid(child_pid)?;
				let child = child_arc.lock();
				child
					.did_exit
					.then_some((child.exit_seq, child_pid, child.exit_code))
			})
			.min();
		if let Some((_, child_pid, code)) = first_dead {
			// Reap: free the child's slot and address space
			parent.children.retain(|c| *c != child_pid);
			drop(parent);
			if let Some(child_arc) = get_by_pid(child_pid) {
				child_arc.lock().space = None;
			}
			delete_process(child_pid);
			return Some(Ok((child_pid, encode_exit_word(code))));
		}
		if options & WNOHANG != 0 {
			return Some(Ok((0, 0)));
		}
		None
	})?
}

/// Enforces a MAC decision for the process.
///
/// If `allowed` is unset, the process's enforcement action is applied:
/// either a plain denial, a denial logged to the kernel log, or the
/// termination of the process with [`MAC_KILL_CODE`].
pub fn mac_enforce(proc_arc: &Arc<IntMutex<Process>>, allowed: bool, what: &str) -> EResult<()> {
	if allowed {
		return Ok(());
	}
	let action = proc_arc.lock().mac.action();
	match action {
		EnforcementAction::Deny => {}
		EnforcementAction::DenyAndScream => {
			let pid = proc_arc.lock().get_pid();
			log::warn!("mac: pid {pid} denied {what}");
		}
		EnforcementAction::Kill => {
			do_exit(proc_arc, MAC_KILL_CODE);
		}
	}
	Err(errno!(EACCES))
}

/// Handles a CPU fault.
///
/// A fault raised from userspace kills the offending process. A fault in
/// the kernel itself is an invariant violation.
pub fn fault_handler(frame: &mut TrapFrame) {
	if !frame.is_userspace() {
		panic!(
			"kernel fault at {rip:#x} (rsp: {rsp:#x})",
			rip = frame.rip,
			rsp = frame.rsp
		);
	}
	if let Some(proc) = current() {
		let pid = proc.lock().get_pid();
		log::warn!(
			"pid {pid}: fault at {rip:#x}, killing process",
			rip = frame.rip
		);
		do_exit(&proc, 139);
	}
	// The current thread is gone: switch to the next one
	scheduler::tick(frame);
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn process_exit_wait() {
		let parent = create_process(None).unwrap();
		let first = create_process(Some(&parent)).unwrap();
		let second = create_process(Some(&parent)).unwrap();
		let first_pid = first.lock().get_pid();
		let second_pid = second.lock().get_pid();
		assert!(parent.lock().is_child(first_pid));
		assert!(parent.lock().is_child(second_pid));
		// Nothing has exited yet
		assert_eq!(wait(&parent, -1, WNOHANG).unwrap(), (0, 0));
		// Children exit in order; wait returns them in that order
		do_exit(&first, 7);
		do_exit(&second, 3);
		assert_eq!(
			wait(&parent, -1, 0).unwrap(),
			(first_pid, encode_exit_word(7))
		);
		assert_eq!(
			wait(&parent, -1, 0).unwrap(),
			(second_pid, encode_exit_word(3))
		);
		// No child left
		assert_eq!(wait(&parent, -1, WNOHANG), Err(errno!(ECHILD)));
		let pid = parent.lock().get_pid();
		delete_process(pid);
	}

	#[test_case]
	fn process_wait_non_child() {
		let a = create_process(None).unwrap();
		let b = create_process(None).unwrap();
		let b_pid = b.lock().get_pid();
		// Waiting on a process that is not a child fails
		assert_eq!(wait(&a, b_pid as i32, 0), Err(errno!(ECHILD)));
		let a_pid = a.lock().get_pid();
		delete_process(a_pid);
		delete_process(b_pid);
	}

	#[test_case]
	fn process_mac_kill() {
		let proc = create_process(None).unwrap();
		proc.lock()
			.mac
			.set_enforcement(crate::mac::EnforcementAction::Kill)
			.unwrap();
		assert_eq!(mac_enforce(&proc, false, "test"), Err(errno!(EACCES)));
		let (exited, code) = {
			let proc = proc.lock();
			(proc.did_exit, proc.exit_code)
		};
		assert!(exited);
		assert_eq!(code, MAC_KILL_CODE);
		let pid = proc.lock().get_pid();
		delete_process(pid);
	}
}
