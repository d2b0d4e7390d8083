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

//! The thread scheduler.
//!
//! Scheduling is pre-emptive round-robin across per-core ready queues. A
//! thread's *preference* (1..=20) is its quantum in ticks, so its share of
//! the CPU grows with it. A thread may carry *deadline* hints: it then gets
//! picked first until it received `run_time` microseconds of CPU within the
//! current `period`, and is deprioritised for the rest of the period.
//! A *mono* thread only ever runs on its designated core.

pub mod switch;

use crate::{
	arch::x86,
	arch::x86::{FpState, TrapFrame},
	errno,
	errno::EResult,
	limits,
	memory::frame,
	process::pid::Pid,
	sync::mutex::IntMutex,
	time,
};
use alloc::{boxed::Box, collections::VecDeque, vec::Vec};
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering::Relaxed};
use spin::Once;

/// Thread identifier. `0` is reserved and never names a thread.
pub type Tid = u16;

/// The number of pages of a thread's kernel stack.
const KERNEL_STACK_PAGES: usize = 4;
/// The default preference of a new thread.
const DEFAULT_PREFERENCE: u8 = 10;

/// The state of a thread.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
	/// The thread is waiting to run.
	Ready,
	/// The thread is currently running on a core.
	Running,
	/// The thread is waiting for an event.
	Blocked,
	/// The thread is dead, awaiting cleanup.
	Zombie,
}

/// Deadline hints of a thread, in microseconds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Deadlines {
	/// The amount of CPU time the thread needs every period.
	pub run_time: u64,
	/// The length of the period.
	pub period: u64,
}

/// A thread of execution.
pub struct Thread {
	/// The thread's identifier.
	pub tid: Tid,
	/// The owning process. `0` for kernel threads.
	pub pid: Pid,
	/// The saved general-purpose context.
	pub frame: TrapFrame,
	/// The saved FPU/SSE context.
	pub fp: FpState,
	/// The physical address of the address space to bind, `0` to keep the
	/// kernel's.
	pub table: u64,
	/// The thread-local storage pointer.
	pub tls: u64,
	/// The physical base of the thread's kernel stack, `0` for none.
	kernel_stack: u64,
	/// A banned thread is never scheduled.
	pub banned: bool,
	/// The scheduling preference, in `1..=20`.
	pub preference: u8,
	/// The deadline hints, if any.
	pub deadlines: Option<Deadlines>,
	/// The core the thread is pinned on, if any.
	pub mono: Option<usize>,
	/// The thread's state.
	pub state: State,

	/// Tells whether a core still holds the thread's context in its
	/// registers. Such a thread must not be picked yet.
	on_cpu: bool,
	/// The remaining ticks of the current quantum.
	quantum_left: u32,
	/// The tick at which the current deadline period started.
	period_start: u64,
	/// The CPU time received in the current period, in ticks.
	period_runtime: u64,
}

impl Thread {
	/// Tells whether the thread still needs CPU time in its current
	/// deadline period. Updates the period window as a side effect.
	fn deadline_pending(&mut self, now: u64) -> bool {
		let Some(d) = self.deadlines else {
			return false;
		};
		let period_ticks = (d.period / time::TICK_PERIOD_US).max(1);
		if now.wrapping_sub(self.period_start) >= period_ticks {
			self.period_start = now;
			self.period_runtime = 0;
		}
		self.period_runtime < (d.run_time / time::TICK_PERIOD_US).max(1)
	}

	/// Tells whether the thread can run on the given core right now.
	fn eligible(&self, core: usize) -> bool {
		self.state == State::Ready
			&& !self.banned
			&& !self.on_cpu
			&& self.mono.map(|c| c == core).unwrap_or(true)
	}
}

/// A per-core scheduler state.
struct Core {
	/// The TID of the thread currently running on the core. `0` when the
	/// core runs its idle thread.
	current: AtomicU16,
	/// The core's ready queue.
	queue: IntMutex<VecDeque<Tid>>,
	/// The saved context of the core's idle loop.
	idle: IntMutex<(TrapFrame, FpState)>,
}

/// The thread table, indexed by TID. Slot `0` is never used.
static THREADS: Once<IntMutex<Box<[Option<Thread>]>>> = Once::new();

/// Per-core states.
static CORES: [Core; x86::MAX_CORES] = {
	#[allow(clippy::declare_interior_mutable_const)]
	const CORE: Core = Core {
		current: AtomicU16::new(0),
		queue: IntMutex::new(VecDeque::new()),
		idle: IntMutex::new((
			TrapFrame {
				r15: 0,
				r14: 0,
				r13: 0,
				r12: 0,
				r11: 0,
				r10: 0,
				r9: 0,
				r8: 0,
				rbp: 0,
				rdi: 0,
				rsi: 0,
				rdx: 0,
				rcx: 0,
				rbx: 0,
				rax: 0,
				rip: 0,
				cs: 0,
				rflags: 0,
				rsp: 0,
				ss: 0,
			},
			FpState([0; 512]),
		)),
	};
	[CORE; x86::MAX_CORES]
};

/// Tells whether the scheduler has been started.
static ENABLED: AtomicBool = AtomicBool::new(false);

/// Zombie threads whose kernel stack was still in use when they were
/// switched away. The stack stays in use until the switching core's
/// interrupt return completes, so reaping is delayed by a couple of ticks.
static REAP_LIST: IntMutex<Vec<(Tid, u64)>> = IntMutex::new(Vec::new());

/// Reaps deferred zombies that are old enough to be safe.
fn drain_reap_list(threads: &mut [Option<Thread>]) {
	let now = time::ticks();
	let mut list = REAP_LIST.lock();
	list.retain(|(tid, t)| {
		if now.wrapping_sub(*t) < 2 {
			return true;
		}
		reap(threads, *tid);
		false
	});
}

/// Initializes the scheduler.
pub fn init() {
	THREADS.call_once(|| {
		let mut table = Vec::with_capacity(limits::THREAD_MAX);
		table.resize_with(limits::THREAD_MAX, || None);
		IntMutex::new(table.into_boxed_slice())
	});
}

/// Starts scheduling. The boot context of each core is abandoned at the next
/// timer tick.
pub fn start() {
	ENABLED.store(true, Relaxed);
}

fn threads() -> &'static IntMutex<Box<[Option<Thread>]>> {
	THREADS.get().expect("scheduler used before initialization")
}

/// Returns the TID of the thread running on the current core, `0` when
/// idle.
pub fn current_tid() -> Tid {
	CORES[x86::core_id()].current.load(Relaxed)
}

/// Returns the PID of the process owning the thread running on the current
/// core, if any.
pub fn current_pid() -> Option<Pid> {
	let tid = current_tid();
	if tid == 0 {
		return None;
	}
	let threads = threads().lock();
	let pid = threads[tid as usize].as_ref()?.pid;
	(pid != 0).then_some(pid)
}

/// Tells whether the current core is running a userspace thread.
pub fn is_userspace() -> bool {
	current_pid().is_some()
}

/// Tells whether the current thread has been deleted and must not return to
/// userspace.
pub fn current_is_zombie() -> bool {
	let tid = current_tid();
	if tid == 0 {
		return false;
	}
	let threads = threads().lock();
	threads[tid as usize]
		.as_ref()
		.map(|t| t.state == State::Zombie)
		.unwrap_or(true)
}

/// Sets the state of the current thread.
///
/// Setting [`State::Blocked`] right before yielding is how a thread goes to
/// sleep; see [`crate::sync::wait_queue::WaitQueue`].
pub fn set_current_state(state: State) {
	let tid = current_tid();
	if tid == 0 {
		return;
	}
	let mut threads = threads().lock();
	if let Some(th) = threads[tid as usize].as_mut() {
		th.state = state;
	}
}

/// Voluntarily reschedules the current core.
pub fn yield_now() {
	if ENABLED.load(Relaxed) {
		x86::trigger_reschedule();
	}
}

/// Terminates the current thread and never returns.
pub fn bail() -> ! {
	set_current_state(State::Zombie);
	loop {
		x86::trigger_reschedule();
	}
}

/// Makes the current core wait for the next interrupt.
///
/// Used when a core has no ready thread to run.
pub fn idle_core() {
	x86::idle();
}

/// Picks the queue of the core with the least load among the cores the
/// thread may run on.
fn enqueue(tid: Tid, mono: Option<usize>) {
	let core = match mono {
		Some(core) => core % x86::MAX_CORES,
		None => {
			let online = x86::core_count().min(x86::MAX_CORES);
			(0..online)
				.min_by_key(|i| CORES[*i].queue.lock().len())
				.unwrap_or(0)
		}
	};
	CORES[core].queue.lock().push_back(tid);
}

/// Allocates a slot in the thread table.
///
/// Fails with [`errno::EAGAIN`] when the table is full.
fn alloc_slot(threads: &mut [Option<Thread>]) -> EResult<Tid> {
	threads
		.iter()
		.enumerate()
		.skip(1)
		.find(|(_, th)| th.is_none())
		.map(|(i, _)| i as Tid)
		.ok_or_else(|| errno!(EAGAIN))
}

fn new_thread(tid: Tid, pid: Pid, frame: TrapFrame, table: u64, tls: u64, stack: u64) -> Thread {
	Thread {
		tid,
		pid,
		frame,
		fp: FpState::default(),
		table,
		tls,
		kernel_stack: stack,
		banned: false,
		preference: DEFAULT_PREFERENCE,
		deadlines: None,
		mono: None,
		state: State::Ready,
		on_cpu: false,
		quantum_left: 0,
		period_start: 0,
		period_runtime: 0,
	}
}

/// Creates a kernel thread running `entry` with `arg`.
pub fn create_kernel_thread(entry: fn(usize), arg: usize) -> EResult<Tid> {
	let stack = frame::alloc(KERNEL_STACK_PAGES)?;
	let mut threads = threads().lock();
	let tid = match alloc_slot(&mut threads) {
		Ok(tid) => tid,
		Err(e) => {
			frame::free(stack);
			return Err(e);
		}
	};
	let frame = switch::kernel_frame(entry, arg, stack, KERNEL_STACK_PAGES);
	threads[tid as usize] = Some(new_thread(tid, 0, frame, 0, 0, stack));
	drop(threads);
	enqueue(tid, None);
	Ok(tid)
}

/// Creates a user thread from the given register state.
///
/// Arguments:
/// - `frame` is the initial register state, including entry point and stack.
/// - `table` is the physical address of the address space's top-level table.
/// - `tls` is the thread-local storage pointer.
/// - `pid` is the owning process.
pub fn create_user_thread(frame: TrapFrame, table: u64, tls: u64, pid: Pid) -> EResult<Tid> {
	let stack = frame::alloc(KERNEL_STACK_PAGES)?;
	let mut threads = threads().lock();
	let tid = match alloc_slot(&mut threads) {
		Ok(tid) => tid,
		Err(e) => {
			frame::free(stack);
			return Err(e);
		}
	};
	threads[tid as usize] = Some(new_thread(tid, pid, frame, table, tls, stack));
	drop(threads);
	enqueue(tid, None);
	Ok(tid)
}

/// Removes the thread from every ready queue.
fn dequeue(tid: Tid) {
	for core in &CORES {
		let mut queue = core.queue.lock();
		if let Some(pos) = queue.iter().position(|t| *t == tid) {
			let _ = queue.remove(pos);
		}
	}
}

/// Deletes the thread with the given TID.
///
/// A thread whose context is still held by a core is only marked zombie;
/// its slot is reclaimed once the core moved on.
pub fn delete_thread(tid: Tid) -> EResult<()> {
	{
		// Lock order: the thread table comes before the core queues
		let mut threads = threads().lock();
		let th = threads
			.get_mut(tid as usize)
			.and_then(|t| t.as_mut())
			.ok_or_else(|| errno!(EINVAL))?;
		th.state = State::Zombie;
		if !th.on_cpu {
			reap(&mut threads, tid);
		}
	}
	dequeue(tid);
	Ok(())
}

/// Frees the slot and kernel stack of a zombie thread.
fn reap(threads: &mut [Option<Thread>], tid: Tid) {
	if let Some(th) = threads[tid as usize].take() {
		if th.kernel_stack != 0 {
			frame::free(th.kernel_stack);
		}
	}
}

/// Bans or unbans a thread. A banned thread is never scheduled.
pub fn ban_thread(tid: Tid, banned: bool) -> EResult<()> {
	{
		let mut threads = threads().lock();
		let th = threads
			.get_mut(tid as usize)
			.and_then(|t| t.as_mut())
			.ok_or_else(|| errno!(EINVAL))?;
		th.banned = banned;
		if banned {
			drop(threads);
			dequeue(tid);
			return Ok(());
		}
		if th.state != State::Ready || th.on_cpu {
			return Ok(());
		}
	}
	enqueue(tid, mono_of(tid));
	Ok(())
}

fn mono_of(tid: Tid) -> Option<usize> {
	threads().lock()[tid as usize].as_ref().and_then(|t| t.mono)
}

/// Returns the preference of a thread.
pub fn get_preference(tid: Tid) -> EResult<u8> {
	let threads = threads().lock();
	threads
		.get(tid as usize)
		.and_then(|t| t.as_ref())
		.map(|t| t.preference)
		.ok_or_else(|| errno!(EINVAL))
}

/// Sets the preference of a thread, in `1..=20`.
pub fn set_preference(tid: Tid, preference: u8) -> EResult<()> {
	if !(1..=20).contains(&preference) {
		return Err(errno!(EINVAL));
	}
	let mut threads = threads().lock();
	let th = threads
		.get_mut(tid as usize)
		.and_then(|t| t.as_mut())
		.ok_or_else(|| errno!(EINVAL))?;
	th.preference = preference;
	Ok(())
}

/// Sets the deadline hints of a thread. Zero values clear them.
pub fn set_deadlines(tid: Tid, run_time: u64, period: u64) -> EResult<()> {
	if run_time > period {
		return Err(errno!(EINVAL));
	}
	let mut threads = threads().lock();
	let th = threads
		.get_mut(tid as usize)
		.and_then(|t| t.as_mut())
		.ok_or_else(|| errno!(EINVAL))?;
	th.deadlines = (period != 0).then_some(Deadlines {
		run_time,
		period,
	});
	th.period_start = time::ticks();
	th.period_runtime = 0;
	Ok(())
}

/// Pins the thread on the given core, or unpins it.
pub fn set_mono_thread(tid: Tid, core: Option<usize>) -> EResult<()> {
	if core.is_some_and(|c| c >= x86::MAX_CORES) {
		return Err(errno!(EINVAL));
	}
	{
		let mut threads = threads().lock();
		let th = threads
			.get_mut(tid as usize)
			.and_then(|t| t.as_mut())
			.ok_or_else(|| errno!(EINVAL))?;
		th.mono = core;
		if th.state != State::Ready || th.on_cpu {
			return Ok(());
		}
	}
	// Requeue on the right core
	dequeue(tid);
	enqueue(tid, core);
	Ok(())
}

/// Updates the thread-local storage pointer of a thread.
pub fn set_tls(tid: Tid, tls: u64) -> EResult<()> {
	let mut threads = threads().lock();
	let th = threads
		.get_mut(tid as usize)
		.and_then(|t| t.as_mut())
		.ok_or_else(|| errno!(EINVAL))?;
	th.tls = tls;
	drop(threads);
	if tid == current_tid() {
		switch::load_tls(tls);
	}
	Ok(())
}

/// Returns the TIDs of every thread owned by the process `pid`.
pub fn threads_of(pid: Pid) -> Vec<Tid> {
	let threads = threads().lock();
	threads
		.iter()
		.filter_map(|t| t.as_ref())
		.filter(|t| t.pid == pid)
		.map(|t| t.tid)
		.collect()
}

/// Wakes the thread if it is blocked, making it ready and queueing it.
pub fn wake(tid: Tid) {
	let mono = {
		let mut threads = threads().lock();
		let Some(th) = threads.get_mut(tid as usize).and_then(|t| t.as_mut()) else {
			return;
		};
		if th.state != State::Blocked {
			return;
		}
		th.state = State::Ready;
		th.mono
	};
	enqueue(tid, mono);
}

/// Picks the next thread to run on `core`, removing it from the queue.
///
/// Threads behind on their deadline are served first.
fn pick_next(core: usize, threads: &mut [Option<Thread>]) -> Option<Tid> {
	let now = time::ticks();
	let mut queue = CORES[core].queue.lock();
	// First pass: deadline-pending threads
	for pass in 0..2 {
		let pos = queue.iter().position(|tid| {
			let Some(th) = threads.get_mut(*tid as usize).and_then(|t| t.as_mut()) else {
				return false;
			};
			th.eligible(core) && (pass == 1 || th.deadline_pending(now))
		});
		if let Some(pos) = pos {
			return queue.remove(pos);
		}
	}
	// Drop stale entries
	queue.retain(|tid| {
		threads
			.get(*tid as usize)
			.and_then(|t| t.as_ref())
			.is_some_and(|th| th.state == State::Ready && !th.banned)
	});
	None
}

/// The scheduler tick: called on every timer interrupt and voluntary
/// reschedule with the interrupted context.
///
/// Saves the outgoing thread's context, picks the next ready thread for the
/// current core and installs its context into `frame`.
pub fn tick(frame: &mut TrapFrame) {
	if !ENABLED.load(Relaxed) {
		return;
	}
	let core = x86::core_id();
	let cur = CORES[core].current.load(Relaxed);
	let mut threads = threads().lock();
	drain_reap_list(&mut threads);
	// Save the outgoing context and decide whether to keep running it
	if cur != 0 {
		if let Some(th) = threads[cur as usize].as_mut() {
			if th.state == State::Running {
				th.period_runtime += 1;
				// The quantum is not exhausted: keep running
				if th.quantum_left > 1 && !th.banned {
					th.quantum_left -= 1;
					return;
				}
				th.state = State::Ready;
			}
			th.frame = frame.clone();
			th.fp.save();
			th.on_cpu = false;
			match th.state {
				State::Ready if !th.banned => {
					let mono = th.mono;
					drop(threads);
					enqueue(cur, mono);
					threads = self::threads().lock();
				}
				// The stack is in use until the interrupt return: defer
				State::Zombie => REAP_LIST.lock().push((cur, time::ticks())),
				_ => {}
			}
		}
	} else {
		// Leaving the idle loop (or the boot context on the very first tick)
		let mut idle = CORES[core].idle.lock();
		idle.0 = frame.clone();
		idle.1.save();
	}
	// Pick the next thread
	match pick_next(core, &mut threads) {
		Some(tid) => {
			let th = threads[tid as usize].as_mut().unwrap();
			th.state = State::Running;
			th.on_cpu = true;
			th.quantum_left = th.preference as u32;
			CORES[core].current.store(tid, Relaxed);
			*frame = th.frame.clone();
			switch::install(th);
		}
		None => {
			CORES[core].current.store(0, Relaxed);
			let idle = CORES[core].idle.lock();
			*frame = idle.0.clone();
			idle.1.restore();
			switch::install_kernel();
		}
	}
}
