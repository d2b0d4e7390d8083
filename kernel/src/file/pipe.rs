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

//! Pipes.
//!
//! A pipe links two file descriptors together, one reading and one writing,
//! with a bounded buffer in between. When one side closes entirely, the pipe
//! is *broken*: reads drain the remaining bytes then return end-of-file, and
//! writes fail.

use crate::{
	errno,
	errno::EResult,
	file::{POLLERR, POLLHUP, POLLIN, POLLOUT},
	limits,
	memory::ring_buffer::RingBuffer,
	sync::{mutex::Mutex, wait_queue::WaitQueue},
};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering::Relaxed};

#[derive(Debug)]
struct PipeInner {
	/// The pipe's buffer.
	buffer: RingBuffer,
	/// The number of open read ends.
	readers: usize,
	/// The number of open write ends.
	writers: usize,
	/// Set when one side has closed entirely.
	broken: bool,
}

/// A pipe: a bounded FIFO byte buffer between two endpoints.
#[derive(Debug)]
pub struct Pipe {
	/// Inner state, with locking.
	inner: Mutex<PipeInner>,
	/// Tells whether I/O on the pipe blocks.
	blocking: AtomicBool,
	/// The queue of threads waiting to read from the pipe.
	rd_queue: WaitQueue,
	/// The queue of threads waiting to write to the pipe.
	wr_queue: WaitQueue,
}

impl Pipe {
	/// Creates a pipe, returning its two endpoints.
	pub fn pair(blocking: bool) -> (PipeReader, PipeWriter) {
		let pipe = Arc::new(Self {
			inner: Mutex::new(PipeInner {
				buffer: RingBuffer::new(limits::PIPE_BUF),
				readers: 1,
				writers: 1,
				broken: false,
			}),
			blocking: AtomicBool::new(blocking),
			rd_queue: WaitQueue::new(),
			wr_queue: WaitQueue::new(),
		});
		(PipeReader(pipe.clone()), PipeWriter(pipe))
	}

	/// Tells whether I/O on the pipe blocks.
	pub fn is_blocking(&self) -> bool {
		self.blocking.load(Relaxed)
	}

	/// Sets whether I/O on the pipe blocks.
	pub fn set_blocking(&self, blocking: bool) {
		self.blocking.store(blocking, Relaxed);
	}

	/// Returns the number of bytes currently in the buffer.
	pub fn data_len(&self) -> usize {
		self.inner.lock().buffer.len()
	}

	fn read(&self, buf: &mut [u8]) -> EResult<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		let len = self.rd_queue.wait_until(|| {
			let mut inner = self.inner.lock();
			let len = inner.buffer.read(buf);
			if len > 0 {
				self.wr_queue.wake_next();
				return Some(Ok(len));
			}
			// Nothing left to drain: broken means end-of-file
			if inner.broken {
				return Some(Ok(0));
			}
			if !self.is_blocking() {
				Some(Err(errno!(EAGAIN)))
			} else {
				None
			}
		})??;
		Ok(len)
	}

	fn write(&self, buf: &[u8]) -> EResult<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		let len = self.wr_queue.wait_until(|| {
			let mut inner = self.inner.lock();
			if inner.broken {
				return Some(Err(errno!(EIO)));
			}
			let len = inner.buffer.write(buf);
			if len > 0 {
				self.rd_queue.wake_next();
				return Some(Ok(len));
			}
			// No space left
			if !self.is_blocking() {
				Some(Err(errno!(EAGAIN)))
			} else {
				None
			}
		})??;
		Ok(len)
	}

	/// Breaks the pipe, waking every waiter.
	fn brk(&self) {
		self.inner.lock().broken = true;
		self.rd_queue.wake_all();
		self.wr_queue.wake_all();
	}
}

/// The read endpoint of a pipe.
#[derive(Debug)]
pub struct PipeReader(Arc<Pipe>);

impl PipeReader {
	/// Returns the underlying pipe.
	pub fn pipe(&self) -> &Pipe {
		&self.0
	}

	/// Reads from the pipe.
	///
	/// When blocking, the function waits for at least one byte. When the
	/// pipe is broken and drained, it returns `0` (end-of-file).
	pub fn read(&self, buf: &mut [u8]) -> EResult<usize> {
		self.0.read(buf)
	}

	/// Returns the ready events of the endpoint.
	pub fn poll(&self) -> u32 {
		let inner = self.0.inner.lock();
		let mut events = 0;
		if !inner.buffer.is_empty() {
			events |= POLLIN;
		}
		if inner.broken {
			events |= POLLHUP;
		}
		events
	}
}

impl Clone for PipeReader {
	fn clone(&self) -> Self {
		self.0.inner.lock().readers += 1;
		Self(self.0.clone())
	}
}

impl Drop for PipeReader {
	fn drop(&mut self) {
		let readers = {
			let mut inner = self.0.inner.lock();
			inner.readers -= 1;
			inner.readers
		};
		if readers == 0 {
			self.0.brk();
		}
	}
}

/// The write endpoint of a pipe.
#[derive(Debug)]
pub struct PipeWriter(Arc<Pipe>);

impl PipeWriter {
	/// Returns the underlying pipe.
	pub fn pipe(&self) -> &Pipe {
		&self.0
	}

	/// Writes to the pipe.
	///
	/// When blocking and the buffer is full, the function waits for space.
	/// Writing to a broken pipe fails.
	pub fn write(&self, buf: &[u8]) -> EResult<usize> {
		self.0.write(buf)
	}

	/// Returns the ready events of the endpoint.
	pub fn poll(&self) -> u32 {
		let inner = self.0.inner.lock();
		let mut events = 0;
		if inner.broken {
			events |= POLLERR;
		} else if inner.buffer.available() > 0 {
			events |= POLLOUT;
		}
		events
	}
}

impl Clone for PipeWriter {
	fn clone(&self) -> Self {
		self.0.inner.lock().writers += 1;
		Self(self.0.clone())
	}
}

impl Drop for PipeWriter {
	fn drop(&mut self) {
		let writers = {
			let mut inner = self.0.inner.lock();
			inner.writers -= 1;
			inner.writers
		};
		if writers == 0 {
			self.0.brk();
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn pipe_fifo_order() {
		let (r, w) = Pipe::pair(false);
		assert_eq!(w.write(b"hello ").unwrap(), 6);
		assert_eq!(w.write(b"world").unwrap(), 5);
		let mut buf = [0u8; 16];
		let n = r.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"hello world");
	}

	#[test_case]
	fn pipe_nonblocking_empty() {
		let (r, _w) = Pipe::pair(false);
		let mut buf = [0u8; 4];
		assert_eq!(r.read(&mut buf), Err(errno!(EAGAIN)));
	}

	#[test_case]
	fn pipe_broken_drains_then_eof() {
		let (r, w) = Pipe::pair(false);
		w.write(b"tail").unwrap();
		drop(w);
		let mut buf = [0u8; 16];
		assert_eq!(r.read(&mut buf).unwrap(), 4);
		assert_eq!(&buf[..4], b"tail");
		// Drained and broken: end-of-file
		assert_eq!(r.read(&mut buf).unwrap(), 0);
	}

	#[test_case]
	fn pipe_broken_write_fails() {
		let (r, w) = Pipe::pair(false);
		drop(r);
		assert!(w.write(b"x").is_err());
	}

	#[test_case]
	fn pipe_poll_events() {
		let (r, w) = Pipe::pair(false);
		assert_eq!(r.poll() & POLLIN, 0);
		assert_ne!(w.poll() & POLLOUT, 0);
		w.write(b"x").unwrap();
		assert_ne!(r.poll() & POLLIN, 0);
		drop(w);
		assert_ne!(r.poll() & POLLIN, 0);
		assert_ne!(r.poll() & POLLHUP, 0);
	}

	#[test_case]
	fn pipe_dup_keeps_end_open() {
		let (r, w) = Pipe::pair(false);
		let w2 = w.clone();
		drop(w);
		// One write end is still open: not broken yet
		w2.write(b"y").unwrap();
		let mut buf = [0u8; 1];
		assert_eq!(r.read(&mut buf).unwrap(), 1);
		drop(w2);
		assert_eq!(r.read(&mut buf).unwrap(), 0);
	}
}
