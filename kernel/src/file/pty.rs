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

//! Pseudo-terminals.
//!
//! A PTY is a symmetric pair of byte buffers: what the primary writes, the
//! secondary reads, and the other way around. The pair carries the terminal
//! I/O settings and the window size, accessed through `ioctl` on either end.

use crate::{
	errno,
	errno::EResult,
	file::{POLLERR, POLLHUP, POLLIN, POLLOUT},
	limits,
	memory::{
		ring_buffer::RingBuffer,
		user::UserPtr,
		vmm::AddressSpace,
	},
	sync::{mutex::Mutex, wait_queue::WaitQueue},
};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering::Relaxed};
use macros::AnyRepr;

/// ioctl: get the terminal I/O settings.
pub const TCGETS: u32 = 0x5401;
/// ioctl: set the terminal I/O settings.
pub const TCSETS: u32 = 0x5402;
/// ioctl: get the window size.
pub const TIOCGWINSZ: u32 = 0x5413;
/// ioctl: set the window size.
pub const TIOCSWINSZ: u32 = 0x5414;
/// ioctl: get the number of bytes available for reading.
pub const FIONREAD: u32 = 0x541b;

/// Terminal I/O settings.
///
/// The layout is part of the userspace ABI; the kernel itself only stores
/// the fields.
#[repr(C)]
#[derive(AnyRepr, Clone, Debug)]
pub struct Termios {
	/// Input mode flags.
	pub c_iflag: u32,
	/// Output mode flags.
	pub c_oflag: u32,
	/// Control mode flags.
	pub c_cflag: u32,
	/// Local mode flags.
	pub c_lflag: u32,
	/// Control characters.
	pub c_cc: [u8; 32],
}

impl Default for Termios {
	fn default() -> Self {
		Self {
			c_iflag: 0,
			c_oflag: 0,
			c_cflag: 0,
			c_lflag: 0,
			c_cc: [0; 32],
		}
	}
}

/// The size of a terminal window.
#[repr(C)]
#[derive(AnyRepr, Clone, Copy, Debug, Default)]
pub struct WinSize {
	/// The number of rows.
	pub ws_row: u16,
	/// The number of columns.
	pub ws_col: u16,
	/// The width in pixels.
	pub ws_xpixel: u16,
	/// The height in pixels.
	pub ws_ypixel: u16,
}

/// One direction of the PTY: a bounded buffer with its wait queues.
#[derive(Debug)]
struct Channel {
	buffer: Mutex<RingBuffer>,
	rd_queue: WaitQueue,
	wr_queue: WaitQueue,
}

impl Channel {
	fn new() -> Self {
		Self {
			buffer: Mutex::new(RingBuffer::new(limits::TTY_BUF_SIZE)),
			rd_queue: WaitQueue::new(),
			wr_queue: WaitQueue::new(),
		}
	}

	fn read(&self, buf: &mut [u8], broken: &AtomicBool, blocking: bool) -> EResult<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		self.rd_queue.wait_until(|| {
			let n = self.buffer.lock().read(buf);
			if n > 0 {
				self.wr_queue.wake_next();
				return Some(Ok(n));
			}
			if broken.load(Relaxed) {
				return Some(Ok(0));
			}
			if !blocking {
				Some(Err(errno!(EAGAIN)))
			} else {
				None
			}
		})?
	}

	fn write(&self, buf: &[u8], broken: &AtomicBool, blocking: bool) -> EResult<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		self.wr_queue.wait_until(|| {
			if broken.load(Relaxed) {
				return Some(Err(errno!(EIO)));
			}
			let n = self.buffer.lock().write(buf);
			if n > 0 {
				self.rd_queue.wake_next();
				return Some(Ok(n));
			}
			if !blocking {
				Some(Err(errno!(EAGAIN)))
			} else {
				None
			}
		})?
	}

	fn wake_all(&self) {
		self.rd_queue.wake_all();
		self.wr_queue.wake_all();
	}
}

/// A pseudo-terminal pair.
#[derive(Debug)]
pub struct Pty {
	/// Bytes travelling from the primary to the secondary.
	input: Channel,
	/// Bytes travelling from the secondary to the primary.
	output: Channel,
	/// The terminal I/O settings.
	termios: Mutex<Termios>,
	/// The window size.
	winsize: Mutex<WinSize>,
	/// The number of open primary ends.
	primaries: AtomicU32,
	/// The number of open secondary ends.
	secondaries: AtomicU32,
	/// Set when one side has closed entirely.
	broken: AtomicBool,
}

impl Pty {
	/// Creates a pseudo-terminal, returning its two endpoints.
	pub fn pair() -> (PtyPrimary, PtySecondary) {
		let pty = Arc::new(Self {
			input: Channel::new(),
			output: Channel::new(),
			termios: Mutex::new(Termios::default()),
			winsize: Mutex::new(WinSize::default()),
			primaries: AtomicU32::new(1),
			secondaries: AtomicU32::new(1),
			broken: AtomicBool::new(false),
		});
		(PtyPrimary(pty.clone()), PtySecondary(pty))
	}

	fn brk(&self) {
		self.broken.store(true, Relaxed);
		self.input.wake_all();
		self.output.wake_all();
	}

	/// Handles the ioctls common to both ends.
	fn ioctl(
		&self,
		space: &AddressSpace,
		request: u32,
		arg: usize,
		read_channel: &Channel,
	) -> EResult<u32> {
		match request {
			TCGETS => {
				let ptr: UserPtr<Termios> = arg.into();
				ptr.copy_to_user(space, &self.termios.lock().clone())?;
			}
			TCSETS => {
				let ptr: UserPtr<Termios> = arg.into();
				let termios = ptr.copy_from_user(space)?.ok_or_else(|| errno!(EFAULT))?;
				*self.termios.lock() = termios;
			}
			TIOCGWINSZ => {
				let ptr: UserPtr<WinSize> = arg.into();
				ptr.copy_to_user(space, &*self.winsize.lock())?;
			}
			TIOCSWINSZ => {
				let ptr: UserPtr<WinSize> = arg.into();
				let winsize = ptr.copy_from_user(space)?.ok_or_else(|| errno!(EFAULT))?;
				*self.winsize.lock() = winsize;
			}
			FIONREAD => {
				let ptr: UserPtr<u32> = arg.into();
				ptr.copy_to_user(space, &(read_channel.buffer.lock().len() as u32))?;
			}
			_ => return Err(errno!(ENOTTY)),
		}
		Ok(0)
	}

	fn poll(&self, read_channel: &Channel, write_channel: &Channel) -> u32 {
		let mut events = 0;
		if !read_channel.buffer.lock().is_empty() {
			events |= POLLIN;
		}
		if self.broken.load(Relaxed) {
			events |= POLLHUP | POLLERR;
		} else if write_channel.buffer.lock().available() > 0 {
			events |= POLLOUT;
		}
		events
	}
}

/// The primary end of a pseudo-terminal.
#[derive(Debug)]
pub struct PtyPrimary(Arc<Pty>);

impl PtyPrimary {
	/// Reads what the secondary wrote.
	pub fn read(&self, buf: &mut [u8]) -> EResult<usize> {
		self.0.output.read(buf, &self.0.broken, true)
	}

	/// Writes bytes for the secondary to read.
	pub fn write(&self, buf: &[u8]) -> EResult<usize> {
		self.0.input.write(buf, &self.0.broken, true)
	}

	/// Performs an ioctl on the pair.
	pub fn ioctl(&self, space: &AddressSpace, request: u32, arg: usize) -> EResult<u32> {
		self.0.ioctl(space, request, arg, &self.0.output)
	}

	/// Returns the ready events of the endpoint.
	pub fn poll(&self) -> u32 {
		self.0.poll(&self.0.output, &self.0.input)
	}
}

impl Clone for PtyPrimary {
	fn clone(&self) -> Self {
		self.0.primaries.fetch_add(1, Relaxed);
		Self(self.0.clone())
	}
}

impl Drop for PtyPrimary {
	fn drop(&mut self) {
		if self.0.primaries.fetch_sub(1, Relaxed) == 1 {
			self.0.brk();
		}
	}
}

/// The secondary end of a pseudo-terminal.
#[derive(Debug)]
pub struct PtySecondary(Arc<Pty>);

impl PtySecondary {
	/// Reads what the primary wrote.
	pub fn read(&self, buf: &mut [u8]) -> EResult<usize> {
		self.0.input.read(buf, &self.0.broken, true)
	}

	/// Writes bytes for the primary to read.
	pub fn write(&self, buf: &[u8]) -> EResult<usize> {
		self.0.output.write(buf, &self.0.broken, true)
	}

	/// Performs an ioctl on the pair.
	pub fn ioctl(&self, space: &AddressSpace, request: u32, arg: usize) -> EResult<u32> {
		self.0.ioctl(space, request, arg, &self.0.input)
	}

	/// Returns the ready events of the endpoint.
	pub fn poll(&self) -> u32 {
		self.0.poll(&self.0.input, &self.0.output)
	}
}

impl Clone for PtySecondary {
	fn clone(&self) -> Self {
		self.0.secondaries.fetch_add(1, Relaxed);
		Self(self.0.clone())
	}
}

impl Drop for PtySecondary {
	fn drop(&mut self) {
		if self.0.secondaries.fetch_sub(1, Relaxed) == 1 {
			self.0.brk();
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn pty_crossed_buffers() {
		let (primary, secondary) = Pty::pair();
		primary.write(b"to secondary").unwrap();
		secondary.write(b"to primary").unwrap();
		let mut buf = [0u8; 16];
		let n = secondary.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"to secondary");
		let n = primary.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"to primary");
	}

	#[test_case]
	fn pty_hangup() {
		let (primary, secondary) = Pty::pair();
		drop(primary);
		assert_ne!(secondary.poll() & POLLHUP, 0);
		assert!(secondary.write(b"x").is_err());
	}
}
