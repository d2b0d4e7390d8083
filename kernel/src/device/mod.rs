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

//! Devices management.
//!
//! Every device is registered under a unique name and addressed through a
//! small opaque handle. The handle `0` is reserved to mean "no device".
//!
//! A device implements [`DeviceOps`]; operations it does not support keep
//! the default implementation, which is an explicit "not supported" sentinel
//! rather than a null pointer.

pub mod default;
pub mod serial;

use crate::{
	boot::BootInfo,
	errno,
	errno::EResult,
	limits,
	memory::vmm::{AddressSpace, MappingFlags},
	sync::mutex::Mutex,
};
use alloc::{sync::Arc, vec::Vec};
use arrayvec::ArrayVec;

/// A device handle. `0` is reserved as an error/absence value.
pub type DeviceHandle = u32;

/// The set of operations a device may support.
///
/// Absent operations keep the defaults below.
pub trait DeviceOps: Send + Sync {
	/// Flushes cached data to the hardware.
	///
	/// Returns `false` when the device does not support the operation.
	fn sync(&self) -> bool {
		false
	}

	/// Reads from the device at offset `off` into `buf`, returning the
	/// number of bytes read.
	fn read(&self, _off: u64, _buf: &mut [u8]) -> EResult<usize> {
		Err(errno!(ENOTSUP))
	}

	/// Writes `buf` to the device at offset `off`, returning the number of
	/// bytes written.
	fn write(&self, _off: u64, _buf: &[u8]) -> EResult<usize> {
		Err(errno!(ENOTSUP))
	}

	/// Performs the ioctl `request` with the argument `arg`.
	fn ioctl(&self, _request: u32, _arg: usize) -> EResult<u32> {
		Err(errno!(ENOTTY))
	}

	/// Maps the device's memory at `virt` in `space`.
	fn mmap(
		&self,
		_space: &mut AddressSpace,
		_virt: u64,
		_pages: usize,
		_flags: MappingFlags,
	) -> EResult<()> {
		Err(errno!(ENOTSUP))
	}

	/// Unmaps the device's memory from `space`.
	fn munmap(&self, _space: &mut AddressSpace, _virt: u64, _pages: usize) -> EResult<()> {
		Err(errno!(ENOTSUP))
	}
}

/// A registered device resource.
pub struct Device {
	/// The handle the device was registered under.
	id: DeviceHandle,
	/// The device's name.
	name: Vec<u8>,
	/// Tells whether the device is a block device (as opposed to a character
	/// device).
	is_block: bool,
	/// The size of a block in bytes. `1` for character devices.
	block_size: u64,
	/// The number of blocks. `0` when the device is not seekable.
	block_count: u64,
	/// Serializes operations on the device.
	mutex: Mutex<()>,
	/// The device's operations.
	ops: Arc<dyn DeviceOps>,
}

impl Device {
	/// Creates a new character device.
	pub fn new_char(ops: Arc<dyn DeviceOps>) -> Self {
		Self {
			id: 0,
			name: Vec::new(),
			is_block: false,
			block_size: 1,
			block_count: 0,
			mutex: Mutex::new(()),
			ops,
		}
	}

	/// Creates a new block device with the given geometry.
	pub fn new_block(ops: Arc<dyn DeviceOps>, block_size: u64, block_count: u64) -> Self {
		Self {
			id: 0,
			name: Vec::new(),
			is_block: true,
			block_size,
			block_count,
			mutex: Mutex::new(()),
			ops,
		}
	}

	/// Returns the device's unique ID, which is also its handle.
	pub fn id(&self) -> DeviceHandle {
		self.id
	}

	/// Returns the device's name.
	pub fn name(&self) -> &[u8] {
		&self.name
	}

	/// Tells whether the device is a block device.
	pub fn is_block(&self) -> bool {
		self.is_block
	}

	/// Returns the size of a block in bytes.
	pub fn block_size(&self) -> u64 {
		self.block_size
	}

	/// Returns the number of blocks.
	pub fn block_count(&self) -> u64 {
		self.block_count
	}

	/// Flushes cached data to the hardware.
	pub fn sync(&self) -> bool {
		let _guard = self.mutex.lock();
		self.ops.sync()
	}

	/// Reads from the device.
	pub fn read(&self, off: u64, buf: &mut [u8]) -> EResult<usize> {
		let _guard = self.mutex.lock();
		self.ops.read(off, buf)
	}

	/// Writes to the device.
	pub fn write(&self, off: u64, buf: &[u8]) -> EResult<usize> {
		let _guard = self.mutex.lock();
		self.ops.write(off, buf)
	}

	/// Performs an ioctl on the device.
	pub fn ioctl(&self, request: u32, arg: usize) -> EResult<u32> {
		let _guard = self.mutex.lock();
		self.ops.ioctl(request, arg)
	}

	/// Maps the device's memory into `space`.
	pub fn mmap(
		&self,
		space: &mut AddressSpace,
		virt: u64,
		pages: usize,
		flags: MappingFlags,
	) -> EResult<()> {
		let _guard = self.mutex.lock();
		self.ops.mmap(space, virt, pages, flags)
	}

	/// Unmaps the device's memory from `space`.
	pub fn munmap(&self, space: &mut AddressSpace, virt: u64, pages: usize) -> EResult<()> {
		let _guard = self.mutex.lock();
		self.ops.munmap(space, virt, pages)
	}
}

/// The devices table. The handle of a device is its index plus one.
static DEVICES: Mutex<ArrayVec<Arc<Device>, { limits::DEVICE_MAX }>> =
	Mutex::new(ArrayVec::new_const());

/// Registers a device under the given `name`.
///
/// The name must be at most [`limits::DEVICE_NAME_MAX`] bytes long and
/// unique. On success, the function returns the device's handle.
pub fn register(name: &[u8], mut dev: Device) -> EResult<DeviceHandle> {
	if name.is_empty() || name.len() > limits::DEVICE_NAME_MAX {
		return Err(errno!(ENAMETOOLONG));
	}
	let mut devices = DEVICES.lock();
	if devices.iter().any(|d| d.name == name) {
		return Err(errno!(EBUSY));
	}
	if devices.is_full() {
		return Err(errno!(EAGAIN));
	}
	let id = devices.len() as DeviceHandle + 1;
	dev.id = id;
	dev.name = name.to_vec();
	devices.push(Arc::new(dev));
	Ok(id)
}

/// Returns the handle of the device registered under `name`, or `0` if no
/// such device exists.
pub fn fetch(name: &[u8]) -> DeviceHandle {
	DEVICES
		.lock()
		.iter()
		.find(|d| d.name == name)
		.map(|d| d.id)
		.unwrap_or(0)
}

/// Returns the device with the given handle.
pub fn get(handle: DeviceHandle) -> Option<Arc<Device>> {
	let devices = DEVICES.lock();
	devices.get(handle.checked_sub(1)? as usize).cloned()
}

/// Registers the default devices.
pub fn init(boot_info: &BootInfo) -> EResult<()> {
	default::register_defaults(boot_info)
}

#[cfg(test)]
mod test {
	use super::*;

	struct Dummy;

	impl DeviceOps for Dummy {}

	#[test_case]
	fn device_register_fetch() {
		let id = register(b"dummy0", Device::new_char(Arc::new(Dummy))).unwrap();
		assert_ne!(id, 0);
		assert_eq!(fetch(b"dummy0"), id);
		assert_eq!(fetch(b"missing"), 0);
		let dev = get(id).unwrap();
		assert_eq!(dev.id(), id);
		assert!(!dev.is_block());
		// Unique names are enforced
		assert!(register(b"dummy0", Device::new_char(Arc::new(Dummy))).is_err());
	}

	#[test_case]
	fn device_absent_ops() {
		let id = register(b"dummy1", Device::new_char(Arc::new(Dummy))).unwrap();
		let dev = get(id).unwrap();
		assert!(!dev.sync());
		assert!(dev.read(0, &mut [0u8; 4]).is_err());
		assert!(dev.write(0, &[0u8; 4]).is_err());
	}
}
