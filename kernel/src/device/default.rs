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

//! Default devices, registered at boot.

use crate::{
	boot::{BootInfo, Framebuffer},
	device,
	device::{serial, Device, DeviceOps},
	errno::EResult,
	memory,
	memory::vmm::{AddressSpace, MappingFlags},
	rand,
};
use alloc::sync::Arc;

/// The null device: reads end-of-file, writes are discarded.
struct NullDevice;

impl DeviceOps for NullDevice {
	fn read(&self, _off: u64, _buf: &mut [u8]) -> EResult<usize> {
		Ok(0)
	}

	fn write(&self, _off: u64, buf: &[u8]) -> EResult<usize> {
		Ok(buf.len())
	}
}

/// The zero device: reads return zeros, writes are discarded.
struct ZeroDevice;

impl DeviceOps for ZeroDevice {
	fn read(&self, _off: u64, buf: &mut [u8]) -> EResult<usize> {
		buf.fill(0);
		Ok(buf.len())
	}

	fn write(&self, _off: u64, buf: &[u8]) -> EResult<usize> {
		Ok(buf.len())
	}
}

/// The random device, backed by the entropy pool.
struct RandomDevice;

impl DeviceOps for RandomDevice {
	fn read(&self, _off: u64, buf: &mut [u8]) -> EResult<usize> {
		rand::fill(buf);
		Ok(buf.len())
	}

	fn write(&self, _off: u64, buf: &[u8]) -> EResult<usize> {
		Ok(buf.len())
	}
}

/// The boot framebuffer.
struct FramebufferDevice(Framebuffer);

impl FramebufferDevice {
	fn len(&self) -> usize {
		self.0.pitch as usize * self.0.height as usize
	}
}

impl DeviceOps for FramebufferDevice {
	fn read(&self, off: u64, buf: &mut [u8]) -> EResult<usize> {
		let len = self.len() as u64;
		let off = off.min(len);
		let n = buf.len().min((len - off) as usize);
		unsafe {
			core::ptr::copy_nonoverlapping(
				memory::phys_to_virt(self.0.address + off),
				buf.as_mut_ptr(),
				n,
			);
		}
		Ok(n)
	}

	fn write(&self, off: u64, buf: &[u8]) -> EResult<usize> {
		let len = self.len() as u64;
		let off = off.min(len);
		let n = buf.len().min((len - off) as usize);
		unsafe {
			core::ptr::copy_nonoverlapping(
				buf.as_ptr(),
				memory::phys_to_virt(self.0.address + off),
				n,
			);
		}
		Ok(n)
	}

	fn mmap(
		&self,
		space: &mut AddressSpace,
		virt: u64,
		pages: usize,
		flags: MappingFlags,
	) -> EResult<()> {
		let pages = pages.min(memory::pages_for(self.len()));
		space.map_range(
			virt,
			self.0.address,
			pages,
			flags | MappingFlags::WRITE_THROUGH,
		)
	}

	fn munmap(&self, space: &mut AddressSpace, virt: u64, pages: usize) -> EResult<()> {
		space.unmap_range(virt, pages * memory::PAGE_SIZE)
	}
}

/// A serial port device.
struct SerialDevice(usize);

impl DeviceOps for SerialDevice {
	fn read(&self, _off: u64, buf: &mut [u8]) -> EResult<usize> {
		Ok(serial::PORTS[self.0].lock().read(buf))
	}

	fn write(&self, _off: u64, buf: &[u8]) -> EResult<usize> {
		serial::PORTS[self.0].lock().write(buf);
		Ok(buf.len())
	}

	fn sync(&self) -> bool {
		true
	}
}

/// Registers the default devices.
pub(super) fn register_defaults(boot_info: &BootInfo) -> EResult<()> {
	device::register(b"null", Device::new_char(Arc::new(NullDevice)))?;
	device::register(b"zero", Device::new_char(Arc::new(ZeroDevice)))?;
	device::register(b"urandom", Device::new_char(Arc::new(RandomDevice)))?;
	if let Some(fb) = boot_info.framebuffer {
		device::register(b"bootfb", Device::new_char(Arc::new(FramebufferDevice(fb))))?;
	}
	for i in 0..serial::PORTS.len() {
		let mut name = *b"serial0";
		name[6] += i as u8;
		device::register(&name, Device::new_char(Arc::new(SerialDevice(i))))?;
	}
	Ok(())
}
