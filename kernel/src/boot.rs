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

//! Bootloader interface.
//!
//! The bootstrap glue (out of the kernel core's scope) parses the
//! bootloader's tags and hands the kernel a [`BootInfo`] with everything
//! already typed: the physical memory map, the framebuffer, the ACPI RSDP
//! pointer and the kernel's load addresses.

/// The kind of a physical memory region.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemoryRegionKind {
	/// Memory free for use by the kernel.
	Usable,
	/// Memory reserved by the firmware.
	Reserved,
	/// ACPI tables, reclaimable once parsed.
	AcpiReclaimable,
	/// ACPI non-volatile storage.
	AcpiNvs,
	/// Defective memory.
	Bad,
	/// Memory used by the bootloader, reclaimable once the kernel took over.
	BootloaderReclaimable,
	/// The kernel image and boot modules.
	KernelAndModules,
	/// The framebuffer.
	Framebuffer,
}

/// A region of the physical memory map.
#[derive(Clone, Copy, Debug)]
pub struct MemoryRegion {
	/// The physical base address of the region.
	pub base: u64,
	/// The size of the region in bytes.
	pub size: u64,
	/// The kind of the region.
	pub kind: MemoryRegionKind,
}

/// Description of the framebuffer set up by the bootloader.
#[derive(Clone, Copy, Debug)]
pub struct Framebuffer {
	/// The physical address of the framebuffer.
	pub address: u64,
	/// The width of the framebuffer in pixels.
	pub width: u32,
	/// The height of the framebuffer in pixels.
	pub height: u32,
	/// The number of bytes per scanline.
	pub pitch: u32,
	/// The number of bits per pixel.
	pub bpp: u8,
	/// Red mask size and shift, in bits.
	pub red_mask: (u8, u8),
	/// Green mask size and shift, in bits.
	pub green_mask: (u8, u8),
	/// Blue mask size and shift, in bits.
	pub blue_mask: (u8, u8),
}

/// Boot information handed over by the bootstrap glue.
#[derive(Debug)]
pub struct BootInfo<'b> {
	/// The physical memory map, sorted by base address.
	pub memory_map: &'b [MemoryRegion],
	/// The framebuffer, if any.
	pub framebuffer: Option<Framebuffer>,
	/// The physical address of the ACPI RSDP structure, if present.
	pub rsdp: Option<u64>,
	/// The physical address the kernel image is loaded at.
	pub kernel_physical_base: u64,
	/// The virtual address the kernel image is loaded at.
	pub kernel_virtual_base: u64,
	/// The kernel command line, if any.
	pub cmdline: Option<&'b [u8]>,
	/// The wall clock time at boot, in seconds since the Unix epoch.
	pub boot_time: u64,
}

impl MemoryRegion {
	/// Tells whether the region can be used as general-purpose memory.
	pub fn is_usable(&self) -> bool {
		self.kind == MemoryRegionKind::Usable
	}
}
