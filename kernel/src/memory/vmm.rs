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

//! The virtual memory manager.
//!
//! An [`AddressSpace`] wraps a top-level page table together with the list of
//! mapping ranges it contains. Ranges are disjoint, page-aligned and live
//! entirely in the userspace half; the kernel half is shared by reference
//! across every address space through the top-level table entries.
//!
//! A range with `allocated` set owns its backing frames: they are freed when
//! the range is unmapped or the address space is dropped.

use crate::{
	errno,
	errno::{AllocResult, EResult},
	memory,
	memory::{frame, PAGE_SIZE, USERSPACE_END},
	sync::once::OnceInit,
};
use alloc::vec::Vec;
use bitflags::bitflags;
use core::alloc::AllocError;
use x86_64::{
	instructions::tlb,
	registers::control::{Cr3, Cr3Flags},
	structures::paging::{page_table::PageTableEntry, PageTable, PageTableFlags, PhysFrame},
	PhysAddr, VirtAddr,
};

bitflags! {
	/// Permissions and attributes of a mapping range.
	#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
	pub struct MappingFlags: u32 {
		/// The range is accessible from userspace.
		const USER = 0b00001;
		/// The range cannot be written to.
		const READ_ONLY = 0b00010;
		/// The range contains executable code.
		const EXEC = 0b00100;
		/// The range is kept across context switches in the TLB.
		const GLOBAL = 0b01000;
		/// Writes to the range go through the cache.
		const WRITE_THROUGH = 0b10000;
	}
}

/// Converts mapping flags to page table entry flags.
fn table_flags(flags: MappingFlags) -> PageTableFlags {
	let mut f = PageTableFlags::PRESENT;
	if !flags.contains(MappingFlags::READ_ONLY) {
		f |= PageTableFlags::WRITABLE;
	}
	if flags.contains(MappingFlags::USER) {
		f |= PageTableFlags::USER_ACCESSIBLE;
	}
	if flags.contains(MappingFlags::GLOBAL) {
		f |= PageTableFlags::GLOBAL;
	}
	if flags.contains(MappingFlags::WRITE_THROUGH) {
		f |= PageTableFlags::WRITE_THROUGH;
	}
	if !flags.contains(MappingFlags::EXEC) {
		f |= PageTableFlags::NO_EXECUTE;
	}
	f
}

/// A contiguous, permission-uniform region inside an address space.
#[derive(Clone, Debug)]
pub struct MappingRange {
	/// The virtual address of the first page.
	pub virt: u64,
	/// The physical address of the first backing frame.
	pub phys: u64,
	/// The length of the range in pages.
	pub pages: usize,
	/// The range's flags.
	pub flags: MappingFlags,
	/// Tells whether the address space owns the backing frames.
	pub allocated: bool,
}

impl MappingRange {
	/// The virtual address one past the end of the range.
	#[inline]
	pub fn end(&self) -> u64 {
		self.virt + (self.pages * PAGE_SIZE) as u64
	}

	/// Tells whether the range overlaps `[virt, virt + pages * PAGE_SIZE)`.
	fn overlaps(&self, virt: u64, pages: usize) -> bool {
		let end = virt + (pages * PAGE_SIZE) as u64;
		self.virt < end && virt < self.end()
	}
}

/// The physical address of the kernel's top-level page table, whose higher
/// half is shared with every address space.
static KERNEL_TABLE: OnceInit<u64> = OnceInit::new();

/// Initializes the virtual memory manager from the page tables the bootstrap
/// code set up.
pub fn init() {
	let (table, _) = Cr3::read();
	KERNEL_TABLE.init(table.start_address().as_u64());
}

/// Returns the physical address of the kernel's top-level page table.
pub fn kernel_table() -> u64 {
	*KERNEL_TABLE
}

/// Binds the page table at the physical address `table` to the current
/// core.
pub fn bind_table(table: u64) {
	if Cr3::read().0.start_address().as_u64() == table {
		return;
	}
	unsafe {
		Cr3::write(
			PhysFrame::containing_address(PhysAddr::new(table)),
			Cr3Flags::empty(),
		);
	}
}

/// Binds the kernel's own page table to the current core.
pub fn bind_kernel() {
	bind_table(*KERNEL_TABLE);
}

/// Tells whether `[addr, addr + len)` lies wholly inside the userspace half,
/// independently of any address space.
///
/// This is used to reject hostile `mmap` hints pointing into the kernel
/// half.
pub fn check_userland_mappability(addr: u64, len: usize) -> bool {
	let Some(end) = addr.checked_add(len as u64) else {
		return false;
	};
	end <= USERSPACE_END
}

/// Returns a mutable reference to the page table at the physical address
/// `phys`, through the direct mapping.
///
/// # Safety
///
/// `phys` must point to a valid page table. Aliasing is the caller's
/// responsibility: tables must only be reached while holding the lock of the
/// owning address space.
unsafe fn table_at(phys: u64) -> &'static mut PageTable {
	&mut *(memory::phys_to_virt(phys) as *mut PageTable)
}

/// A virtual address space.
pub struct AddressSpace {
	/// The physical address of the top-level page table.
	table: u64,
	/// The mapping ranges of the space, sorted by virtual address.
	ranges: Vec<MappingRange>,
}

impl AddressSpace {
	/// Creates a fresh address space with the shared kernel mapping
	/// installed.
	pub fn new() -> AllocResult<Self> {
		let table = frame::alloc(1)?;
		// Share the kernel half
		let kernel = unsafe { table_at(*KERNEL_TABLE) };
		let new = unsafe { table_at(table) };
		for i in 256..512 {
			new[i].set_addr(kernel[i].addr(), kernel[i].flags());
		}
		Ok(Self {
			table,
			ranges: Vec::new(),
		})
	}

	/// Makes the current core use this address space.
	pub fn bind(&self) {
		unsafe {
			Cr3::write(
				PhysFrame::containing_address(PhysAddr::new(self.table)),
				Cr3Flags::empty(),
			);
		}
	}

	/// Tells whether the current core uses this address space.
	pub fn is_bound(&self) -> bool {
		Cr3::read().0.start_address().as_u64() == self.table
	}

	/// Returns the physical address of the top-level page table.
	pub fn table_addr(&self) -> u64 {
		self.table
	}

	/// Returns the mapping ranges of the space.
	pub fn ranges(&self) -> &[MappingRange] {
		&self.ranges
	}

	/// Returns the last-level entry for `virt`, if the intermediate tables
	/// exist.
	fn entry(&self, virt: u64) -> Option<&'static mut PageTableEntry> {
		let mut table = unsafe { table_at(self.table) };
		for shift in [39u64, 30, 21] {
			let e = &table[(virt >> shift) as usize & 0x1ff];
			if !e.flags().contains(PageTableFlags::PRESENT) {
				return None;
			}
			table = unsafe { table_at(e.addr().as_u64()) };
		}
		Some(&mut table[(virt >> 12) as usize & 0x1ff])
	}

	/// Returns the last-level entry for `virt`, creating intermediate tables
	/// as needed.
	fn entry_or_create(&mut self, virt: u64) -> AllocResult<&'static mut PageTableEntry> {
		let mut table = unsafe { table_at(self.table) };
		for shift in [39u64, 30, 21] {
			let e = &mut table[(virt >> shift) as usize & 0x1ff];
			if !e.flags().contains(PageTableFlags::PRESENT) {
				let frame = frame::alloc(1)?;
				e.set_addr(
					PhysAddr::new(frame),
					PageTableFlags::PRESENT
						| PageTableFlags::WRITABLE
						| PageTableFlags::USER_ACCESSIBLE,
				);
			}
			table = unsafe { table_at(e.addr().as_u64()) };
		}
		Ok(&mut table[(virt >> 12) as usize & 0x1ff])
	}

	/// Flushes the TLB entry for `virt` if the space is bound.
	fn flush(&self, virt: u64) {
		if self.is_bound() {
			tlb::flush(VirtAddr::new(virt));
		}
	}

	/// Checks alignment and bounds for a range insertion.
	fn check_insert(&self, virt: u64, phys: u64, pages: usize) -> EResult<()> {
		if pages == 0 || !memory::is_aligned(virt) || !memory::is_aligned(phys) {
			return Err(errno!(EINVAL));
		}
		if !check_userland_mappability(virt, pages * PAGE_SIZE) {
			return Err(errno!(EINVAL));
		}
		if self.ranges.iter().any(|r| r.overlaps(virt, pages)) {
			return Err(errno!(EINVAL));
		}
		Ok(())
	}

	/// Writes the page table entries for a range and records it.
	fn insert(&mut self, range: MappingRange) -> EResult<()> {
		let flags = table_flags(range.flags);
		for i in 0..range.pages {
			let virt = range.virt + (i * PAGE_SIZE) as u64;
			let phys = range.phys + (i * PAGE_SIZE) as u64;
			let entry = self.entry_or_create(virt)?;
			entry.set_addr(PhysAddr::new(phys), flags);
			self.flush(virt);
		}
		let pos = self
			.ranges
			.iter()
			.position(|r| r.virt > range.virt)
			.unwrap_or(self.ranges.len());
		self.ranges.insert(pos, range);
		Ok(())
	}

	/// Maps `[virt, virt + pages * PAGE_SIZE)` to the physical memory at
	/// `phys`.
	///
	/// The function fails if the range overlaps an existing one, if `virt` or
	/// `phys` are not page-aligned, or if the range does not fit in the
	/// userspace half.
	pub fn map_range(
		&mut self,
		virt: u64,
		phys: u64,
		pages: usize,
		flags: MappingFlags,
	) -> EResult<()> {
		self.check_insert(virt, phys, pages)?;
		self.insert(MappingRange {
			virt,
			phys,
			pages,
			flags,
			allocated: false,
		})
	}

	/// Allocates `pages` zeroed frames and maps them at `virt`.
	///
	/// The backing frames are owned by the address space and freed on unmap.
	pub fn map_alloc(&mut self, virt: u64, pages: usize, flags: MappingFlags) -> EResult<()> {
		self.check_insert(virt, 0, pages)?;
		let phys = frame::alloc(pages)?;
		let res = self.insert(MappingRange {
			virt,
			phys,
			pages,
			flags,
			allocated: true,
		});
		if res.is_err() {
			frame::free(phys);
		}
		res
	}

	/// Updates the permissions of `[virt, virt + len)`.
	///
	/// The interval must be fully covered by a single existing range.
	pub fn remap_range(&mut self, virt: u64, len: usize, flags: MappingFlags) -> EResult<()> {
		if !memory::is_aligned(virt) {
			return Err(errno!(EINVAL));
		}
		let pages = memory::pages_for(len);
		let end = virt + (pages * PAGE_SIZE) as u64;
		let range = self
			.ranges
			.iter_mut()
			.find(|r| r.virt <= virt && end <= r.end())
			.ok_or_else(|| errno!(EINVAL))?;
		let covers_whole = range.virt == virt && range.end() == end;
		let (phys, allocated) = (range.phys, range.allocated);
		if covers_whole {
			range.flags = flags;
		} else {
			// Split the range so that flags stay uniform per range. For an
			// allocated range, the backing frame run is split along the same
			// boundaries so that each part owns its own frames
			let head_pages = ((virt - range.virt) as usize) / PAGE_SIZE;
			let mid_pages = pages;
			let tail_pages = range.pages - head_pages - mid_pages;
			let old = range.clone();
			range.pages = head_pages;
			if allocated {
				if head_pages > 0 {
					frame::split(phys, head_pages);
				}
				if tail_pages > 0 {
					frame::split(phys + (head_pages * PAGE_SIZE) as u64, mid_pages);
				}
			}
			let mut insert_pos = self.ranges.iter().position(|r| r.virt == old.virt).unwrap() + 1;
			if head_pages == 0 {
				self.ranges.remove(insert_pos - 1);
				insert_pos -= 1;
			}
			self.ranges.insert(
				insert_pos,
				MappingRange {
					virt,
					phys: phys + (head_pages * PAGE_SIZE) as u64,
					pages: mid_pages,
					flags,
					allocated,
				},
			);
			if tail_pages > 0 {
				self.ranges.insert(
					insert_pos + 1,
					MappingRange {
						virt: end,
						phys: phys + ((head_pages + mid_pages) * PAGE_SIZE) as u64,
						pages: tail_pages,
						flags: old.flags,
						allocated,
					},
				);
			}
		}
		let table_f = table_flags(flags);
		for i in 0..pages {
			let virt = virt + (i * PAGE_SIZE) as u64;
			if let Some(entry) = self.entry(virt) {
				entry.set_addr(entry.addr(), table_f);
				self.flush(virt);
			}
		}
		Ok(())
	}

	/// Unmaps `[virt, virt + len)`, freeing the backing frames of allocated
	/// ranges.
	///
	/// Gaps in the interval are ignored. An allocated range must be unmapped
	/// whole: partially unmapping one fails so that frame ownership stays
	/// unambiguous.
	pub fn unmap_range(&mut self, virt: u64, len: usize) -> EResult<()> {
		if !memory::is_aligned(virt) || len == 0 {
			return Err(errno!(EINVAL));
		}
		let pages = memory::pages_for(len);
		let end = virt + (pages * PAGE_SIZE) as u64;
		// Refuse to split an allocated range
		if self
			.ranges
			.iter()
			.any(|r| r.allocated && r.overlaps(virt, pages) && !(virt <= r.virt && r.end() <= end))
		{
			return Err(errno!(EINVAL));
		}
		let mut i = 0;
		while i < self.ranges.len() {
			let r = &self.ranges[i];
			if !r.overlaps(virt, pages) {
				i += 1;
				continue;
			}
			let r = self.ranges.remove(i);
			let cut_start = r.virt.max(virt);
			let cut_end = r.end().min(end);
			// Clear the entries of the intersection
			let mut v = cut_start;
			while v < cut_end {
				if let Some(entry) = self.entry(v) {
					entry.set_unused();
					self.flush(v);
				}
				v += PAGE_SIZE as u64;
			}
			if r.allocated {
				frame::free(r.phys);
				continue;
			}
			// Keep the parts of the range outside the window
			if r.virt < cut_start {
				let pages = ((cut_start - r.virt) as usize) / PAGE_SIZE;
				self.ranges.insert(
					i,
					MappingRange {
						pages,
						..r.clone()
					},
				);
				i += 1;
			}
			if cut_end < r.end() {
				let skip = ((cut_end - r.virt) as usize) / PAGE_SIZE;
				self.ranges.insert(
					i,
					MappingRange {
						virt: cut_end,
						phys: r.phys + (skip * PAGE_SIZE) as u64,
						pages: r.pages - skip,
						..r
					},
				);
				i += 1;
			}
		}
		Ok(())
	}

	/// Translates the virtual address `virt` to the corresponding physical
	/// address.
	///
	/// If the address is not mapped, the function returns `0`.
	pub fn virtual_to_physical(&self, virt: u64) -> u64 {
		let Some(entry) = self.entry(virt & !(PAGE_SIZE as u64 - 1)) else {
			return 0;
		};
		if !entry.flags().contains(PageTableFlags::PRESENT) {
			return 0;
		}
		entry.addr().as_u64() + (virt & (PAGE_SIZE as u64 - 1))
	}

	/// Tells whether `[addr, addr + len)` is entirely mapped and accessible
	/// from userspace in this space.
	///
	/// If `write` is set, the interval must also be writable.
	pub fn check_userland_access(&self, addr: u64, len: usize, write: bool) -> bool {
		if len == 0 {
			return true;
		}
		if !check_userland_mappability(addr, len) {
			return false;
		}
		let mut virt = addr & !(PAGE_SIZE as u64 - 1);
		let end = addr + len as u64;
		while virt < end {
			let Some(entry) = self.entry(virt) else {
				return false;
			};
			let flags = entry.flags();
			if !flags.contains(PageTableFlags::PRESENT | PageTableFlags::USER_ACCESSIBLE) {
				return false;
			}
			if write && !flags.contains(PageTableFlags::WRITABLE) {
				return false;
			}
			virt += PAGE_SIZE as u64;
		}
		true
	}

	/// Deep-copies the address space for `fork`.
	///
	/// Allocated user ranges get fresh frames with their contents copied
	/// byte-for-byte and the same permissions; other ranges keep referring to
	/// the same physical memory. The kernel half is shared.
	pub fn fork(&self) -> AllocResult<Self> {
		let mut new = Self::new()?;
		for r in &self.ranges {
			let res = if r.allocated {
				let phys = frame::alloc(r.pages)?;
				unsafe {
					core::ptr::copy_nonoverlapping(
						memory::phys_to_virt(r.phys),
						memory::phys_to_virt(phys),
						r.pages * PAGE_SIZE,
					);
				}
				new.insert(MappingRange {
					phys,
					..r.clone()
				})
			} else {
				new.insert(r.clone())
			};
			res.map_err(|_| AllocError)?;
		}
		Ok(new)
	}

	/// Finds a free region of `pages` pages, preferring `hint` when it is
	/// valid and available.
	pub fn find_free(&self, hint: u64, pages: usize) -> Option<u64> {
		let len = pages * PAGE_SIZE;
		let hint = hint & !(PAGE_SIZE as u64 - 1);
		if hint != 0
			&& check_userland_mappability(hint, len)
			&& !self.ranges.iter().any(|r| r.overlaps(hint, pages))
		{
			return Some(hint);
		}
		// First fit after the last mapping, falling back to a low address
		let mut candidate = PAGE_SIZE as u64;
		for r in &self.ranges {
			if candidate + len as u64 <= r.virt {
				break;
			}
			candidate = r.end();
		}
		check_userland_mappability(candidate, len).then_some(candidate)
	}
}

impl Drop for AddressSpace {
	fn drop(&mut self) {
		// Dropping the address space currently in use would pull the page
		// tables out from under our feet
		debug_assert!(!self.is_bound());
		// Free owned frames
		for r in &self.ranges {
			if r.allocated {
				frame::free(r.phys);
			}
		}
		// Free the userspace half of the paging structures
		let pml4 = unsafe { table_at(self.table) };
		for e3 in pml4.iter().take(256) {
			if !e3.flags().contains(PageTableFlags::PRESENT) {
				continue;
			}
			let pdpt = unsafe { table_at(e3.addr().as_u64()) };
			for e2 in pdpt.iter() {
				if !e2.flags().contains(PageTableFlags::PRESENT) {
					continue;
				}
				let pd = unsafe { table_at(e2.addr().as_u64()) };
				for e1 in pd.iter() {
					if e1.flags().contains(PageTableFlags::PRESENT) {
						frame::free(e1.addr().as_u64());
					}
				}
				frame::free(e2.addr().as_u64());
			}
			frame::free(e3.addr().as_u64());
		}
		frame::free(self.table);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn vmm_map_translate() {
		let mut space = AddressSpace::new().unwrap();
		let phys = frame::alloc(4).unwrap();
		space
			.map_range(0x10000, phys, 4, MappingFlags::USER)
			.unwrap();
		for k in [0u64, 1, PAGE_SIZE as u64, 4 * PAGE_SIZE as u64 - 1] {
			assert_eq!(space.virtual_to_physical(0x10000 + k), phys + k);
		}
		assert_eq!(space.virtual_to_physical(0x10000 + 4 * PAGE_SIZE as u64), 0);
		space.unmap_range(0x10000, 4 * PAGE_SIZE).unwrap();
		assert_eq!(space.virtual_to_physical(0x10000), 0);
		frame::free(phys);
	}

	#[test_case]
	fn vmm_no_overlap() {
		let mut space = AddressSpace::new().unwrap();
		space.map_alloc(0x10000, 4, MappingFlags::USER).unwrap();
		assert!(space.map_alloc(0x12000, 1, MappingFlags::USER).is_err());
		assert!(space
			.map_range(0x10000, 0, 1, MappingFlags::USER)
			.is_err());
	}

	#[test_case]
	fn vmm_rejects_kernel_half() {
		let mut space = AddressSpace::new().unwrap();
		assert!(space
			.map_alloc(crate::memory::KERNELSPACE_BASE, 1, MappingFlags::USER)
			.is_err());
		assert!(!check_userland_mappability(USERSPACE_END - PAGE_SIZE as u64, 2 * PAGE_SIZE));
		assert!(check_userland_mappability(0x1000, PAGE_SIZE));
	}

	#[test_case]
	fn vmm_fork_deep_copy() {
		let mut space = AddressSpace::new().unwrap();
		space.map_alloc(0x40000, 2, MappingFlags::USER).unwrap();
		let phys = space.virtual_to_physical(0x40000);
		unsafe {
			*memory::phys_to_virt(phys) = 0xab;
		}
		let child = space.fork().unwrap();
		let child_phys = child.virtual_to_physical(0x40000);
		assert_ne!(child_phys, 0);
		assert_ne!(child_phys, phys);
		unsafe {
			// Contents equal
			assert_eq!(*memory::phys_to_virt(child_phys), 0xab);
			// Mutating the child does not mutate the parent
			*memory::phys_to_virt(child_phys) = 0xcd;
			assert_eq!(*memory::phys_to_virt(phys), 0xab);
		}
	}
}
