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

//! Encore is a small Unix-like kernel written in Rust.
//!
//! # Features
//!
//! The crate has the following features:
//! - `strace`: if enabled, the kernel traces every system call. This is a
//!   debug feature.

#![no_std]
#![feature(alloc_error_handler)]
#![feature(allocator_api)]
#![feature(custom_test_frameworks)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::tabs_in_doc_comments)]
#![test_runner(crate::selftest::runner)]
#![reexport_test_harness_main = "kernel_selftest"]

extern crate alloc;

pub mod arch;
pub mod boot;
pub mod cmdline;
pub mod device;
pub mod errno;
pub mod file;
pub mod integrity;
pub mod limits;
pub mod logger;
pub mod mac;
pub mod memory;
pub mod panic;
#[macro_use]
pub mod print;
pub mod process;
pub mod rand;
pub mod selftest;
pub mod sync;
pub mod syscall;
pub mod time;

use crate::{
	boot::BootInfo,
	errno::EResult,
	file::path::Path,
	process::exec,
	sync::mutex::Mutex,
};
use alloc::vec::Vec;

/// The kernel's name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Current kernel version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The path to the init process binary.
const INIT_PATH: &[u8] = b"/sbin/init";

/// The current hostname of the system.
pub static HOSTNAME: Mutex<Vec<u8>> = Mutex::new(Vec::new());

/// Launches the init process.
fn init(init_path: &[u8]) -> EResult<()> {
	let proc = process::create_process(None)?;
	let path = Path::root().compound(Path::new(init_path)?)?;
	let alloc_base = proc.lock().alloc_base;
	let argv = [init_path.to_vec()];
	let envp = [b"PATH=/bin:/sbin".to_vec(), b"TERM=encore".to_vec()];
	let image = exec::load(&path, &argv, &envp, alloc_base)?;
	exec::exec(&proc, image)
}

/// The main function of the kernel, responsible for its initialization.
///
/// The bootstrap code calls this function on the bootstrap core once it has
/// set up long mode, the direct physical mapping and the [`BootInfo`]
/// structure.
pub fn kernel_main(boot_info: &BootInfo) -> ! {
	// Architecture-specific initialization of the bootstrap core
	arch::x86::init_core();

	println!("Boot {NAME} version {VERSION}");

	// Initialize memory management
	println!("Setup memory management");
	memory::frame::init(boot_info.memory_map);
	memory::heap::init();
	memory::vmm::init();

	// From now on, the kernel considers that memory management has been
	// fully initialized
	logger::init();
	time::init(boot_info.boot_time);
	rand::init();

	// Parse the command line
	let cmdline = boot_info.cmdline.unwrap_or_default();
	let args = match cmdline::ArgsParser::parse(cmdline) {
		Ok(args) => args,
		Err(e) => {
			println!("{e}");
			cmdline::ArgsParser::default()
		}
	};
	logger::LOGGER.lock().silent = args.is_silent();

	println!("Setup scheduler");
	process::scheduler::init();
	process::init();

	// Perform kernel self-tests
	#[cfg(test)]
	kernel_selftest();

	println!("Setup devices management");
	device::init(boot_info).expect("devices initialization failed");

	println!("Setup files management");
	let root = args
		.get_root_dev()
		.map(device::fetch)
		.unwrap_or_default();
	file::init(root).expect("files management initialization failed");

	// Launch init
	let init_path = args.get_init_path().unwrap_or(INIT_PATH);
	println!(
		"Execute init process ({path})",
		path = init_path.escape_ascii()
	);
	match init(init_path) {
		Ok(()) => {}
		Err(e) => println!("init process execution failed: {e}"),
	}

	process::scheduler::start();
	// This context becomes the core's idle loop
	loop {
		process::scheduler::idle_core();
	}
}

/// Entry point for the non-bootstrap cores.
///
/// The bootstrap code calls this function on each application core after
/// [`kernel_main`] reached the scheduler setup.
pub fn kernel_ap_main() -> ! {
	arch::x86::init_core();
	loop {
		process::scheduler::idle_core();
	}
}
