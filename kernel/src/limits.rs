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

//! Kernel limits.
//!
//! Bounded tables all over the kernel are sized by the constants in this
//! module. Exceeding a bound never truncates silently: the operation reports
//! the matching error instead.

/// The maximum length of a path in bytes.
pub const PATH_MAX: usize = 1024;
/// The maximum length of a file name in bytes.
pub const NAME_MAX: usize = 255;
/// The maximum length of the hostname in bytes.
pub const HOST_NAME_MAX: usize = 255;

/// The number of slots in a process's file descriptor table.
pub const OPEN_MAX: usize = 128;
/// The maximum number of children a process can have.
pub const CHILD_MAX: usize = 64;
/// The maximum number of processes running at once.
pub const PROCESS_MAX: usize = 256;
/// The maximum number of threads running at once.
pub const THREAD_MAX: usize = 512;

/// The maximum number of registered devices.
pub const DEVICE_MAX: usize = 64;
/// The maximum length of a device name in bytes.
pub const DEVICE_NAME_MAX: usize = 64;
/// The maximum number of mounted filesystems.
pub const MOUNT_MAX: usize = 16;
/// The maximum number of MAC filters per process.
pub const MAC_FILTER_MAX: usize = 32;

/// The size of a pipe's buffer in bytes.
pub const PIPE_BUF: usize = 4096;
/// The size of each PTY buffer in bytes.
pub const TTY_BUF_SIZE: usize = 4096;

/// The maximum number of symbolic links that can be dereferenced in a path
/// resolution.
pub const SYMLOOP_MAX: usize = 8;

/// The maximum total size of the arguments and environment passed to `exec`,
/// in bytes.
pub const ARG_MAX: usize = 131072;
