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

//! Architecture-specific code.
//!
//! The kernel core is architecture-independent. Everything that touches the
//! hardware directly (interrupt plumbing, context frames, paging structures,
//! port I/O) lives under this module and is kept to the minimum interface the
//! core needs.

#[cfg(target_arch = "x86_64")]
pub mod x86;
