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

//! Kernel command line arguments parsing.

use core::fmt;

/// Command line arguments parser.
#[derive(Default)]
pub struct ArgsParser<'s> {
	/// The device to mount as the root filesystem.
	root: Option<&'s [u8]>,
	/// The path to the init binary.
	init: Option<&'s [u8]>,
	/// Whether the logger is silenced.
	silent: bool,
}

/// An error occurring while parsing the command line.
#[derive(Debug)]
pub struct ParseError<'s> {
	/// The name of the erroneous argument.
	arg: &'s [u8],
	/// The error description.
	reason: &'static str,
}

impl fmt::Display for ParseError<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"command line argument `{}`: {}",
			self.arg.escape_ascii(),
			self.reason
		)
	}
}

impl<'s> ArgsParser<'s> {
	/// Parses the given command line.
	pub fn parse(cmdline: &'s [u8]) -> Result<Self, ParseError<'s>> {
		let mut s = Self::default();
		let mut words = cmdline.split(|b| b.is_ascii_whitespace()).filter(|w| !w.is_empty());
		while let Some(word) = words.next() {
			match word {
				b"-root" => {
					s.root = Some(words.next().ok_or(ParseError {
						arg: word,
						reason: "missing device path",
					})?);
				}
				b"-init" => {
					s.init = Some(words.next().ok_or(ParseError {
						arg: word,
						reason: "missing init path",
					})?);
				}
				b"-silent" => s.silent = true,
				_ => {
					return Err(ParseError {
						arg: word,
						reason: "unknown argument",
					});
				}
			}
		}
		Ok(s)
	}

	/// Returns the root device name, if specified.
	pub fn get_root_dev(&self) -> Option<&'s [u8]> {
		self.root
	}

	/// Returns the init path, if specified.
	pub fn get_init_path(&self) -> Option<&'s [u8]> {
		self.init
	}

	/// Tells whether the logger is silenced.
	pub fn is_silent(&self) -> bool {
		self.silent
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test_case]
	fn cmdline_empty() {
		let args = ArgsParser::parse(b"").unwrap();
		assert!(args.get_root_dev().is_none());
		assert!(args.get_init_path().is_none());
		assert!(!args.is_silent());
	}

	#[test_case]
	fn cmdline_args() {
		let args = ArgsParser::parse(b"-init /bin/sh -silent").unwrap();
		assert_eq!(args.get_init_path(), Some(b"/bin/sh".as_slice()));
		assert!(args.is_silent());
	}

	#[test_case]
	fn cmdline_invalid() {
		assert!(ArgsParser::parse(b"-init").is_err());
		assert!(ArgsParser::parse(b"-foo bar").is_err());
	}
}
