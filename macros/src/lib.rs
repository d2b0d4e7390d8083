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

//! Procedural macros for the kernel.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput};

/// Implements the `AnyRepr` marker, allowing to reinterpret memory coming from
/// userspace as the given structure.
///
/// The structure must be `repr(C)` and every field must itself be valid for
/// any bit pattern.
#[proc_macro_derive(AnyRepr)]
pub fn any_repr(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let ident = input.ident;
	match input.data {
		Data::Struct(_) | Data::Union(_) => {}
		Data::Enum(_) => {
			return syn::Error::new_spanned(ident, "an enum cannot be valid for any bit pattern")
				.to_compile_error()
				.into();
		}
	}
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
	quote! {
		unsafe impl #impl_generics crate::memory::user::AnyRepr for #ident #ty_generics #where_clause {}
	}
	.into()
}
