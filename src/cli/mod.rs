// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Command line interface structs and functions, organized by subcommands
//! (SPEC_FULL.md §4.M), mirroring the teacher's own `src/cli/mod.rs` module
//! list plus the `impl_dispatch!` macro in `src/main.rs`.

pub mod dump;
pub mod tag;
pub mod train;
