//! Stack-based bytecode virtual machine.
//!
//! Provides a two-pass assembler for a line-oriented instruction language, a
//! typed stack interpreter for the resulting bytecode, and the configuration
//! and logging used by the `stackvm` binary.

pub mod config;
pub mod utils;
pub mod virtual_machine;
