//! Stack-based bytecode virtual machine and its assembler.
//!
//! Source text is assembled into a flat bytecode buffer which the VM then
//! executes.
//!
//! # Architecture
//!
//! - **Values**: a typed operand stack of [`vm::Value`]s (`Integer`, `Float`);
//!   using the wrong tag is a runtime error, never a conversion
//! - **Calls**: `CALL`/`RET` use a separate bounded stack of return addresses
//! - **Memory**: a fixed array of `i32` cells addressed by `LOAD`/`STORE`
//! - **Instruction format**: opcode byte followed by an optional little-endian
//!   immediate (see [`isa`])
//! - **Tracing**: optionally, one `TRACE` line is written before every instruction
//!
//! # Modules
//!
//! - [`assembler`]: Two-pass assembly with label relocation and diagnostics
//! - [`disasm`]: Instruction decoding for traces and listings
//! - [`errors`]: Assembly and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Immediate encoding/decoding helpers
//! - [`program`]: Assembled program (bytecode + label table)
//! - [`vm`]: Core virtual machine implementation

pub mod assembler;
pub mod disasm;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod vm;
