//! Core virtual machine implementation.
//!
//! The VM executes bytecode against a typed operand stack, a separate stack of
//! return addresses and a flat integer memory. Integer arithmetic uses wrapping
//! semantics to prevent overflow panics; every other failure is a fatal
//! [`RuntimeError`] tagged with the offset of the faulting instruction.

mod memory;
mod stack;
mod trace;

pub use stack::Value;

use crate::debug;
use crate::virtual_machine::errors::{RuntimeError, RuntimeErrorKind};
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{DOUBLE_SIZE, WORD_SIZE};
use memory::Memory;
use stack::{CallStack, OperandStack};
use std::io::{self, Write};

/// Default operand stack capacity.
pub const STACK_SIZE: usize = 1024;
/// Default call-return stack capacity.
pub const CALL_STACK_SIZE: usize = 1024;
/// Default number of memory cells.
pub const MEMORY_SIZE: usize = 4096;
/// Default number of stack slots shown per trace line.
pub const TRACE_WINDOW: usize = 8;

/// Runtime limits and tracing switches for a [`VM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum operand stack depth.
    pub max_stack: usize,
    /// Maximum number of nested `CALL`s.
    pub max_call_depth: usize,
    /// Number of `i32` memory cells.
    pub memory_size: usize,
    /// Write a `TRACE` line before every instruction.
    pub trace: bool,
    /// Stack slots shown in each trace line.
    pub trace_window: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack: STACK_SIZE,
            max_call_depth: CALL_STACK_SIZE,
            memory_size: MEMORY_SIZE,
            trace: true,
            trace_window: TRACE_WINDOW,
        }
    }
}

/// Result of a single [`VM::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More instructions may follow.
    Continue,
    /// `HALT` executed or the pointer left the bytecode.
    Halted,
}

fn output_error(err: io::Error) -> RuntimeErrorKind {
    RuntimeErrorKind::Output(err.to_string())
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        out = $out:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    let instr_name = $instr.mnemonic();
                    exec_vm!(@call $vm, $out, instr_name, $handler, $args)
                }
            ),*
        }
    }};

    // Handler writing program output (semicolon separator)
    (@call $vm:ident, $out:ident, $instr_name:expr, $handler:ident,
        (out; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $vm, $instr_name, $kind); )*
        $vm.$handler($instr_name, $out, $( $field ),*)
    }};

    // Handler without output (no semicolon)
    (@call $vm:ident, $out:ident, $instr_name:expr, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $vm, $instr_name, $kind); )*
        $vm.$handler($instr_name, $( $field ),*)
    }};

    // Decode an i32 immediate (little-endian, 4 bytes)
    (@read $vm:ident, $instr_name:expr, ImmI32) => {
        i32::from_le_bytes($vm.read_array::<WORD_SIZE>($instr_name)?)
    };

    // Decode an f64 immediate (little-endian, 8 bytes)
    (@read $vm:ident, $instr_name:expr, ImmF64) => {
        f64::from_le_bytes($vm.read_array::<DOUBLE_SIZE>($instr_name)?)
    };

    // Decode an absolute target (little-endian u32, 4 bytes)
    (@read $vm:ident, $instr_name:expr, Target) => {
        u32::from_le_bytes($vm.read_array::<WORD_SIZE>($instr_name)?) as usize
    };
}

/// Bytecode virtual machine.
///
/// Executes bytecode from offset 0 until `HALT` or until the instruction
/// pointer leaves the buffer. Each machine owns all of its state, so several
/// can run side by side.
pub struct VM {
    /// Bytecode to execute.
    code: Vec<u8>,
    /// Instruction pointer (offset of the next opcode).
    ip: usize,
    stack: OperandStack,
    calls: CallStack,
    memory: Memory,
    config: VmConfig,
    halted: bool,
}

impl VM {
    /// Creates a VM with default limits and tracing on.
    pub fn new(code: Vec<u8>) -> Self {
        Self::with_config(code, VmConfig::default())
    }

    pub fn with_config(code: Vec<u8>, config: VmConfig) -> Self {
        Self {
            code,
            ip: 0,
            stack: OperandStack::new(config.max_stack),
            calls: CallStack::new(config.max_call_depth),
            memory: Memory::new(config.memory_size),
            config,
            halted: false,
        }
    }

    /// Operand stack, bottom to top.
    pub fn stack(&self) -> &[Value] {
        self.stack.as_slice()
    }

    pub fn memory(&self) -> &[i32] {
        self.memory.as_slice()
    }

    /// Offset of the next instruction to execute.
    pub fn ip(&self) -> usize {
        self.ip
    }

    /// Number of pending `CALL` return addresses.
    pub fn call_depth(&self) -> usize {
        self.calls.depth()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Executes until halt or error.
    ///
    /// Trace lines and `PRINT` output are written to `out` in execution order.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<(), RuntimeError> {
        while self.step(out)? == Step::Continue {}
        debug!(
            "execution finished at ip={:04} with {} values on the stack",
            self.ip,
            self.stack.as_slice().len()
        );
        Ok(())
    }

    /// Executes exactly one instruction.
    ///
    /// The trace line, when enabled, is written before the instruction takes
    /// effect, so it also precedes a failing instruction's error.
    pub fn step<W: Write>(&mut self, out: &mut W) -> Result<Step, RuntimeError> {
        if self.halted || self.ip >= self.code.len() {
            self.halted = true;
            return Ok(Step::Halted);
        }

        let offset = self.ip;
        let at = |kind: RuntimeErrorKind| RuntimeError::new(offset, kind);

        if self.config.trace {
            let window = self.stack.snapshot(self.config.trace_window);
            trace::write_trace(out, &self.code, offset, window)
                .map_err(|e| at(output_error(e)))?;
        }

        let opcode = self.code[offset];
        self.ip += 1;
        let instr = Instruction::try_from(opcode).map_err(at)?;
        self.exec(instr, out).map_err(at)?;

        Ok(if self.halted {
            Step::Halted
        } else {
            Step::Continue
        })
    }

    /// Reads the next `N` bytes as an immediate and advances past them.
    fn read_array<const N: usize>(
        &mut self,
        instr: &'static str,
    ) -> Result<[u8; N], RuntimeErrorKind> {
        let start = self.ip;
        let bytes: [u8; N] = self
            .code
            .get(start..start.saturating_add(N))
            .and_then(|slice| slice.try_into().ok())
            .ok_or(RuntimeErrorKind::TruncatedInstruction {
                mnemonic: instr,
                needed: N,
                available: self.code.len().saturating_sub(start),
            })?;
        self.ip = start + N;
        Ok(bytes)
    }

    /// Decodes the operands of `instruction` and applies its effect.
    fn exec<W: Write>(
        &mut self,
        instruction: Instruction,
        out: &mut W,
    ) -> Result<(), RuntimeErrorKind> {
        exec_vm! {
            vm = self,
            out = out,
            instr = instruction,
            {
                Nop => op_nop(),
                // Constants
                Push => op_push(value: ImmI32),
                PushF => op_push_f(value: ImmF64),
                // Integer arithmetic
                Add => op_add(),
                Sub => op_sub(),
                Mul => op_mul(),
                Div => op_div(),
                Mod => op_mod(),
                Inc => op_inc(),
                Dec => op_dec(),
                Neg => op_neg(),
                // Float arithmetic
                AddF => op_add_f(),
                MulF => op_mul_f(),
                // Stack
                Dup => op_dup(),
                Print => op_print(out;),
                Pop => op_pop(),
                // Memory
                Load => op_load(),
                Store => op_store(),
                // Control Flow
                Jmp => op_jmp(target: Target),
                Jz => op_jz(target: Target),
                Call => op_call(target: Target),
                Ret => op_ret(),
                Halt => op_halt(),
            }
        }
    }

    fn op_nop(&mut self, _instr: &'static str) -> Result<(), RuntimeErrorKind> {
        Ok(())
    }

    fn op_push(&mut self, _instr: &'static str, value: i32) -> Result<(), RuntimeErrorKind> {
        self.stack.push(Value::Integer(value))
    }

    fn op_push_f(&mut self, _instr: &'static str, value: f64) -> Result<(), RuntimeErrorKind> {
        self.stack.push(Value::Float(value))
    }

    fn op_add(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_int(instr)?;
        let b = self.stack.pop_int(instr)?;
        self.stack.push(Value::Integer(b.wrapping_add(a)))
    }

    fn op_sub(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_int(instr)?;
        let b = self.stack.pop_int(instr)?;
        self.stack.push(Value::Integer(b.wrapping_sub(a)))
    }

    fn op_mul(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_int(instr)?;
        let b = self.stack.pop_int(instr)?;
        self.stack.push(Value::Integer(b.wrapping_mul(a)))
    }

    fn op_div(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_int(instr)?;
        let b = self.stack.pop_int(instr)?;
        if a == 0 {
            return Err(RuntimeErrorKind::DivisionByZero);
        }
        self.stack.push(Value::Integer(b.wrapping_div(a)))
    }

    fn op_mod(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_int(instr)?;
        let b = self.stack.pop_int(instr)?;
        if a == 0 {
            return Err(RuntimeErrorKind::ModuloByZero);
        }
        self.stack.push(Value::Integer(b.wrapping_rem(a)))
    }

    fn op_inc(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let v = self.stack.pop_int(instr)?;
        self.stack.push(Value::Integer(v.wrapping_add(1)))
    }

    fn op_dec(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let v = self.stack.pop_int(instr)?;
        self.stack.push(Value::Integer(v.wrapping_sub(1)))
    }

    fn op_neg(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let v = self.stack.pop_int(instr)?;
        self.stack.push(Value::Integer(v.wrapping_neg()))
    }

    fn op_add_f(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_float(instr)?;
        let b = self.stack.pop_float(instr)?;
        self.stack.push(Value::Float(b + a))
    }

    fn op_mul_f(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let a = self.stack.pop_float(instr)?;
        let b = self.stack.pop_float(instr)?;
        self.stack.push(Value::Float(b * a))
    }

    fn op_dup(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let v = self.stack.peek(instr)?;
        self.stack.push(v)
    }

    fn op_print<W: Write>(
        &mut self,
        instr: &'static str,
        out: &mut W,
    ) -> Result<(), RuntimeErrorKind> {
        let v = self.stack.pop(instr)?;
        writeln!(out, "{v}").map_err(output_error)
    }

    fn op_pop(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        self.stack.pop(instr).map(|_| ())
    }

    fn op_load(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        let address = self.stack.pop_int(instr)?;
        let v = self.memory.load(instr, address)?;
        self.stack.push(Value::Integer(v))
    }

    fn op_store(&mut self, instr: &'static str) -> Result<(), RuntimeErrorKind> {
        // Address is popped and validated before the value is touched.
        let address = self.stack.pop_int(instr)?;
        self.memory.check(instr, address)?;
        let value = self.stack.pop_int(instr)?;
        self.memory.store(instr, address, value)
    }

    fn op_jmp(&mut self, _instr: &'static str, target: usize) -> Result<(), RuntimeErrorKind> {
        self.ip = target;
        Ok(())
    }

    fn op_jz(&mut self, instr: &'static str, target: usize) -> Result<(), RuntimeErrorKind> {
        if self.stack.pop(instr)?.is_zero() {
            self.ip = target;
        }
        Ok(())
    }

    fn op_call(&mut self, _instr: &'static str, target: usize) -> Result<(), RuntimeErrorKind> {
        self.calls.push(self.ip)?;
        self.ip = target;
        Ok(())
    }

    fn op_ret(&mut self, _instr: &'static str) -> Result<(), RuntimeErrorKind> {
        self.ip = self.calls.pop()?;
        Ok(())
    }

    fn op_halt(&mut self, _instr: &'static str) -> Result<(), RuntimeErrorKind> {
        self.halted = true;
        Ok(())
    }
}

/// Runs `code` on a fresh VM with default limits and tracing on.
pub fn execute<W: Write>(code: Vec<u8>, out: &mut W) -> Result<(), RuntimeError> {
    VM::new(code).run(out)
}
