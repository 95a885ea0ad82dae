//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_instruction!`](crate::for_each_instruction) macro holds
//! the canonical instruction definitions and invokes a callback macro for code
//! generation. This enables multiple modules to generate instruction-related
//! code without duplicating definitions.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - Per-instruction mnemonic, operand kind and encoded size
//!
//! # Bytecode Format
//!
//! Instructions use variable-length encoding:
//! - Opcode: 1 byte
//! - Immediate i32 (`PUSH`): 4 bytes (little-endian, signed)
//! - Immediate f64 (`PUSHF`): 8 bytes (little-endian IEEE-754)
//! - Jump target (`JMP`, `JZ`, `CALL`): 4 bytes (little-endian absolute offset)
//!
//! There is no header or length prefix; instruction boundaries are only known
//! by decoding from offset 0 (or any offset known to start an instruction).

use crate::virtual_machine::errors::RuntimeErrorKind;
use crate::virtual_machine::operand::OperandKind;

/// Invokes a callback macro with the complete instruction definition list.
///
/// This macro enables code generation for instructions in multiple modules
/// without duplicating the instruction definitions.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// NOP ; no effect
            Nop = 0x00, "NOP" => [],
            // =========================
            // Constants
            // =========================
            /// PUSH imm32 ; push Integer(imm32)
            Push = 0x01, "PUSH" => [value: ImmI32],
            /// PUSHF imm64 ; push Float(imm64)
            PushF = 0x02, "PUSHF" => [value: ImmF64],
            // =========================
            // Integer arithmetic
            // =========================
            /// ADD ; pop a, pop b, push b + a
            Add = 0x03, "ADD" => [],
            /// SUB ; pop a, pop b, push b - a
            Sub = 0x04, "SUB" => [],
            /// MUL ; pop a, pop b, push b * a
            Mul = 0x05, "MUL" => [],
            /// DIV ; pop a, pop b, push b / a (trap on division by zero)
            Div = 0x06, "DIV" => [],
            /// MOD ; pop a, pop b, push b % a (trap on modulo by zero)
            Mod = 0x07, "MOD" => [],
            /// INC ; top += 1
            Inc = 0x08, "INC" => [],
            /// DEC ; top -= 1
            Dec = 0x09, "DEC" => [],
            /// NEG ; top = -top
            Neg = 0x0A, "NEG" => [],
            // =========================
            // Float arithmetic
            // =========================
            /// ADDF ; pop a, pop b, push b + a (floats only)
            AddF = 0x0B, "ADDF" => [],
            /// MULF ; pop a, pop b, push b * a (floats only)
            MulF = 0x0C, "MULF" => [],
            // =========================
            // Stack
            // =========================
            /// DUP ; push a copy of the top value
            Dup = 0x0D, "DUP" => [],
            /// PRINT ; pop and write the value to program output
            Print = 0x0E, "PRINT" => [],
            /// POP ; discard the top value
            Pop = 0x0F, "POP" => [],
            // =========================
            // Memory
            // =========================
            /// LOAD ; pop addr, push mem[addr]
            Load = 0x10, "LOAD" => [],
            /// STORE ; pop addr, pop value, mem[addr] = value
            Store = 0x11, "STORE" => [],
            // =========================
            // Control Flow
            // =========================
            /// JMP target ; ip = target
            Jmp = 0x12, "JMP" => [target: Target],
            /// JZ target ; pop v, if v is zero then ip = target
            Jz = 0x13, "JZ" => [target: Target],
            /// CALL target ; push return address, ip = target
            Call = 0x14, "CALL" => [target: Target],
            /// RET ; ip = pop return address
            Ret = 0x15, "RET" => [],
            /// HALT ; stop execution
            Halt = 0xFF, "HALT" => [],
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Instruction {
            type Error = RuntimeErrorKind;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(RuntimeErrorKind::UnknownOpcode(value)),
                }
            }
        }

        impl Instruction {
            /// Every instruction, in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the kind of immediate that follows the opcode, if any.
            pub const fn operand(&self) -> Option<OperandKind> {
                match self {
                    $( Instruction::$name => define_instructions!(@operand $( $kind )*), )*
                }
            }
        }
    };

    (@operand) => { None };
    (@operand $kind:ident) => { Some(OperandKind::$kind) };
}

for_each_instruction!(define_instructions);

impl Instruction {
    /// Looks up an instruction by mnemonic, ignoring ASCII case.
    pub fn from_mnemonic(name: &str) -> Option<Instruction> {
        Self::ALL
            .iter()
            .copied()
            .find(|instr| instr.mnemonic().eq_ignore_ascii_case(name))
    }

    /// Returns the encoded size in bytes (opcode + immediate).
    pub const fn size(&self) -> usize {
        1 + match self.operand() {
            Some(kind) => kind.size(),
            None => 0,
        }
    }
}
