//! Bytecode decoder shared by the execution trace and program listings.
//!
//! Decoding always starts from an offset known to begin an instruction; the
//! bytecode has no table to find boundaries otherwise.

use crate::virtual_machine::errors::{RuntimeError, RuntimeErrorKind};
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::Operand;
use std::fmt;

/// Mnemonic shown for bytes that are not a known opcode.
pub const UNKNOWN_MNEMONIC: &str = "UNK";

/// One instruction decoded at a known offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedInstr {
    /// Offset of the opcode byte.
    pub offset: usize,
    pub instruction: Instruction,
    /// Immediate, for instructions that carry one.
    pub operand: Option<Operand>,
}

impl DecodedInstr {
    /// Offset of the next instruction.
    pub fn next_offset(&self) -> usize {
        self.offset + self.instruction.size()
    }
}

impl fmt::Display for DecodedInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.instruction.mnemonic(), operand),
            None => f.write_str(self.instruction.mnemonic()),
        }
    }
}

/// Decodes the instruction starting at `offset`.
///
/// Fails with [`RuntimeErrorKind::UnknownOpcode`] or
/// [`RuntimeErrorKind::TruncatedInstruction`]; `offset` must be in bounds.
pub fn decode_at(code: &[u8], offset: usize) -> Result<DecodedInstr, RuntimeError> {
    let opcode = *code.get(offset).ok_or(RuntimeError::new(
        offset,
        RuntimeErrorKind::TruncatedInstruction {
            mnemonic: UNKNOWN_MNEMONIC,
            needed: 1,
            available: 0,
        },
    ))?;
    let instruction =
        Instruction::try_from(opcode).map_err(|kind| RuntimeError::new(offset, kind))?;

    let operand = match instruction.operand() {
        None => None,
        Some(kind) => {
            let rest = &code[offset + 1..];
            let operand = kind.decode(rest).ok_or(RuntimeError::new(
                offset,
                RuntimeErrorKind::TruncatedInstruction {
                    mnemonic: instruction.mnemonic(),
                    needed: kind.size(),
                    available: rest.len(),
                },
            ))?;
            Some(operand)
        }
    };

    Ok(DecodedInstr {
        offset,
        instruction,
        operand,
    })
}

/// Best-effort view of the instruction at `offset` for tracing.
///
/// Never fails: unknown opcodes show as [`UNKNOWN_MNEMONIC`] and a truncated
/// immediate is simply omitted.
pub fn describe_at(code: &[u8], offset: usize) -> (&'static str, Option<Operand>) {
    let Some(instruction) = code
        .get(offset)
        .and_then(|&op| Instruction::try_from(op).ok())
    else {
        return (UNKNOWN_MNEMONIC, None);
    };

    let operand = instruction
        .operand()
        .and_then(|kind| kind.decode(&code[offset + 1..]));
    (instruction.mnemonic(), operand)
}

/// Decodes a whole bytecode buffer from offset 0.
pub fn disassemble(code: &[u8]) -> Result<Vec<DecodedInstr>, RuntimeError> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let decoded = decode_at(code, offset)?;
        offset = decoded.next_offset();
        out.push(decoded);
    }
    Ok(out)
}

/// Renders a listing with one `offset: instruction` line per instruction.
pub fn listing(code: &[u8]) -> Result<String, RuntimeError> {
    let mut out = String::new();
    for decoded in disassemble(code)? {
        out.push_str(&format!("{:04}: {}\n", decoded.offset, decoded));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(v: i32) -> Vec<u8> {
        let mut out = vec![Instruction::Push as u8];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }

    #[test]
    fn decode_push() {
        let code = push(-3);
        let decoded = decode_at(&code, 0).unwrap();
        assert_eq!(decoded.instruction, Instruction::Push);
        assert_eq!(decoded.operand, Some(Operand::Int(-3)));
        assert_eq!(decoded.next_offset(), 5);
        assert_eq!(decoded.to_string(), "PUSH -3");
    }

    #[test]
    fn decode_no_operand() {
        let code = [Instruction::Add as u8, Instruction::Halt as u8];
        let decoded = decode_at(&code, 1).unwrap();
        assert_eq!(decoded.instruction, Instruction::Halt);
        assert_eq!(decoded.operand, None);
        assert_eq!(decoded.to_string(), "HALT");
    }

    #[test]
    fn decode_unknown_opcode() {
        let err = decode_at(&[0x00, 0x42], 1).unwrap_err();
        assert_eq!(err, RuntimeError::new(1, RuntimeErrorKind::UnknownOpcode(0x42)));
    }

    #[test]
    fn decode_truncated_immediate() {
        let code = [Instruction::PushF as u8, 0, 0, 0];
        let err = decode_at(&code, 0).unwrap_err();
        assert_eq!(
            err.kind,
            RuntimeErrorKind::TruncatedInstruction {
                mnemonic: "PUSHF",
                needed: 8,
                available: 3,
            }
        );
    }

    #[test]
    fn describe_tolerates_bad_bytes() {
        assert_eq!(describe_at(&[0x99], 0), ("UNK", None));
        assert_eq!(describe_at(&[Instruction::Jmp as u8, 1], 0), ("JMP", None));
        let code = push(9);
        assert_eq!(describe_at(&code, 0), ("PUSH", Some(Operand::Int(9))));
    }

    #[test]
    fn disassemble_sequence() {
        let mut code = push(1);
        code.push(Instruction::Print as u8);
        code.push(Instruction::Jmp as u8);
        code.extend_from_slice(&0u32.to_le_bytes());

        let listing = listing(&code).unwrap();
        assert_eq!(listing, "0000: PUSH 1\n0005: PRINT\n0006: JMP 0\n");
    }
}
