//! Assembled program representation.
//!
//! [`Program`] is the assembler's output: the flat bytecode buffer plus the
//! label table that was used to resolve it. The bytecode carries no header or
//! length prefix; its length is the buffer length.

use crate::virtual_machine::disasm::{self, DecodedInstr};
use crate::virtual_machine::errors::RuntimeError;
use std::collections::HashMap;

/// Compiled bytecode with its resolved labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Opcodes interleaved with little-endian immediates.
    pub code: Vec<u8>,
    /// Label names mapped to the byte offset they were defined at.
    pub labels: HashMap<String, u32>,
}

impl Program {
    /// Number of bytecode bytes.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Returns the offset bound to `name`, if defined.
    pub fn label(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    /// Decodes every instruction from offset 0.
    pub fn disassemble(&self) -> Result<Vec<DecodedInstr>, RuntimeError> {
        disasm::disassemble(&self.code)
    }

    /// Renders the `offset: instruction` listing of the whole program.
    pub fn listing(&self) -> Result<String, RuntimeError> {
        disasm::listing(&self.code)
    }

    /// Consumes the program, keeping only the bytecode.
    pub fn into_code(self) -> Vec<u8> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::Instruction;

    #[test]
    fn empty_program() {
        let program = Program::default();
        assert!(program.is_empty());
        assert_eq!(program.len(), 0);
        assert!(program.disassemble().unwrap().is_empty());
    }

    #[test]
    fn listing_covers_every_instruction() {
        let mut code = vec![Instruction::Push as u8];
        code.extend_from_slice(&(-4i32).to_le_bytes());
        code.push(Instruction::Print as u8);
        code.push(Instruction::Halt as u8);
        let program = Program {
            code,
            labels: HashMap::new(),
        };
        assert_eq!(program.listing().unwrap(), "0000: PUSH -4\n0005: PRINT\n0006: HALT\n");
    }

    #[test]
    fn label_lookup() {
        let mut program = Program::default();
        program.labels.insert("start".to_string(), 0);
        program.labels.insert("end".to_string(), 9);
        assert_eq!(program.label("end"), Some(9));
        assert_eq!(program.label("End"), None);
    }
}
