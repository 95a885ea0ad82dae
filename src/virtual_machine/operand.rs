//! Immediate operand encoding and decoding.
//!
//! All immediates are fixed-width little-endian. Jump targets share the
//! 4-byte layout of `PUSH` immediates and are unsigned absolute offsets; a
//! negative numeric target in source wraps to its two's complement.

use std::fmt;

/// Width of a `PUSH` immediate or jump target.
pub const WORD_SIZE: usize = 4;
/// Width of a `PUSHF` immediate.
pub const DOUBLE_SIZE: usize = 8;

/// Shape of the immediate following an opcode.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OperandKind {
    /// Signed 32-bit integer.
    ImmI32,
    /// IEEE-754 double.
    ImmF64,
    /// Absolute bytecode offset, written in source as a number or a label.
    Target,
}

impl OperandKind {
    /// Returns the encoded byte size of this operand.
    pub const fn size(&self) -> usize {
        match self {
            OperandKind::ImmI32 | OperandKind::Target => WORD_SIZE,
            OperandKind::ImmF64 => DOUBLE_SIZE,
        }
    }

    /// Decodes an operand of this kind from the start of `bytes`.
    ///
    /// Returns `None` if fewer than [`size`](Self::size) bytes are available.
    pub fn decode(&self, bytes: &[u8]) -> Option<Operand> {
        match self {
            OperandKind::ImmI32 => read_word(bytes).map(|w| Operand::Int(i32::from_le_bytes(w))),
            OperandKind::Target => read_word(bytes).map(|w| Operand::Target(u32::from_le_bytes(w))),
            OperandKind::ImmF64 => {
                let raw: [u8; DOUBLE_SIZE] = bytes.get(..DOUBLE_SIZE)?.try_into().ok()?;
                Some(Operand::Float(f64::from_le_bytes(raw)))
            }
        }
    }
}

/// Smallest decimal exponent printed in positional form.
const MIN_POSITIONAL_EXP: i32 = -5;
/// Largest decimal exponent printed in positional form.
const MAX_POSITIONAL_EXP: i32 = 15;

/// Writes `v` with the fewest digits that round-trip, in positional form
/// (`3`, `0.25`) or, for very large and very small magnitudes, exponent
/// form (`1e300`, `1.5e-7`).
pub fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v == 0.0 || !v.is_finite() {
        return write!(f, "{v}");
    }
    let scientific = format!("{v:e}");
    let exp = scientific
        .rsplit_once('e')
        .and_then(|(_, e)| e.parse::<i32>().ok())
        .unwrap_or(0);
    if (MIN_POSITIONAL_EXP..=MAX_POSITIONAL_EXP).contains(&exp) {
        write!(f, "{v}")
    } else {
        f.write_str(&scientific)
    }
}

fn read_word(bytes: &[u8]) -> Option<[u8; WORD_SIZE]> {
    bytes.get(..WORD_SIZE)?.try_into().ok()
}

/// A decoded immediate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Int(i32),
    Float(f64),
    Target(u32),
}

impl Operand {
    pub const fn kind(&self) -> OperandKind {
        match self {
            Operand::Int(_) => OperandKind::ImmI32,
            Operand::Float(_) => OperandKind::ImmF64,
            Operand::Target(_) => OperandKind::Target,
        }
    }

    /// Appends the little-endian encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Operand::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Operand::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            Operand::Target(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Float(v) => write_float(f, *v),
            Operand::Target(v) => write!(f, "{v}"),
        }
    }
}
