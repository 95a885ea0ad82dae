use super::stack::Value;
use crate::virtual_machine::disasm::describe_at;
use std::io::{self, Write};

/// Writes one trace line for the instruction at `offset`:
///
/// ```text
/// TRACE ip=0005 PUSH   3 [stack: 2 ]
/// ```
///
/// The immediate is shown only when fully present in `code`.
pub(super) fn write_trace<W: Write>(
    out: &mut W,
    code: &[u8],
    offset: usize,
    window: &[Value],
) -> io::Result<()> {
    let (mnemonic, operand) = describe_at(code, offset);
    write!(out, "TRACE ip={offset:04} {mnemonic:<6}")?;
    if let Some(operand) = operand {
        write!(out, " {operand}")?;
    }
    out.write_all(b" [stack:")?;
    for v in window {
        write!(out, " {v}")?;
    }
    out.write_all(b" ]\n")
}
