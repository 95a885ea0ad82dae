//! Assembly language parser and bytecode compiler.
//!
//! Converts human-readable assembly source into executable bytecode.
//!
//! # Syntax
//!
//! ```text
//! [label:] [MNEMONIC [operand]]   ; optional comment
//! ```
//!
//! - Mnemonics are case-insensitive (e.g., `PUSH`, `push`, `Jz`)
//! - Integers are decimal or `0x` hex with an optional sign (e.g., `42`, `-0x1F`)
//! - Floats use the usual decimal/exponent notation (e.g., `1.5`, `-2e3`)
//! - Jump and call targets are a label name or a numeric absolute offset
//! - Comments start with `;` or `#` and run to the end of the line
//! - Commas between tokens are optional
//!
//! # Passes
//!
//! 1. Scan: every line is parsed once; labels are bound to the current write
//!    offset and instructions are emitted immediately. A jump/call naming a
//!    label emits a zero placeholder and records a relocation.
//! 2. Resolve: every relocation is looked up in the label table and its
//!    placeholder is patched in place. This is what makes forward references
//!    legal.

use crate::debug;
use crate::virtual_machine::errors::{AsmErrorKind, AssemblyError, VMError};
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{Operand, OperandKind, WORD_SIZE};
use crate::virtual_machine::program::Program;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHARS: [char; 2] = [';', '#'];
const LABEL_SUFFIX: char = ':';

/// Default bytecode buffer capacity in bytes.
pub const CODE_CAPACITY: usize = 131_072;
/// Default maximum number of label definitions.
pub const MAX_LABELS: usize = 2048;
/// Default maximum number of unresolved label references.
pub const MAX_RELOCATIONS: usize = 2048;
/// Default maximum tokens on one line (mnemonic, operand, one spare).
pub const MAX_TOKENS_PER_LINE: usize = 3;

/// Capacities enforced while assembling.
///
/// Exceeding any of them is a fatal [`AssemblyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsmLimits {
    /// Maximum bytecode size in bytes.
    pub code_capacity: usize,
    pub max_labels: usize,
    pub max_relocations: usize,
    pub max_tokens_per_line: usize,
}

impl Default for AsmLimits {
    fn default() -> Self {
        Self {
            code_capacity: CODE_CAPACITY,
            max_labels: MAX_LABELS,
            max_relocations: MAX_RELOCATIONS,
            max_tokens_per_line: MAX_TOKENS_PER_LINE,
        }
    }
}

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(file: &str, source: &str, err: &AssemblyError) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {}", err.kind);
    let _ = writeln!(diag, " --> {file}:{}:{}", err.line, err.column);

    if let Some(raw_line) = source.lines().nth(err.line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(err.column.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", err.line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

/// A jump/call operand slot waiting for its label.
#[derive(Debug, Clone)]
struct Relocation {
    label: String,
    /// Offset of the 4-byte placeholder.
    patch_pos: usize,
    line: usize,
    column: usize,
}

/// Assembly state: output buffer, label table and pending relocations.
pub struct AsmContext {
    limits: AsmLimits,
    code: Vec<u8>,
    labels: HashMap<String, u32>,
    relocations: Vec<Relocation>,
}

impl AsmContext {
    /// Creates an empty assembly context.
    pub fn new(limits: AsmLimits) -> Self {
        Self {
            limits,
            code: Vec::new(),
            labels: HashMap::new(),
            relocations: Vec::new(),
        }
    }

    /// Current write offset.
    fn offset(&self) -> Result<u32, AsmErrorKind> {
        u32::try_from(self.code.len()).map_err(|_| AsmErrorKind::BytecodeOverflow {
            capacity: self.limits.code_capacity,
        })
    }

    /// Binds `name` to the current write offset. Redefinition is rejected.
    fn define_label(&mut self, name: &str) -> Result<(), AsmErrorKind> {
        if self.labels.contains_key(name) {
            return Err(AsmErrorKind::DuplicateLabel(name.to_string()));
        }
        if self.labels.len() >= self.limits.max_labels {
            return Err(AsmErrorKind::TooManyLabels {
                limit: self.limits.max_labels,
            });
        }
        let offset = self.offset()?;
        self.labels.insert(name.to_string(), offset);
        Ok(())
    }

    fn ensure_room(&self, bytes: usize) -> Result<(), AsmErrorKind> {
        if self.code.len() + bytes > self.limits.code_capacity {
            return Err(AsmErrorKind::BytecodeOverflow {
                capacity: self.limits.code_capacity,
            });
        }
        Ok(())
    }

    fn emit_opcode(&mut self, instr: Instruction) -> Result<(), AsmErrorKind> {
        self.ensure_room(1)?;
        self.code.push(instr as u8);
        Ok(())
    }

    fn emit_operand(&mut self, operand: Operand) -> Result<(), AsmErrorKind> {
        self.ensure_room(operand.kind().size())?;
        operand.encode(&mut self.code);
        Ok(())
    }

    /// Emits a zero placeholder and records it for the resolve pass.
    fn emit_relocation(&mut self, label: &str, line: usize, column: usize) -> Result<(), AsmErrorKind> {
        if self.relocations.len() >= self.limits.max_relocations {
            return Err(AsmErrorKind::TooManyRelocations {
                limit: self.limits.max_relocations,
            });
        }
        let patch_pos = self.code.len();
        self.emit_operand(Operand::Target(0))?;
        self.relocations.push(Relocation {
            label: label.to_string(),
            patch_pos,
            line,
            column,
        });
        Ok(())
    }

    /// Second pass: patches every placeholder with its label's offset.
    fn resolve_relocations(&mut self) -> Result<(), AssemblyError> {
        for reloc in &self.relocations {
            let target = self.labels.get(&reloc.label).copied().ok_or_else(|| {
                AssemblyError::new(
                    reloc.line,
                    reloc.column,
                    AsmErrorKind::UndefinedLabel(reloc.label.clone()),
                )
            })?;
            self.code[reloc.patch_pos..reloc.patch_pos + WORD_SIZE]
                .copy_from_slice(&target.to_le_bytes());
        }
        Ok(())
    }

    fn finish(self) -> Program {
        Program {
            code: self.code,
            labels: self.labels,
        }
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    column: usize,
}

/// Cuts a line at its first comment marker.
fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_CHARS) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Tokenize the instruction part of a line.
///
/// `base` is the byte index of `text` within the full line, used for columns.
/// Tokens are separated by whitespace and/or commas.
fn tokenize(text: &str, base: usize) -> Vec<Token<'_>> {
    let mut out = Vec::with_capacity(MAX_TOKENS_PER_LINE);
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() || c == ',' {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &text[s..i],
                    column: base + s + 1,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        out.push(Token {
            text: &text[s..],
            column: base + s + 1,
        });
    }

    out
}

/// Reports whether `tok` is shaped like an integer literal: optional sign,
/// then `0x`/`0X` and hex digits, or decimal digits.
///
/// Jump targets are classified with this before falling back to a label
/// reference, so a label named like a number can never be referenced.
pub(crate) fn is_numeric_token(tok: &str) -> bool {
    let body = tok.strip_prefix(['+', '-']).unwrap_or(tok);
    match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()),
    }
}

/// Parses a 32-bit integer literal.
///
/// Values up to `u32::MAX` are accepted and reinterpreted as two's
/// complement, so `0xFFFFFFFF` is `-1`.
pub(crate) fn parse_i32(tok: &str) -> Result<i32, AsmErrorKind> {
    let invalid = || AsmErrorKind::InvalidInteger(tok.to_string());
    if !is_numeric_token(tok) {
        return Err(invalid());
    }

    let (negative, body) = match tok.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, tok.strip_prefix('+').unwrap_or(tok)),
    };
    let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => body.parse::<i64>(),
    }
    .map_err(|_| invalid())?;

    let value = if negative { -magnitude } else { magnitude };
    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(value as u32 as i32)
}

/// Parses a floating-point literal; integer literals (including hex) are
/// accepted too.
pub(crate) fn parse_f64(tok: &str) -> Result<f64, AsmErrorKind> {
    if let Ok(v) = tok.parse::<f64>() {
        return Ok(v);
    }
    parse_i32(tok)
        .map(f64::from)
        .map_err(|_| AsmErrorKind::InvalidFloat(tok.to_string()))
}

/// Parse one instruction from tokens and emit it.
///
/// On failure returns the column to report alongside the error.
fn parse_instruction(
    ctx: &mut AsmContext,
    line_no: usize,
    tokens: &[Token],
) -> Result<(), (usize, AsmErrorKind)> {
    let head = &tokens[0];
    let instr = Instruction::from_mnemonic(head.text)
        .ok_or_else(|| (head.column, AsmErrorKind::UnknownInstruction(head.text.to_string())))?;

    let expected = 1 + usize::from(instr.operand().is_some());
    if let Some(extra) = tokens.get(expected) {
        return Err((
            extra.column,
            AsmErrorKind::UnexpectedOperand {
                mnemonic: instr.mnemonic(),
                token: extra.text.to_string(),
            },
        ));
    }

    let Some(kind) = instr.operand() else {
        return ctx.emit_opcode(instr).map_err(|e| (head.column, e));
    };

    let tok = tokens.get(1).ok_or((
        head.column,
        AsmErrorKind::MissingOperand {
            mnemonic: instr.mnemonic(),
        },
    ))?;
    let at = |e: AsmErrorKind| (tok.column, e);

    ctx.emit_opcode(instr).map_err(|e| (head.column, e))?;
    match kind {
        OperandKind::ImmI32 => {
            let value = parse_i32(tok.text).map_err(at)?;
            ctx.emit_operand(Operand::Int(value)).map_err(at)
        }
        OperandKind::ImmF64 => {
            let value = parse_f64(tok.text).map_err(at)?;
            ctx.emit_operand(Operand::Float(value)).map_err(at)
        }
        OperandKind::Target if is_numeric_token(tok.text) => {
            let value = parse_i32(tok.text).map_err(at)?;
            ctx.emit_operand(Operand::Target(value as u32)).map_err(at)
        }
        OperandKind::Target => ctx.emit_relocation(tok.text, line_no, tok.column).map_err(at),
    }
}

/// First pass over a single source line.
fn assemble_line(ctx: &mut AsmContext, line_no: usize, line: &str) -> Result<(), AssemblyError> {
    let at = |(column, kind): (usize, AsmErrorKind)| AssemblyError::new(line_no, column, kind);

    let code = strip_comment(line);
    let mut rest_start = 0;

    if let Some(colon) = code.find(LABEL_SUFFIX) {
        let raw_name = &code[..colon];
        let name = raw_name.trim();
        let column = raw_name.len() - raw_name.trim_start().len() + 1;
        if name.is_empty() {
            return Err(at((colon + 1, AsmErrorKind::EmptyLabel)));
        }
        ctx.define_label(name).map_err(|e| at((column, e)))?;
        rest_start = colon + LABEL_SUFFIX.len_utf8();
    }

    let tokens = tokenize(&code[rest_start..], rest_start);
    if tokens.is_empty() {
        return Ok(());
    }

    let limit = ctx.limits.max_tokens_per_line;
    if let Some(extra) = tokens.get(limit) {
        return Err(at((extra.column, AsmErrorKind::TooManyTokens { limit })));
    }

    parse_instruction(ctx, line_no, &tokens).map_err(at)
}

/// Assemble a full source string into a [`Program`] using default limits.
pub fn assemble_source(source: &str) -> Result<Program, AssemblyError> {
    assemble_with_limits(source, AsmLimits::default())
}

/// Assemble a full source string into raw bytecode using default limits.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblyError> {
    assemble_source(source).map(Program::into_code)
}

/// Assemble with explicit capacities.
///
/// Runs the scan pass over every line, then the resolve pass. Any error aborts
/// assembly; there is no partial output.
pub fn assemble_with_limits(source: &str, limits: AsmLimits) -> Result<Program, AssemblyError> {
    let mut ctx = AsmContext::new(limits);

    for (idx, line) in source.lines().enumerate() {
        assemble_line(&mut ctx, idx + 1, line)?;
    }
    ctx.resolve_relocations()?;

    debug!(
        "assembled {} bytes ({} labels, {} relocations)",
        ctx.code.len(),
        ctx.labels.len(),
        ctx.relocations.len()
    );
    Ok(ctx.finish())
}

/// Reads and assembles a source file.
///
/// On assembly failure a compiler-style diagnostic pointing at the offending
/// token is printed to stderr before the error is returned.
pub fn assemble_file<P: AsRef<Path>>(path: P, limits: AsmLimits) -> Result<Program, VMError> {
    let path_ref = path.as_ref();
    let display = path_ref.display().to_string();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::Io {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    assemble_with_limits(&source, limits).map_err(|err| {
        eprint!("{}", render_assembly_diagnostic(&display, &source, &err));
        VMError::Assembly(err)
    })
}
