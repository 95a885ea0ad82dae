use stackvm_derive::Error;

/// Why a source program could not be assembled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AsmErrorKind {
    /// Unrecognized instruction mnemonic.
    #[error("unknown instruction '{0}'")]
    UnknownInstruction(String),
    /// Instruction requires an operand but none was given.
    #[error("{mnemonic} missing operand")]
    MissingOperand { mnemonic: &'static str },
    /// Instruction takes no operand but one was given.
    #[error("{mnemonic} takes no operand, got '{token}'")]
    UnexpectedOperand {
        mnemonic: &'static str,
        token: String,
    },
    /// Integer literal is malformed or does not fit in 32 bits.
    #[error("invalid integer literal '{0}'")]
    InvalidInteger(String),
    /// Floating-point literal is malformed.
    #[error("invalid float literal '{0}'")]
    InvalidFloat(String),
    /// Label marker with nothing before the colon.
    #[error("empty label")]
    EmptyLabel,
    /// Label defined more than once.
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),
    /// Reference to a label that is never defined.
    #[error("undefined label: {0}")]
    UndefinedLabel(String),
    /// Label table is full.
    #[error("too many labels (limit {limit})")]
    TooManyLabels { limit: usize },
    /// Relocation table is full.
    #[error("too many relocations (limit {limit})")]
    TooManyRelocations { limit: usize },
    /// Line has more tokens than the tokenizer accepts.
    #[error("too many tokens on line (limit {limit})")]
    TooManyTokens { limit: usize },
    /// Emitting would grow the bytecode past its capacity.
    #[error("bytecode overflow (capacity {capacity} bytes)")]
    BytecodeOverflow { capacity: usize },
}

/// Assembly failure with the source position it was detected at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
    /// 1-based source line.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    pub kind: AsmErrorKind,
}

impl AssemblyError {
    pub fn new(line: usize, column: usize, kind: AsmErrorKind) -> Self {
        Self { line, column, kind }
    }
}

/// Why execution stopped abnormally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    /// Unknown opcode encountered in bytecode.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    /// Bytecode ended in the middle of an instruction's immediate.
    #[error("truncated {mnemonic}: needs {needed} operand bytes, {available} available")]
    TruncatedInstruction {
        mnemonic: &'static str,
        needed: usize,
        available: usize,
    },
    /// Push onto a full operand stack.
    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },
    /// Pop or peek on an empty operand stack.
    #[error("stack underflow in {instruction}")]
    StackUnderflow { instruction: &'static str },
    /// Operand has the wrong tag for the instruction.
    #[error("{instruction} expects {expected} on stack, got {actual}")]
    TypeMismatch {
        instruction: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    /// `DIV` with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// `MOD` with a zero divisor.
    #[error("modulo by zero")]
    ModuloByZero,
    /// `LOAD`/`STORE` outside `[0, size)`.
    #[error("{instruction} address {address} out of bounds (memory size {size})")]
    MemoryOutOfBounds {
        instruction: &'static str,
        address: i32,
        size: usize,
    },
    /// `CALL` on a full call-return stack.
    #[error("call stack overflow (limit {limit})")]
    CallStackOverflow { limit: usize },
    /// `RET` with no matching `CALL`.
    #[error("call stack underflow")]
    CallStackUnderflow,
    /// Program or trace output could not be written.
    #[error("output error: {0}")]
    Output(String),
}

/// Execution failure at a given instruction offset.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at ip={offset:04}")]
pub struct RuntimeError {
    /// Bytecode offset of the faulting instruction.
    pub offset: usize,
    pub kind: RuntimeErrorKind,
}

impl RuntimeError {
    pub fn new(offset: usize, kind: RuntimeErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Top-level error for loading, assembling and running a program.
#[derive(Debug, Error)]
pub enum VMError {
    /// Source file could not be read.
    #[error("failed to open '{path}': {reason}")]
    Io { path: String, reason: String },
    /// Environment override could not be parsed.
    #[error("invalid value '{value}' for {key}")]
    Config { key: &'static str, value: String },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
