use crate::virtual_machine::errors::RuntimeErrorKind;
use crate::virtual_machine::operand::write_float;
use std::fmt;

/// Runtime value held on the operand stack.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// 32-bit signed integer.
    Integer(i32),
    /// 64-bit IEEE-754 float.
    Float(f64),
}

impl Value {
    /// Returns the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
        }
    }

    /// `JZ` condition: integer `0` or float `0.0` (either sign).
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write_float(f, *v),
        }
    }
}

/// Bounded operand stack of typed values.
pub(super) struct OperandStack {
    values: Vec<Value>,
    limit: usize,
}

impl OperandStack {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            values: Vec::new(),
            limit,
        }
    }

    /// Pushes a value.
    ///
    /// Returns [`RuntimeErrorKind::StackOverflow`] if the stack is full.
    pub(super) fn push(&mut self, v: Value) -> Result<(), RuntimeErrorKind> {
        if self.values.len() >= self.limit {
            return Err(RuntimeErrorKind::StackOverflow { limit: self.limit });
        }
        self.values.push(v);
        Ok(())
    }

    /// Pops the top value.
    ///
    /// Returns [`RuntimeErrorKind::StackUnderflow`] if the stack is empty.
    pub(super) fn pop(&mut self, instr: &'static str) -> Result<Value, RuntimeErrorKind> {
        self.values
            .pop()
            .ok_or(RuntimeErrorKind::StackUnderflow { instruction: instr })
    }

    /// Returns the top value without removing it.
    pub(super) fn peek(&self, instr: &'static str) -> Result<Value, RuntimeErrorKind> {
        self.values
            .last()
            .copied()
            .ok_or(RuntimeErrorKind::StackUnderflow { instruction: instr })
    }

    /// Pops the top value, which must be an integer.
    ///
    /// Returns [`RuntimeErrorKind::TypeMismatch`] if it is a float.
    pub(super) fn pop_int(&mut self, instr: &'static str) -> Result<i32, RuntimeErrorKind> {
        match self.pop(instr)? {
            Value::Integer(v) => Ok(v),
            other => Err(RuntimeErrorKind::TypeMismatch {
                instruction: instr,
                expected: "integer",
                actual: other.type_name(),
            }),
        }
    }

    /// Pops the top value, which must be a float.
    ///
    /// Returns [`RuntimeErrorKind::TypeMismatch`] if it is an integer.
    pub(super) fn pop_float(&mut self, instr: &'static str) -> Result<f64, RuntimeErrorKind> {
        match self.pop(instr)? {
            Value::Float(v) => Ok(v),
            other => Err(RuntimeErrorKind::TypeMismatch {
                instruction: instr,
                expected: "float",
                actual: other.type_name(),
            }),
        }
    }

    /// Bottom-to-top view of the whole stack.
    pub(super) fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// The most recent `window` values, bottom to top.
    pub(super) fn snapshot(&self, window: usize) -> &[Value] {
        let start = self.values.len().saturating_sub(window);
        &self.values[start..]
    }
}

/// Bounded stack of return addresses for `CALL`/`RET`.
pub(super) struct CallStack {
    frames: Vec<usize>,
    limit: usize,
}

impl CallStack {
    pub(super) fn new(limit: usize) -> Self {
        Self {
            frames: Vec::new(),
            limit,
        }
    }

    pub(super) fn push(&mut self, return_addr: usize) -> Result<(), RuntimeErrorKind> {
        if self.frames.len() >= self.limit {
            return Err(RuntimeErrorKind::CallStackOverflow { limit: self.limit });
        }
        self.frames.push(return_addr);
        Ok(())
    }

    pub(super) fn pop(&mut self) -> Result<usize, RuntimeErrorKind> {
        self.frames.pop().ok_or(RuntimeErrorKind::CallStackUnderflow)
    }

    pub(super) fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_respects_limit() {
        let mut stack = OperandStack::new(2);
        stack.push(Value::Integer(1)).unwrap();
        stack.push(Value::Float(2.0)).unwrap();
        assert_eq!(
            stack.push(Value::Integer(3)),
            Err(RuntimeErrorKind::StackOverflow { limit: 2 })
        );
        assert_eq!(stack.as_slice().len(), 2);
    }

    #[test]
    fn typed_pops() {
        let mut stack = OperandStack::new(4);
        stack.push(Value::Integer(7)).unwrap();
        stack.push(Value::Float(1.5)).unwrap();
        assert_eq!(
            stack.pop_int("ADD"),
            Err(RuntimeErrorKind::TypeMismatch {
                instruction: "ADD",
                expected: "integer",
                actual: "float",
            })
        );
        // The mismatched value was consumed.
        assert_eq!(stack.pop_int("ADD"), Ok(7));
        assert_eq!(
            stack.pop_float("ADDF"),
            Err(RuntimeErrorKind::StackUnderflow { instruction: "ADDF" })
        );
    }

    #[test]
    fn snapshot_window() {
        let mut stack = OperandStack::new(16);
        for i in 0..10 {
            stack.push(Value::Integer(i)).unwrap();
        }
        let window: Vec<_> = stack.snapshot(8).iter().map(|v| v.to_string()).collect();
        assert_eq!(window, vec!["2", "3", "4", "5", "6", "7", "8", "9"]);
        assert_eq!(stack.snapshot(20).len(), 10);
    }

    #[test]
    fn zero_test() {
        assert!(Value::Integer(0).is_zero());
        assert!(Value::Float(0.0).is_zero());
        assert!(Value::Float(-0.0).is_zero());
        assert!(!Value::Integer(1).is_zero());
        assert!(!Value::Float(0.5).is_zero());
        assert!(!Value::Float(f64::NAN).is_zero());
    }

    #[test]
    fn call_stack_bounds() {
        let mut calls = CallStack::new(1);
        assert_eq!(calls.pop(), Err(RuntimeErrorKind::CallStackUnderflow));
        calls.push(5).unwrap();
        assert_eq!(
            calls.push(9),
            Err(RuntimeErrorKind::CallStackOverflow { limit: 1 })
        );
        assert_eq!(calls.depth(), 1);
        assert_eq!(calls.pop(), Ok(5));
    }
}
