use crate::virtual_machine::errors::RuntimeErrorKind;

/// Flat array of integer cells addressed by `LOAD`/`STORE`.
///
/// Every cell starts at zero. Addresses are signed so that negative values
/// popped from the stack surface as out-of-bounds errors.
pub(super) struct Memory {
    cells: Vec<i32>,
}

impl Memory {
    pub(super) fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size],
        }
    }

    fn index(&self, instr: &'static str, address: i32) -> Result<usize, RuntimeErrorKind> {
        usize::try_from(address)
            .ok()
            .filter(|&idx| idx < self.cells.len())
            .ok_or(RuntimeErrorKind::MemoryOutOfBounds {
                instruction: instr,
                address,
                size: self.cells.len(),
            })
    }

    /// Reads the cell at `address`.
    pub(super) fn load(&self, instr: &'static str, address: i32) -> Result<i32, RuntimeErrorKind> {
        let idx = self.index(instr, address)?;
        Ok(self.cells[idx])
    }

    /// Checks `address` without touching memory, for instructions that must
    /// validate the address before popping further operands.
    pub(super) fn check(&self, instr: &'static str, address: i32) -> Result<(), RuntimeErrorKind> {
        self.index(instr, address).map(|_| ())
    }

    /// Writes `value` to the cell at `address`.
    pub(super) fn store(
        &mut self,
        instr: &'static str,
        address: i32,
        value: i32,
    ) -> Result<(), RuntimeErrorKind> {
        let idx = self.index(instr, address)?;
        self.cells[idx] = value;
        Ok(())
    }

    pub(super) fn as_slice(&self) -> &[i32] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_initialized() {
        let mem = Memory::new(4);
        assert_eq!(mem.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn store_then_load() {
        let mut mem = Memory::new(4);
        mem.store("STORE", 3, -9).unwrap();
        assert_eq!(mem.load("LOAD", 3), Ok(-9));
    }

    #[test]
    fn out_of_bounds() {
        let mut mem = Memory::new(4);
        assert_eq!(
            mem.load("LOAD", 4),
            Err(RuntimeErrorKind::MemoryOutOfBounds {
                instruction: "LOAD",
                address: 4,
                size: 4,
            })
        );
        assert_eq!(
            mem.store("STORE", -1, 0),
            Err(RuntimeErrorKind::MemoryOutOfBounds {
                instruction: "STORE",
                address: -1,
                size: 4,
            })
        );
        assert!(mem.check("STORE", 0).is_ok());
    }
}
