//! Synthetic-name generation.
//!
//! One counter per transform call, shared across every role, so a generated
//! name is unique within the compilation unit and output is reproducible
//! run to run (no random suffixes).

#[derive(Debug, Default)]
pub struct NameGen {
    next: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns `__{role}{n}` with a strictly increasing `n` starting at 1.
    pub fn fresh(&mut self, role: &str) -> String {
        self.next += 1;
        format!("__{}{}", role, self.next)
    }
}
