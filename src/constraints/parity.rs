use crate::basic_types::Literal;

/// The body of a parity constraint: the exclusive-or of the listed literals.
/// Positions 0 and 1 are the watched pair, in both polarities.
#[derive(Clone, Debug)]
pub struct Parity {
    literals: Vec<Literal>,
}

impl Parity {
    pub fn new(literals: Vec<Literal>) -> Parity {
        Parity { literals }
    }

    pub fn size(&self) -> usize {
        self.literals.len()
    }

    pub fn literal(&self, index: usize) -> Literal {
        self.literals[index]
    }

    pub fn set_literal(&mut self, index: usize, literal: Literal) {
        self.literals[index] = literal;
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.literals.swap(a, b);
    }

    pub fn is_watching(&self, literal: Literal) -> bool {
        literal == self.literals[0]
            || literal == self.literals[1]
            || !literal == self.literals[0]
            || !literal == self.literals[1]
    }
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (position, literal) in self.literals.iter().enumerate() {
            if position > 0 {
                write!(f, " x ")?;
            }
            write!(f, "{literal}")?;
        }
        Ok(())
    }
}
