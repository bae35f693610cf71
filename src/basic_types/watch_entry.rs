use bitfield::Bit;
use bitfield::BitMut;
use bitfield::BitRange;

use super::ConstraintIndex;
use super::Literal;
use crate::cardinal_assert_moderate;

/// A watch-list entry packed into 32 bits.
///
/// The watch list of literal `l` holds the entries that must be inspected
/// when `l` becomes true. Two kinds of entries exist:
///
/// 1. An inlined binary clause: the 31st bit is one, the 30th bit records
///    whether the clause is learned, and the remaining 30 bits encode the
///    *other* literal of the clause. If the entry sits in the watch list of
///    `l`, the clause is `(~l v other)`.
/// 2. An extension constraint: the two most significant bits are zero and
///    the remaining 30 bits encode the constraint index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchEntry {
    code: u32,
}

impl WatchEntry {
    pub fn binary_clause(other: Literal, is_learned: bool) -> WatchEntry {
        cardinal_assert_moderate!(!other.to_u32().bit(31) && !other.to_u32().bit(30));
        let mut code = other.to_u32();
        code.set_bit(31, true);
        code.set_bit(30, is_learned);
        WatchEntry { code }
    }

    pub fn constraint(index: ConstraintIndex) -> WatchEntry {
        cardinal_assert_moderate!(index.get() <= ConstraintIndex::MAX);
        WatchEntry { code: index.get() }
    }

    pub fn is_binary_clause(&self) -> bool {
        self.code.bit(31)
    }

    pub fn is_learned_binary_clause(&self) -> bool {
        self.is_binary_clause() && self.code.bit(30)
    }

    pub fn is_constraint(&self) -> bool {
        <u32 as BitRange<u32>>::bit_range(&self.code, 31, 30) == 0
    }

    /// The other literal of an inlined binary clause.
    pub fn get_binary_clause_literal(&self) -> Literal {
        cardinal_assert_moderate!(self.is_binary_clause());
        let literal_code = <u32 as BitRange<u32>>::bit_range(&self.code, 29, 0);
        Literal::u32_to_literal(literal_code)
    }

    pub fn get_constraint_index(&self) -> ConstraintIndex {
        cardinal_assert_moderate!(self.is_constraint());
        ConstraintIndex::new(self.code)
    }
}

impl std::fmt::Debug for WatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_binary_clause() {
            write!(f, "binary({})", self.get_binary_clause_literal())
        } else {
            write!(f, "{}", self.get_constraint_index())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::PropositionalVariable;

    #[test]
    fn binary_clause_entry_round_trip() {
        for is_learned in [false, true] {
            let other = Literal::new(PropositionalVariable::new(11), true);
            let entry = WatchEntry::binary_clause(other, is_learned);
            assert!(entry.is_binary_clause());
            assert!(!entry.is_constraint());
            assert_eq!(entry.is_learned_binary_clause(), is_learned);
            assert_eq!(entry.get_binary_clause_literal(), other);
        }
    }

    #[test]
    fn constraint_entry_round_trip() {
        let index = ConstraintIndex::new(42);
        let entry = WatchEntry::constraint(index);
        assert!(entry.is_constraint());
        assert!(!entry.is_binary_clause());
        assert_eq!(entry.get_constraint_index(), index);
    }
}
