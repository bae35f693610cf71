use super::StorageKey;

/// Index of a cardinality / pseudo-Boolean / parity constraint in the
/// constraint arena. This is the identifier handed to the core as the
/// justification of propagations performed by the extension, and the payload
/// of constraint watch-list entries; it therefore has to fit in 30 bits (see
/// [WatchEntry][super::WatchEntry]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintIndex {
    index: u32,
}

impl ConstraintIndex {
    /// The largest representable index; constrained by the watch-entry
    /// packing.
    pub const MAX: u32 = (1 << 30) - 1;

    pub fn new(index: u32) -> ConstraintIndex {
        ConstraintIndex { index }
    }

    pub fn get(&self) -> u32 {
        self.index
    }
}

impl StorageKey for ConstraintIndex {
    fn index(&self) -> usize {
        self.index as usize
    }

    fn create_from_index(index: usize) -> Self {
        ConstraintIndex {
            index: index as u32,
        }
    }
}

impl std::fmt::Display for ConstraintIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.index)
    }
}
