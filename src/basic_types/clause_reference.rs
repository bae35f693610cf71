use super::StorageKey;

/// Reference to a clause allocated in the
/// [ClauseDatabase][crate::engine::ClauseDatabase]. Binary clauses are not
/// allocated; they are inlined in the watch lists (see
/// [WatchEntry][super::WatchEntry]) and justified through their remaining
/// literal, so a `ClauseReference` always denotes a clause of three or more
/// literals.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct ClauseReference {
    id: u32,
}

impl ClauseReference {
    pub fn new(id: u32) -> ClauseReference {
        ClauseReference { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl StorageKey for ClauseReference {
    fn index(&self) -> usize {
        self.id as usize
    }

    fn create_from_index(index: usize) -> Self {
        ClauseReference { id: index as u32 }
    }
}

impl std::fmt::Debug for ClauseReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "clause#{}", self.id)
    }
}
