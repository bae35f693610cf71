use crate::basic_types::ConstraintIndex;
use crate::basic_types::KeyedVec;
use crate::basic_types::Literal;
use crate::basic_types::WatchEntry;

/// Literal-indexed watch registry. The list stored under literal `l`
/// contains the entries that must be visited when `l` is assigned true: the
/// inlined binary clauses containing `~l`, and the extension constraints
/// watching `~l`.
#[derive(Clone, Debug, Default)]
pub struct WatchList {
    watchers: KeyedVec<Literal, Vec<WatchEntry>>,
}

impl WatchList {
    /// Make room for one more variable, once for each polarity.
    pub fn grow(&mut self) {
        let _ = self.watchers.push(vec![]);
        let _ = self.watchers.push(vec![]);
    }

    pub fn get(&self, literal: Literal) -> &[WatchEntry] {
        &self.watchers[literal]
    }

    pub fn get_mut(&mut self, literal: Literal) -> &mut Vec<WatchEntry> {
        &mut self.watchers[literal]
    }

    /// Register `constraint` as watching `literal`: the entry lands in the
    /// list visited when `~literal` becomes true.
    pub fn watch_constraint(&mut self, literal: Literal, constraint: ConstraintIndex) {
        self.watchers[!literal].push(WatchEntry::constraint(constraint));
    }

    pub fn unwatch_constraint(&mut self, literal: Literal, constraint: ConstraintIndex) {
        let entry = WatchEntry::constraint(constraint);
        let watchers = &mut self.watchers[!literal];
        if let Some(position) = watchers.iter().position(|watcher| *watcher == entry) {
            let _ = watchers.swap_remove(position);
        }
    }

    pub fn is_watching(&self, literal: Literal, constraint: ConstraintIndex) -> bool {
        let entry = WatchEntry::constraint(constraint);
        self.watchers[!literal].contains(&entry)
    }

    pub fn add_binary_clause(&mut self, lit1: Literal, lit2: Literal, is_learned: bool) {
        self.watchers[!lit1].push(WatchEntry::binary_clause(lit2, is_learned));
        self.watchers[!lit2].push(WatchEntry::binary_clause(lit1, is_learned));
    }

    pub fn remove_binary_clause_half(&mut self, of: Literal, other: Literal) {
        let watchers = &mut self.watchers[!of];
        if let Some(position) = watchers.iter().position(|watcher| {
            watcher.is_binary_clause() && watcher.get_binary_clause_literal() == other
        }) {
            let _ = watchers.swap_remove(position);
        }
    }

    /// The number of non-learned binary clauses that contain `literal`.
    pub fn num_non_learned_binary(&self, literal: Literal) -> usize {
        self.watchers[!literal]
            .iter()
            .filter(|watcher| watcher.is_binary_clause() && !watcher.is_learned_binary_clause())
            .count()
    }

    /// All binary clauses containing `literal`, given as the other literal.
    pub fn binary_clauses_of(&self, literal: Literal) -> impl Iterator<Item = Literal> + '_ {
        self.watchers[!literal]
            .iter()
            .filter(|watcher| watcher.is_binary_clause())
            .map(|watcher| watcher.get_binary_clause_literal())
    }

    pub fn num_literals(&self) -> usize {
        self.watchers.len()
    }
}
