use crate::basic_types::ClauseReference;
use crate::basic_types::ConstraintIndex;
use crate::basic_types::Literal;

/// The reason recorded for an assignment on the trail. Conflict resolution
/// dispatches on this to decide how an antecedent enters the running
/// inequality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Justification {
    /// A decision, or an unconditional (root) assignment.
    #[default]
    Decision,
    /// Propagated by a binary clause; the payload is the other literal of
    /// the clause.
    Binary(Literal),
    /// Propagated by a ternary clause; the payload holds the other two
    /// literals.
    Ternary(Literal, Literal),
    /// Propagated by an allocated clause.
    Clause(ClauseReference),
    /// Propagated by an extension constraint (cardinality, pseudo-Boolean,
    /// or parity).
    Constraint(ConstraintIndex),
}

impl Justification {
    pub fn is_decision(&self) -> bool {
        matches!(self, Justification::Decision)
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Justification::Constraint(_))
    }
}
