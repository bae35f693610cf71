use log::warn;

use crate::basic_types::ClauseReference;
use crate::basic_types::ConstraintOperationError;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::basic_types::WatchEntry;
use crate::cardinal_assert_simple;
use crate::engine::Assignments;
use crate::engine::ClauseDatabase;
use crate::engine::Justification;
use crate::engine::WatchList;

/// The conflict recorded by a failed assignment: the negation of the literal
/// that could not be made true, together with the justification that forced
/// it. A root conflict carries no literal.
#[derive(Clone, Copy, Debug)]
pub struct StoredConflict {
    pub not_literal: Option<Literal>,
    pub justification: Justification,
}

/// The trail-facing state of the CDCL core that the extension collaborates
/// with: assignments, the clause store, and the shared watch lists. Search
/// itself (decision making, restarts, clausal unit propagation) lives
/// outside this crate; this structure provides exactly the entry points the
/// extension consumes.
#[derive(Debug, Default)]
pub struct SolverCore {
    assignments: Assignments,
    clause_database: ClauseDatabase,
    watch_list: WatchList,
    stored_conflict: Option<StoredConflict>,
}

impl SolverCore {
    pub fn new_variable(&mut self) -> PropositionalVariable {
        self.watch_list.grow();
        self.assignments.grow()
    }

    pub fn num_vars(&self) -> u32 {
        self.assignments.num_propositional_variables()
    }

    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    pub fn assignments_mut(&mut self) -> &mut Assignments {
        &mut self.assignments
    }

    pub fn clause_database(&self) -> &ClauseDatabase {
        &self.clause_database
    }

    pub fn clause_database_mut(&mut self) -> &mut ClauseDatabase {
        &mut self.clause_database
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_list
    }

    pub fn watch_list_mut(&mut self) -> &mut WatchList {
        &mut self.watch_list
    }

    pub fn value(&self, literal: Literal) -> Option<bool> {
        self.assignments.value(literal)
    }

    pub fn is_true(&self, literal: Literal) -> bool {
        self.assignments.is_literal_assigned_true(literal)
    }

    pub fn is_false(&self, literal: Literal) -> bool {
        self.assignments.is_literal_assigned_false(literal)
    }

    pub fn is_unassigned(&self, literal: Literal) -> bool {
        self.assignments.is_literal_unassigned(literal)
    }

    pub fn lvl(&self, literal: Literal) -> usize {
        self.assignments.get_literal_assignment_level(literal)
    }

    pub fn lvl_var(&self, variable: PropositionalVariable) -> usize {
        self.assignments.get_variable_assignment_level(variable)
    }

    pub fn decision_level(&self) -> usize {
        self.assignments.get_decision_level()
    }

    pub fn at_base_lvl(&self) -> bool {
        self.assignments.is_at_the_root_level()
    }

    pub fn increase_decision_level(&mut self) {
        self.assignments.increase_decision_level()
    }

    pub fn enqueue_decision_literal(&mut self, literal: Literal) {
        self.assignments.enqueue_decision_literal(literal)
    }

    /// Make `literal` true with the given justification. Assigning a literal
    /// that is already false records a conflict instead.
    pub fn assign(&mut self, literal: Literal, justification: Justification) {
        match self.assignments.value(literal) {
            Some(true) => {}
            Some(false) => self.set_conflict(justification, Some(!literal)),
            None => self
                .assignments
                .enqueue_propagated_literal(literal, justification),
        }
    }

    /// Record a conflict; the first recorded conflict wins.
    pub fn set_conflict(&mut self, justification: Justification, not_literal: Option<Literal>) {
        if self.stored_conflict.is_none() {
            self.stored_conflict = Some(StoredConflict {
                not_literal,
                justification,
            });
        }
    }

    pub fn inconsistent(&self) -> bool {
        self.stored_conflict.is_some()
    }

    pub fn get_conflict(&self) -> Option<StoredConflict> {
        self.stored_conflict
    }

    pub fn clear_conflict(&mut self) {
        self.stored_conflict = None;
    }

    /// Backtrack to `level`, unassigning everything above it.
    pub fn backjump(&mut self, level: usize) {
        cardinal_assert_simple!(level < self.decision_level());
        self.assignments.synchronise(level);
        self.stored_conflict = None;
    }

    pub fn get_wlist(&mut self, literal: Literal) -> &mut Vec<WatchEntry> {
        self.watch_list.get_mut(literal)
    }

    /// Add a clause. Degenerate sizes are folded away: satisfied and
    /// tautological clauses vanish, an empty clause is a root conflict, a
    /// unit clause becomes a root assignment, a binary clause is inlined
    /// into the watch lists. Only longer clauses are allocated.
    pub fn mk_clause(
        &mut self,
        literals: Vec<Literal>,
        is_learned: bool,
    ) -> Result<Option<ClauseReference>, ConstraintOperationError> {
        cardinal_assert_simple!(self.at_base_lvl());

        if literals.is_empty() {
            warn!("Adding empty clause, unusual!");
        }

        let mut literals = literals;
        literals.sort_unstable_by_key(|literal| literal.to_u32());
        literals.dedup();
        // tautology?
        if literals
            .windows(2)
            .any(|pair| pair[0] == !pair[1])
        {
            return Ok(None);
        }
        if literals
            .iter()
            .any(|literal| self.assignments.is_literal_assigned_true(*literal))
        {
            return Ok(None);
        }
        literals.retain(|literal| !self.assignments.is_literal_assigned_false(*literal));

        match literals.len() {
            0 => {
                self.set_conflict(Justification::Decision, None);
                Err(ConstraintOperationError::InfeasibleClause)
            }
            1 => {
                self.assignments
                    .enqueue_propagated_literal(literals[0], Justification::Decision);
                Ok(None)
            }
            2 => {
                self.watch_list
                    .add_binary_clause(literals[0], literals[1], is_learned);
                Ok(None)
            }
            _ => Ok(Some(self.clause_database.create_clause(literals, is_learned))),
        }
    }

    // conflict-analysis marks

    pub fn mark(&mut self, variable: PropositionalVariable) {
        self.assignments.mark(variable)
    }

    pub fn reset_mark(&mut self, variable: PropositionalVariable) {
        self.assignments.reset_mark(variable)
    }

    pub fn is_marked(&self, variable: PropositionalVariable) -> bool {
        self.assignments.is_marked(variable)
    }

    // variable classification

    pub fn is_external(&self, variable: PropositionalVariable) -> bool {
        self.assignments.is_external(variable)
    }

    pub fn set_external(&mut self, variable: PropositionalVariable) {
        self.assignments.set_external(variable)
    }

    pub fn set_non_external(&mut self, variable: PropositionalVariable) {
        self.assignments.set_non_external(variable)
    }

    pub fn is_assumption(&self, variable: PropositionalVariable) -> bool {
        self.assignments.is_assumption(variable)
    }

    pub fn was_eliminated(&self, variable: PropositionalVariable) -> bool {
        self.assignments.was_eliminated(variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigning_a_false_literal_records_a_conflict() {
        let mut core = SolverCore::default();
        let x = Literal::new(core.new_variable(), true);
        core.increase_decision_level();
        core.enqueue_decision_literal(x);

        core.assign(!x, Justification::Binary(x));

        assert!(core.inconsistent());
        let conflict = core.get_conflict().unwrap();
        assert_eq!(conflict.not_literal, Some(x));
        core.backjump(0);
        assert!(!core.inconsistent());
        assert!(core.is_unassigned(x));
    }

    #[test]
    fn mk_clause_folds_degenerate_cases() {
        let mut core = SolverCore::default();
        let x = Literal::new(core.new_variable(), true);
        let y = Literal::new(core.new_variable(), true);
        let z = Literal::new(core.new_variable(), true);

        // tautology vanishes
        assert_eq!(core.mk_clause(vec![x, !x], false).unwrap(), None);
        // binary is inlined
        assert_eq!(core.mk_clause(vec![x, y], false).unwrap(), None);
        assert_eq!(core.watch_list().num_non_learned_binary(x), 1);
        // unit becomes a root assignment
        assert_eq!(core.mk_clause(vec![z], false).unwrap(), None);
        assert!(core.is_true(z));
        // longer clauses are allocated
        let w = Literal::new(core.new_variable(), true);
        let v = Literal::new(core.new_variable(), true);
        let reference = core.mk_clause(vec![x, w, v], false).unwrap();
        assert!(reference.is_some());
    }

    #[test]
    fn empty_clause_is_a_root_conflict() {
        let mut core = SolverCore::default();
        let x = Literal::new(core.new_variable(), true);
        assert_eq!(core.mk_clause(vec![x], false).unwrap(), None);
        let result = core.mk_clause(vec![!x], false);
        assert_eq!(result, Err(ConstraintOperationError::InfeasibleClause));
        assert!(core.inconsistent());
    }
}
