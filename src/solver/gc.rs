use log::debug;

use crate::basic_types::ConstraintIndex;
use crate::constraints::ConstraintBody;
use crate::solver::CardinalSolver;

impl CardinalSolver {
    /// How many literals of the constraint agree with the saved phase of
    /// their variable: the progress saving measure used to prioritise
    /// learned constraints for deletion.
    pub(crate) fn update_psm(&mut self, index: ConstraintIndex) {
        let mut agreeing = 0;
        {
            let constraint = self.arena.get(index);
            let assignments = self.core.assignments();
            match constraint.body() {
                ConstraintBody::Cardinality(cardinality) => {
                    for &literal in cardinality.literals() {
                        if assignments.get_saved_phase(literal.get_propositional_variable())
                            == Some(literal.is_positive())
                        {
                            agreeing += 1;
                        }
                    }
                }
                ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                    for term in pseudo_boolean.terms() {
                        if assignments
                            .get_saved_phase(term.literal.get_propositional_variable())
                            == Some(term.literal.is_positive())
                        {
                            agreeing += 1;
                        }
                    }
                }
                ConstraintBody::Parity(_) => {}
            }
        }
        self.arena.get_mut(index).set_psm(agreeing);
    }

    /// Garbage-collect learned constraints once they outnumber the problem
    /// constraints two to one: the worse half by lexicographic
    /// `(glue, psm, size)` is dropped, except members of the reinit queue.
    pub fn gc(&mut self) {
        if self.learned.len() >= 2 * self.constraints.len() {
            for position in 0..self.learned.len() {
                let index = self.learned[position];
                if self.arena.try_get(index).is_some() {
                    self.update_psm(index);
                }
            }
            let arena = &self.arena;
            self.learned.sort_by(|&a, &b| {
                let first = arena.get(a);
                let second = arena.get(b);
                (first.glue(), first.psm(), first.size()).cmp(&(
                    second.glue(),
                    second.psm(),
                    second.size(),
                ))
            });
            self.gc_half();
            self.cleanup_constraints();
        }
    }

    fn gc_half(&mut self) {
        let size = self.learned.len();
        let new_size = size / 2;
        let mut removed = 0;
        for position in new_size..size {
            let index = self.learned[position];
            if !self.constraint_to_reinit.contains(&index) {
                self.remove_constraint(index);
                removed += 1;
            }
        }
        self.statistics.num_gc += removed;
        debug!("gc: deleted {removed} learned constraints");
    }
}
