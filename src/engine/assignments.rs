use crate::basic_types::KeyedVec;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::basic_types::PropositionalVariableGeneratorIterator;
use crate::basic_types::Trail;
use crate::cardinal_assert_moderate;
use crate::cardinal_assert_simple;
use crate::engine::Justification;

/// The assignment state of the propositional variables: truth values,
/// decision levels, justifications, the trail, saved phases, conflict
/// analysis marks, and the external / assumption / eliminated variable
/// flags consulted by the simplifier.
#[derive(Clone, Debug, Default)]
pub struct Assignments {
    assignment_info: KeyedVec<PropositionalVariable, AssignmentInfo>,
    trail: Trail<Literal>,
    saved_phase: KeyedVec<PropositionalVariable, Option<bool>>,
    mark: KeyedVec<PropositionalVariable, bool>,
    external: KeyedVec<PropositionalVariable, bool>,
    assumption: KeyedVec<PropositionalVariable, bool>,
    eliminated: KeyedVec<PropositionalVariable, bool>,
}

impl Assignments {
    pub fn grow(&mut self) -> PropositionalVariable {
        let _ = self.saved_phase.push(None);
        let _ = self.mark.push(false);
        let _ = self.external.push(false);
        let _ = self.assumption.push(false);
        let _ = self.eliminated.push(false);
        self.assignment_info.push(AssignmentInfo::Unassigned)
    }

    pub fn num_propositional_variables(&self) -> u32 {
        self.assignment_info.len() as u32
    }

    pub fn get_propositional_variables(&self) -> PropositionalVariableGeneratorIterator {
        PropositionalVariableGeneratorIterator::new(0, self.num_propositional_variables())
    }

    pub fn increase_decision_level(&mut self) {
        self.trail.increase_decision_level()
    }

    pub fn get_decision_level(&self) -> usize {
        self.trail.get_decision_level()
    }

    pub fn is_at_the_root_level(&self) -> bool {
        self.get_decision_level() == 0
    }

    pub fn num_trail_entries(&self) -> usize {
        self.trail.len()
    }

    pub fn get_trail_entry(&self, index: usize) -> Literal {
        self.trail[index]
    }

    pub fn trail(&self) -> &[Literal] {
        &self.trail
    }

    pub fn is_variable_assigned(&self, variable: PropositionalVariable) -> bool {
        self.assignment_info[variable] != AssignmentInfo::Unassigned
    }

    pub fn is_variable_unassigned(&self, variable: PropositionalVariable) -> bool {
        self.assignment_info[variable] == AssignmentInfo::Unassigned
    }

    pub fn is_variable_assigned_true(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            AssignmentInfo::Assigned { truth_value, .. } => truth_value,
            AssignmentInfo::Unassigned => false,
        }
    }

    pub fn is_variable_assigned_false(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            AssignmentInfo::Assigned { truth_value, .. } => !truth_value,
            AssignmentInfo::Unassigned => false,
        }
    }

    /// The truth value of the literal: `None` when its variable is
    /// unassigned.
    pub fn value(&self, literal: Literal) -> Option<bool> {
        match self.assignment_info[literal.get_propositional_variable()] {
            AssignmentInfo::Assigned { truth_value, .. } => {
                Some(truth_value == literal.is_positive())
            }
            AssignmentInfo::Unassigned => None,
        }
    }

    pub fn is_literal_assigned(&self, literal: Literal) -> bool {
        self.is_variable_assigned(literal.get_propositional_variable())
    }

    pub fn is_literal_unassigned(&self, literal: Literal) -> bool {
        self.is_variable_unassigned(literal.get_propositional_variable())
    }

    pub fn is_literal_assigned_true(&self, literal: Literal) -> bool {
        self.value(literal) == Some(true)
    }

    pub fn is_literal_assigned_false(&self, literal: Literal) -> bool {
        self.value(literal) == Some(false)
    }

    pub fn is_literal_root_assignment(&self, literal: Literal) -> bool {
        self.is_literal_assigned(literal)
            && self.get_variable_assignment_level(literal.get_propositional_variable()) == 0
    }

    pub fn get_variable_assignment_level(&self, variable: PropositionalVariable) -> usize {
        match self.assignment_info[variable] {
            AssignmentInfo::Unassigned => {
                panic!("Unassigned variables do not have assignment levels");
            }
            AssignmentInfo::Assigned { decision_level, .. } => decision_level,
        }
    }

    pub fn get_literal_assignment_level(&self, literal: Literal) -> usize {
        self.get_variable_assignment_level(literal.get_propositional_variable())
    }

    pub fn get_variable_justification(&self, variable: PropositionalVariable) -> Justification {
        match self.assignment_info[variable] {
            AssignmentInfo::Unassigned => {
                panic!("Unassigned variables do not have justifications");
            }
            AssignmentInfo::Assigned { justification, .. } => justification,
        }
    }

    pub fn is_variable_decision(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            AssignmentInfo::Unassigned => false,
            AssignmentInfo::Assigned { justification, .. } => justification.is_decision(),
        }
    }

    pub fn enqueue_decision_literal(&mut self, decision_literal: Literal) {
        cardinal_assert_simple!(!self.is_literal_assigned(decision_literal));
        self.make_assignment(decision_literal, Justification::Decision);
    }

    pub fn enqueue_propagated_literal(
        &mut self,
        propagated_literal: Literal,
        justification: Justification,
    ) {
        self.make_assignment(propagated_literal, justification);
    }

    fn make_assignment(&mut self, true_literal: Literal, justification: Justification) {
        cardinal_assert_moderate!(self.is_literal_unassigned(true_literal));

        self.assignment_info[true_literal.get_propositional_variable()] =
            AssignmentInfo::Assigned {
                truth_value: true_literal.is_positive(),
                decision_level: self.get_decision_level(),
                justification,
            };

        self.trail.push(true_literal);
    }

    /// Backtrack to `new_decision_level`, unassigning everything above it and
    /// recording the removed polarities as saved phases.
    pub fn synchronise(&mut self, new_decision_level: usize) {
        cardinal_assert_simple!(new_decision_level < self.get_decision_level());
        self.trail.synchronise(new_decision_level).for_each(|entry| {
            let variable = entry.get_propositional_variable();
            self.assignment_info[variable] = AssignmentInfo::Unassigned;
            self.saved_phase[variable] = Some(entry.is_positive());
        })
    }

    pub fn get_saved_phase(&self, variable: PropositionalVariable) -> Option<bool> {
        self.saved_phase[variable]
    }

    pub fn set_saved_phase(&mut self, variable: PropositionalVariable, phase: bool) {
        self.saved_phase[variable] = Some(phase);
    }

    pub fn mark(&mut self, variable: PropositionalVariable) {
        self.mark[variable] = true;
    }

    pub fn reset_mark(&mut self, variable: PropositionalVariable) {
        self.mark[variable] = false;
    }

    pub fn is_marked(&self, variable: PropositionalVariable) -> bool {
        self.mark[variable]
    }

    pub fn is_external(&self, variable: PropositionalVariable) -> bool {
        self.external[variable]
    }

    pub fn set_external(&mut self, variable: PropositionalVariable) {
        self.external[variable] = true;
    }

    pub fn set_non_external(&mut self, variable: PropositionalVariable) {
        self.external[variable] = false;
    }

    pub fn is_assumption(&self, variable: PropositionalVariable) -> bool {
        self.assumption[variable]
    }

    pub fn set_assumption(&mut self, variable: PropositionalVariable) {
        self.assumption[variable] = true;
    }

    pub fn was_eliminated(&self, variable: PropositionalVariable) -> bool {
        self.eliminated[variable]
    }

    pub fn set_eliminated(&mut self, variable: PropositionalVariable) {
        self.eliminated[variable] = true;
    }

    /// The number of distinct decision levels among the given literals; the
    /// glue of a learned constraint over exactly its false literals.
    pub fn num_diff_levels(&self, literals: &[Literal]) -> u32 {
        let mut levels: Vec<usize> = literals
            .iter()
            .filter(|literal| self.is_literal_assigned(**literal))
            .map(|literal| self.get_literal_assignment_level(*literal))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        levels.len() as u32
    }

    /// The number of distinct decision levels among the *false* literals, if
    /// that number stays below `cap`. Used to tighten glue scores without
    /// paying for the full count when the score cannot improve.
    pub fn num_diff_false_levels_below(&self, literals: &[Literal], cap: u32) -> Option<u32> {
        let mut levels: Vec<usize> = literals
            .iter()
            .filter(|literal| self.is_literal_assigned_false(**literal))
            .map(|literal| self.get_literal_assignment_level(*literal))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        let count = levels.len() as u32;
        if count < cap {
            Some(count)
        } else {
            None
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug, Default)]
enum AssignmentInfo {
    Assigned {
        truth_value: bool,
        decision_level: usize,
        justification: Justification,
    },
    #[default]
    Unassigned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::PropositionalVariable;

    fn grown(n: u32) -> (Assignments, Vec<Literal>) {
        let mut assignments = Assignments::default();
        let literals = (0..n)
            .map(|_| Literal::new(assignments.grow(), true))
            .collect();
        (assignments, literals)
    }

    #[test]
    fn values_follow_the_assigned_polarity() {
        let (mut assignments, literals) = grown(2);
        assignments.enqueue_decision_literal(literals[0]);
        assignments.enqueue_propagated_literal(!literals[1], Justification::Binary(literals[0]));

        assert_eq!(assignments.value(literals[0]), Some(true));
        assert_eq!(assignments.value(!literals[0]), Some(false));
        assert_eq!(assignments.value(literals[1]), Some(false));
        assert!(assignments.is_variable_decision(
            literals[0].get_propositional_variable()
        ));
        assert!(!assignments.is_variable_decision(
            literals[1].get_propositional_variable()
        ));
    }

    #[test]
    fn synchronise_unassigns_and_saves_phases() {
        let (mut assignments, literals) = grown(2);
        assignments.enqueue_decision_literal(literals[0]);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!literals[1]);

        assignments.synchronise(0);

        assert!(assignments.is_literal_unassigned(literals[1]));
        assert_eq!(
            assignments.get_saved_phase(literals[1].get_propositional_variable()),
            Some(false)
        );
        // the root assignment survives
        assert_eq!(assignments.value(literals[0]), Some(true));
    }

    #[test]
    fn distinct_levels_are_counted_once() {
        let (mut assignments, literals) = grown(3);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!literals[0]);
        assignments.enqueue_propagated_literal(!literals[1], Justification::Binary(literals[0]));
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!literals[2]);

        let all: Vec<Literal> = literals.clone();
        assert_eq!(assignments.num_diff_levels(&all), 2);
        assert_eq!(assignments.num_diff_false_levels_below(&all, 10), Some(2));
        assert_eq!(assignments.num_diff_false_levels_below(&all, 2), None);

        let variable = PropositionalVariable::new(0);
        assignments.mark(variable);
        assert!(assignments.is_marked(variable));
        assignments.reset_mark(variable);
        assert!(!assignments.is_marked(variable));
    }
}
