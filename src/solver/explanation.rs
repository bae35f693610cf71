use crate::basic_types::ConstraintIndex;
use crate::basic_types::Literal;
use crate::cardinal_assert_advanced;
use crate::cardinal_assert_moderate;
use crate::engine::Justification;
use crate::solver::CardinalSolver;

impl CardinalSolver {
    /// Collect a sufficient set of currently-true literals whose conjunction
    /// implies `literal` under constraint `index`.
    pub fn get_antecedents(
        &mut self,
        literal: Literal,
        index: ConstraintIndex,
        out: &mut Vec<Literal>,
    ) {
        let constraint = self.arena.get(index);
        if constraint.is_cardinality() {
            self.get_card_antecedents(literal, index, out);
        } else if constraint.is_pseudo_boolean() {
            self.get_pb_antecedents(literal, index, out);
        } else {
            self.get_parity_antecedents(literal, index, out);
        }
        cardinal_assert_advanced!(out
            .iter()
            .all(|antecedent| self.core.value(*antecedent) == Some(true)));
    }

    fn get_card_antecedents(
        &self,
        literal: Literal,
        index: ConstraintIndex,
        out: &mut Vec<Literal>,
    ) {
        let constraint = self.arena.get(index);
        let cardinality = constraint.as_cardinality();
        cardinal_assert_moderate!(cardinality.literals()
            [..cardinality.k() as usize]
            .contains(&literal));
        if let Some(reifier) = constraint.reifier() {
            cardinal_assert_moderate!(self.core.value(reifier) == Some(true));
            out.push(reifier);
        }
        // the false tail is the reason the watched literals are forced
        for position in cardinality.k() as usize..cardinality.size() {
            let tail_literal = cardinality.literal(position);
            cardinal_assert_moderate!(self.core.value(tail_literal) == Some(false));
            out.push(!tail_literal);
        }
    }

    /// Partition the terms as `Ax + coeff * literal + By >= k` with all of
    /// `x` false and `B < k`; then `x` explains `literal`. False terms whose
    /// weight still fits under the bound are absorbed instead of reported,
    /// keeping the antecedent set small.
    fn get_pb_antecedents(
        &self,
        literal: Literal,
        index: ConstraintIndex,
        out: &mut Vec<Literal>,
    ) {
        let constraint = self.arena.get(index);
        let pseudo_boolean = constraint.as_pseudo_boolean();
        if let Some(reifier) = constraint.reifier() {
            cardinal_assert_moderate!(self.core.value(reifier) == Some(true));
            out.push(reifier);
        }
        let bound = u64::from(pseudo_boolean.k());

        // weight that can still be contributed without this literal
        let mut slack: u64 = pseudo_boolean
            .terms()
            .iter()
            .filter(|term| {
                term.literal != literal && self.core.value(term.literal) != Some(false)
            })
            .map(|term| u64::from(term.weight))
            .sum();
        cardinal_assert_moderate!(slack < bound);

        for term in pseudo_boolean.terms() {
            if term.literal == literal || self.core.value(term.literal) != Some(false) {
                continue;
            }
            if slack + u64::from(term.weight) < bound {
                slack += u64::from(term.weight);
            } else {
                out.push(!term.literal);
            }
        }
    }

    fn get_parity_antecedents(
        &mut self,
        literal: Literal,
        index: ConstraintIndex,
        out: &mut Vec<Literal>,
    ) {
        let constraint = self.arena.get_mut(index);
        let reifier = constraint.reifier();
        let parity = constraint.as_parity_mut();
        cardinal_assert_moderate!(
            parity.literal(0).get_propositional_variable()
                == literal.get_propositional_variable()
                || parity.literal(1).get_propositional_variable()
                    == literal.get_propositional_variable()
        );
        if parity.literal(1).get_propositional_variable() == literal.get_propositional_variable() {
            parity.swap(0, 1);
        }
        let literals: Vec<Literal> = parity.literals()[1..].to_vec();
        if let Some(reifier) = reifier {
            cardinal_assert_moderate!(self.core.value(reifier) == Some(true));
            out.push(reifier);
        }
        for body_literal in literals {
            cardinal_assert_moderate!(self.core.value(body_literal).is_some());
            out.push(if self.core.value(body_literal) == Some(true) {
                body_literal
            } else {
                !body_literal
            });
        }
    }

    /// Parity resolution over a chain of parity reasons: walk the trail
    /// downward from `trail_index`, accumulating the occurrence parity of
    /// every variable pulled in by a parity antecedent. A variable occurring
    /// an even number of times cancels; odd occurrences are resolved through
    /// their own reason. The result is a clause-like antecedent set.
    pub(crate) fn get_xor_antecedents(
        &mut self,
        literal: Literal,
        trail_index: usize,
        justification: Justification,
        out: &mut Vec<Literal>,
    ) {
        let mut literal = literal;
        let mut justification = justification;
        let mut trail_index = trail_index as i64;
        let mut pending_vars: usize = 0;

        self.parity_marks
            .accommodate(crate::basic_types::PropositionalVariable::new(
                self.core.num_vars().saturating_sub(1),
            ), 0);

        loop {
            let mut resolved_through_parity = false;
            if let Justification::Constraint(index) = justification {
                if self.arena.get(index).is_parity() {
                    resolved_through_parity = true;
                    let (reifier, oriented): (Option<Literal>, Vec<Literal>) = {
                        let constraint = self.arena.get(index);
                        let reifier = constraint.reifier();
                        let parity = constraint.as_parity();
                        // every body literal except the resolved variable;
                        // a conflict literal may sit outside the watched pair
                        cardinal_assert_moderate!(parity.literals().iter().any(|l| {
                            l.get_propositional_variable()
                                == literal.get_propositional_variable()
                        }));
                        let rest = parity
                            .literals()
                            .iter()
                            .copied()
                            .filter(|l| {
                                l.get_propositional_variable()
                                    != literal.get_propositional_variable()
                            })
                            .collect();
                        (reifier, rest)
                    };
                    if let Some(reifier) = reifier {
                        if self.core.lvl(reifier) > 0 {
                            out.push(reifier);
                        }
                    }
                    for body_literal in oriented {
                        let oriented_literal = if self.core.value(body_literal) == Some(true) {
                            body_literal
                        } else {
                            !body_literal
                        };
                        let variable = oriented_literal.get_propositional_variable();
                        if self.parity_marks[variable] == 0 {
                            pending_vars += 1;
                        }
                        self.parity_marks[variable] += 1;
                    }
                }
            }
            if !resolved_through_parity {
                out.push(literal);
            }

            // find the next odd-parity variable on the trail
            let next_variable = loop {
                if pending_vars == 0 {
                    return;
                }
                cardinal_assert_moderate!(trail_index >= 0);
                let trail_literal = self
                    .core
                    .assignments()
                    .get_trail_entry(trail_index as usize);
                let variable = trail_literal.get_propositional_variable();
                let occurrences = self.parity_marks[variable];
                if occurrences > 0 {
                    self.parity_marks[variable] = 0;
                    pending_vars -= 1;
                    if occurrences % 2 == 1 {
                        break variable;
                    }
                }
                trail_index -= 1;
            };

            // resolve through the odd variable's own reason
            literal = self
                .core
                .assignments()
                .get_trail_entry(trail_index as usize);
            cardinal_assert_moderate!(literal.get_propositional_variable() == next_variable);
            trail_index -= 1;
            justification = self.core.assignments().get_variable_justification(next_variable);
        }
    }
}
