use log::debug;

use crate::basic_types::ConstraintIndex;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::basic_types::WeightedLiteral;
use crate::cardinal_assert_advanced;
use crate::cardinal_assert_moderate;
use crate::cardinal_assert_simple;
use crate::engine::Justification;
use crate::fixplex::numeral;
use crate::solver::CardinalSolver;

/// The product of a successful conflict resolution: the asserting lemma as a
/// clause (asserting literal first), the level to backjump to, and the
/// cardinality or pseudo-Boolean constraint learned alongside it, if any.
#[derive(Clone, Debug)]
pub struct ConflictResolution {
    pub lemma: Vec<Literal>,
    pub backjump_level: usize,
    pub learned_constraint: Option<ConstraintIndex>,
}

impl CardinalSolver {
    /// Generalised conflict resolution: starting from the recorded conflict,
    /// walk the trail in reverse and fold each reason into the running
    /// inequality, cancelling the resolved literal and tightening with a gcd
    /// cut after every step, until exactly one variable of the conflict
    /// level remains. Returns `None` when resolution must fall back to the
    /// core (overflow, runaway multipliers, or a root conflict).
    pub fn resolve_conflict(&mut self) -> Option<ConflictResolution> {
        if self.num_propagations_since_pop == 0 {
            return None;
        }
        let stored = self.core.get_conflict()?;
        self.resolver.overflow = false;
        self.reset_coeffs();
        self.resolver.num_marks = 0;
        self.resolver.bound = 0;
        if self.core.num_vars() > 0 {
            let last = PropositionalVariable::new(self.core.num_vars() - 1);
            self.resolver.coeffs.accommodate(last, 0);
        }

        let mut consequent = stored.not_literal;
        let mut justification = stored.justification;
        self.resolver.conflict_level = self.conflict_max_level(consequent, justification);
        if let Some(not_literal) = consequent {
            let negated = !not_literal;
            consequent = Some(negated);
            self.process_antecedent(negated, 1);
        }
        let mut trail_index = self.core.assignments().num_trail_entries() as i64 - 1;
        let mut offset: u32 = 1;

        loop {
            if self.resolver.overflow || offset > (1 << 12) {
                debug!("resolution abandoned, offset {offset}");
                return self.bail_out(trail_index);
            }

            if offset != 0 {
                self.resolve_step(consequent, justification, offset, trail_index);
                if self.resolver.overflow {
                    return self.bail_out(trail_index);
                }
                cardinal_assert_advanced!(self.validate_lemma());
                self.cut();
            }

            // find the next marked variable in the assignment stack
            let variable = loop {
                if trail_index < 0 {
                    return self.bail_out(trail_index);
                }
                let candidate = self
                    .core
                    .assignments()
                    .get_trail_entry(trail_index as usize)
                    .get_propositional_variable();
                if self.core.is_marked(candidate) {
                    break candidate;
                }
                if trail_index == 0 {
                    debug!("did not find marked literal");
                    return self.bail_out(trail_index);
                }
                trail_index -= 1;
            };

            cardinal_assert_moderate!(self.core.lvl_var(variable) == self.resolver.conflict_level);
            let literal = self
                .core
                .assignments()
                .get_trail_entry(trail_index as usize);
            self.core.reset_mark(variable);
            trail_index -= 1;
            self.resolver.num_marks -= 1;
            justification = self
                .core
                .assignments()
                .get_variable_justification(variable);
            offset = self.get_abs_coeff(variable);
            // clip the multiplier to the bound to prevent coefficient
            // explosion
            if offset > self.resolver.bound {
                let bound = i64::from(self.resolver.bound);
                self.resolver.coeffs[variable] =
                    if self.get_coeff(variable) < 0 { -bound } else { bound };
                offset = self.resolver.bound;
            }
            cardinal_assert_moderate!(self.core.value(literal) == Some(true));
            consequent = Some(literal);

            if self.resolver.num_marks == 0 {
                break;
            }
        }

        cardinal_assert_advanced!(self.validate_lemma());
        self.normalize_active_coeffs();

        if !self.create_asserting_lemma() {
            return self.bail_out(-1);
        }

        let learned_constraint = self.active2card();

        if self.resolver.overflow {
            return self.bail_out(-1);
        }

        let asserting = self
            .resolver
            .asserting
            .expect("an asserting lemma has an asserting literal");
        let mut lemma = Vec::with_capacity(1 + self.resolver.lemma.len());
        lemma.push(asserting);
        lemma.extend_from_slice(&self.resolver.lemma);
        let backjump_level = self.resolver.lemma.iter().fold(0, |level, literal| {
            std::cmp::max(level, self.core.lvl(*literal))
        });
        cardinal_assert_moderate!(lemma
            .iter()
            .all(|literal| self.core.value(*literal) == Some(false)));

        Some(ConflictResolution {
            lemma,
            backjump_level,
            learned_constraint,
        })
    }

    /// Fold one reason into the running inequality with multiplier `offset`.
    fn resolve_step(
        &mut self,
        consequent: Option<Literal>,
        justification: Justification,
        offset: u32,
        trail_index: i64,
    ) {
        match justification {
            Justification::Decision => {
                cardinal_assert_simple!(consequent.is_some());
                self.inc_bound(i64::from(offset));
            }
            Justification::Binary(other) => {
                self.inc_bound(i64::from(offset));
                let consequent = consequent.expect("binary reasons justify a literal");
                self.inc_coeff(consequent, offset);
                self.process_antecedent(other, offset);
            }
            Justification::Ternary(second, third) => {
                self.inc_bound(i64::from(offset));
                let consequent = consequent.expect("ternary reasons justify a literal");
                self.inc_coeff(consequent, offset);
                self.process_antecedent(second, offset);
                self.process_antecedent(third, offset);
            }
            Justification::Clause(reference) => {
                self.inc_bound(i64::from(offset));
                let literals = self
                    .core
                    .clause_database()
                    .get_clause(reference)
                    .get_literal_slice()
                    .to_vec();
                if let Some(consequent) = consequent {
                    self.inc_coeff(consequent, offset);
                }
                let mut skipped_consequent = false;
                for literal in literals {
                    if !skipped_consequent && Some(literal) == consequent {
                        skipped_consequent = true;
                        continue;
                    }
                    self.process_antecedent(literal, offset);
                }
            }
            Justification::Constraint(index) => {
                self.statistics.num_resolutions += 1;
                let constraint = self.arena.get(index);
                if constraint.is_cardinality() {
                    let bound = constraint.as_cardinality().k();
                    self.inc_bound(i64::from(offset) * i64::from(bound));
                    self.process_card(index, offset);
                } else if constraint.is_pseudo_boolean() {
                    let consequent =
                        consequent.expect("pseudo-Boolean reasons justify a literal");
                    self.inc_bound(i64::from(offset));
                    self.inc_coeff(consequent, offset);
                    let mut antecedents = Vec::new();
                    self.get_antecedents(consequent, index, &mut antecedents);
                    for antecedent in antecedents {
                        self.process_antecedent(!antecedent, offset);
                    }
                } else {
                    let consequent = consequent.expect("parity reasons justify a literal");
                    self.inc_bound(i64::from(offset));
                    self.inc_coeff(consequent, offset);
                    let mut antecedents = Vec::new();
                    self.get_xor_antecedents(
                        consequent,
                        trail_index.max(0) as usize,
                        justification,
                        &mut antecedents,
                    );
                    for antecedent in antecedents {
                        self.process_antecedent(!antecedent, offset);
                    }
                }
            }
        }
    }

    /// A false antecedent literal enters the inequality; variables at the
    /// conflict level are marked for resolution.
    pub(crate) fn process_antecedent(&mut self, literal: Literal, offset: u32) {
        cardinal_assert_moderate!(self.core.value(literal) == Some(false));
        let variable = literal.get_propositional_variable();
        let level = self.core.lvl_var(variable);

        if level > 0 && !self.core.is_marked(variable) && level == self.resolver.conflict_level {
            self.core.mark(variable);
            self.resolver.num_marks += 1;
        }
        self.inc_coeff(literal, offset);
    }

    /// A cardinality reason enters the inequality whole: the watched head
    /// contributes coefficients, the false tail and the reifier are
    /// antecedents (the reifier weighted by `offset * k`).
    pub(crate) fn process_card(&mut self, index: ConstraintIndex, offset: u32) {
        let (bound, size, reifier) = {
            let constraint = self.arena.get(index);
            let cardinality = constraint.as_cardinality();
            (
                cardinality.k() as usize,
                cardinality.size(),
                constraint.reifier(),
            )
        };
        cardinal_assert_simple!(bound <= size && offset > 0);
        for position in bound..size {
            let literal = self.arena.get(index).as_cardinality().literal(position);
            self.process_antecedent(literal, offset);
        }
        for position in 0..bound {
            let literal = self.arena.get(index).as_cardinality().literal(position);
            self.inc_coeff(literal, offset);
        }
        if let Some(reifier) = reifier {
            let weighted = u64::from(offset) * u64::from(bound as u32);
            if weighted > u64::from(u32::MAX) {
                self.resolver.overflow = true;
            } else {
                self.process_antecedent(!reifier, weighted as u32);
            }
        }
    }

    /// Add `offset` (signed by the literal's polarity) to the coefficient of
    /// the literal's variable. Cancellation against the opposite polarity
    /// adjusts the bound; the result is clipped to the bound in signed
    /// 64-bit arithmetic, with the overflow flag latched on any departure
    /// from the 32-bit coefficient range.
    pub(crate) fn inc_coeff(&mut self, literal: Literal, offset: u32) {
        cardinal_assert_simple!(offset > 0);
        let variable = literal.get_propositional_variable();
        self.resolver.coeffs.accommodate(variable, 0);

        let coeff0 = self.resolver.coeffs[variable];
        if coeff0 == 0 {
            self.resolver.active_vars.push(variable);
        }

        let signed_offset = i64::from(offset);
        let inc = if literal.is_negative() {
            -signed_offset
        } else {
            signed_offset
        };
        let coeff1 = inc + coeff0;
        self.resolver.coeffs[variable] = coeff1;
        if coeff1 > i64::from(i32::MAX) || coeff1 < i64::from(i32::MIN) {
            self.resolver.overflow = true;
            return;
        }

        if coeff0 > 0 && inc < 0 {
            self.inc_bound(std::cmp::max(0, coeff1) - coeff0);
        } else if coeff0 < 0 && inc > 0 {
            self.inc_bound(coeff0 - std::cmp::min(0, coeff1));
        }

        // reduce the coefficient to be no larger than the bound
        let bound = i64::from(self.resolver.bound);
        if coeff1 > bound {
            self.resolver.coeffs[variable] = bound;
        } else if coeff1 < -bound {
            self.resolver.coeffs[variable] = -bound;
        }
    }

    pub(crate) fn inc_bound(&mut self, delta: i64) {
        if delta < i64::from(i32::MIN) || delta > i64::from(i32::MAX) {
            self.resolver.overflow = true;
            return;
        }
        let new_bound = i64::from(self.resolver.bound) + delta;
        if new_bound < 0 || new_bound > i64::from(u32::MAX) {
            self.resolver.overflow = true;
        } else {
            self.resolver.bound = new_bound as u32;
        }
    }

    pub(crate) fn get_coeff(&self, variable: PropositionalVariable) -> i64 {
        use crate::basic_types::StorageKey;
        if (variable.index() as usize) < self.resolver.coeffs.len() {
            self.resolver.coeffs[variable]
        } else {
            0
        }
    }

    pub(crate) fn get_abs_coeff(&mut self, variable: PropositionalVariable) -> u32 {
        let coeff = self.get_coeff(variable);
        if coeff < i64::from(i32::MIN) + 1 || coeff > i64::from(u32::MAX) {
            self.resolver.overflow = true;
            return u32::MAX;
        }
        coeff.unsigned_abs() as u32
    }

    pub(crate) fn reset_coeffs(&mut self) {
        let resolver = &mut self.resolver;
        for &variable in &resolver.active_vars {
            resolver.coeffs[variable] = 0;
        }
        resolver.active_vars.clear();
    }

    /// Drop duplicate and zero-coefficient entries from the active variable
    /// list, preserving the append order of the survivors.
    pub(crate) fn normalize_active_coeffs(&mut self) {
        let resolver = &mut self.resolver;
        resolver.active_var_set.clear();
        let mut kept = 0;
        for position in 0..resolver.active_vars.len() {
            let variable = resolver.active_vars[position];
            if resolver.coeffs[variable] != 0 && resolver.active_var_set.insert(variable) {
                resolver.active_vars[kept] = variable;
                kept += 1;
            }
        }
        resolver.active_vars.truncate(kept);
    }

    /// Divide the inequality by the gcd of its coefficients and round the
    /// bound up; entailment over 0/1 models is preserved. Bypassed as soon
    /// as a unit coefficient is seen.
    pub(crate) fn cut(&mut self) {
        for &variable in &self.resolver.active_vars {
            if self.resolver.coeffs[variable].unsigned_abs() == 1 {
                return;
            }
        }

        let mut divisor: u64 = 0;
        for position in 0..self.resolver.active_vars.len() {
            let variable = self.resolver.active_vars[position];
            let coeff = self.resolver.coeffs[variable];
            if coeff == 0 {
                continue;
            }
            let mut magnitude = coeff.unsigned_abs();
            if u64::from(self.resolver.bound) < magnitude {
                let bound = i64::from(self.resolver.bound);
                self.resolver.coeffs[variable] = if coeff > 0 { bound } else { -bound };
                magnitude = u64::from(self.resolver.bound);
            }
            cardinal_assert_simple!(0 < magnitude && magnitude <= u64::from(self.resolver.bound));
            divisor = if divisor == 0 {
                magnitude
            } else {
                numeral::gcd(divisor, magnitude)
            };
            if divisor == 1 {
                break;
            }
        }

        if divisor >= 2 {
            self.normalize_active_coeffs();
            let resolver = &mut self.resolver;
            for &variable in &resolver.active_vars {
                resolver.coeffs[variable] /= divisor as i64;
            }
            resolver.bound =
                ((u64::from(resolver.bound) + divisor - 1) / divisor) as u32;
            self.statistics.num_cuts += 1;
        }
    }

    /// Extract the asserting lemma from the inequality: the false literals
    /// whose weight is needed to push the slack negative, with the
    /// heaviest conflict-level literal as the asserting one. When no
    /// conflict-level literal ends up in the lemma, the conflict level is
    /// lowered to the deepest remaining literal and the extraction retried
    /// (a dynamic backjump).
    fn create_asserting_lemma(&mut self) -> bool {
        loop {
            let mut slack: i64 = -i64::from(self.resolver.bound);
            for &variable in &self.resolver.active_vars {
                slack += self.resolver.coeffs[variable].unsigned_abs() as i64;
            }

            self.resolver.lemma.clear();
            self.resolver.asserting = None;
            let mut num_skipped: u32 = 0;
            let mut asserting_coeff: i64 = 0;
            let mut position = 0;
            while slack >= 0 && position < self.resolver.active_vars.len() {
                let variable = self.resolver.active_vars[position];
                position += 1;
                let coeff = self.resolver.coeffs[variable];
                if coeff == 0 || self.core.assignments().is_variable_unassigned(variable) {
                    continue;
                }
                let is_true = self.core.assignments().is_variable_assigned_true(variable);
                if (coeff < 0) != is_true {
                    continue;
                }
                // the currently-false literal of this term
                let false_literal = !Literal::new(variable, is_true);
                let magnitude = coeff.unsigned_abs() as i64;
                if self.core.lvl_var(variable) == self.resolver.conflict_level {
                    match self.resolver.asserting {
                        None => {
                            asserting_coeff = magnitude;
                            slack -= magnitude;
                            self.resolver.asserting = Some(false_literal);
                        }
                        Some(_) => {
                            num_skipped += 1;
                            if asserting_coeff < magnitude {
                                slack -= magnitude - asserting_coeff;
                                self.resolver.asserting = Some(false_literal);
                                asserting_coeff = magnitude;
                            }
                        }
                    }
                } else {
                    slack -= magnitude;
                    self.resolver.lemma.push(false_literal);
                }
            }

            if slack >= 0 {
                debug!(
                    "lemma is not asserting, slack {slack}, skipped {num_skipped}"
                );
                return false;
            }

            if self.resolver.asserting.is_none() {
                if self.resolver.lemma.is_empty() {
                    // conflict at the root
                    self.core.set_conflict(Justification::Decision, None);
                    return false;
                }
                let old_level = self.resolver.conflict_level;
                self.resolver.conflict_level = self
                    .resolver
                    .lemma
                    .iter()
                    .fold(0, |level, literal| {
                        std::cmp::max(level, self.core.lvl(*literal))
                    });
                debug!(
                    "backjump, new level {}, old level {old_level}",
                    self.resolver.conflict_level
                );
                continue;
            }
            return true;
        }
    }

    /// Try to learn the smallest cardinality constraint implied by the
    /// inequality: sort the weights descending and take the shortest prefix
    /// whose weight sum crosses the bound. When the cardinality form is not
    /// asserting under the current assignment, the pseudo-Boolean inequality
    /// itself is learned instead.
    fn active2card(&mut self) -> Option<ConstraintIndex> {
        self.normalize_active_coeffs();
        let mut wlits = std::mem::take(&mut self.resolver.wlits);
        wlits.clear();
        for position in 0..self.resolver.active_vars.len() {
            let variable = self.resolver.active_vars[position];
            let weight = self.get_abs_coeff(variable);
            let is_positive = self.get_coeff(variable) >= 0;
            wlits.push(WeightedLiteral::new(
                weight,
                Literal::new(variable, is_positive),
            ));
        }
        wlits.sort_by(|a, b| b.weight.cmp(&a.weight));

        let bound = u64::from(self.resolver.bound);
        let mut k: usize = 0;
        let mut sum: u64 = 0;
        let mut sum_without_last: u64 = 0;
        for wlit in &wlits {
            if sum >= bound {
                break;
            }
            sum_without_last = sum;
            sum += u64::from(wlit.weight);
            k += 1;
        }
        if k == 1 {
            // a unit lemma; the clause is enough
            self.resolver.wlits = wlits;
            return None;
        }
        // trim trailing literals that cannot influence the threshold
        while let Some(last) = wlits.last() {
            if u64::from(last.weight) + sum_without_last >= bound {
                break;
            }
            sum_without_last += u64::from(last.weight);
            let _ = wlits.pop();
        }

        let num_non_false = wlits
            .iter()
            .filter(|wlit| self.core.value(wlit.literal) != Some(false))
            .count();
        if self.resolver.overflow {
            self.resolver.wlits = wlits;
            return None;
        }

        if num_non_false >= k {
            // not asserting as a cardinality constraint; learn the
            // pseudo-Boolean inequality instead
            self.resolver.wlits = wlits;
            return self.active2constraint();
        }

        let literals: Vec<Literal> = wlits.iter().map(|wlit| wlit.literal).collect();
        let false_literals: Vec<Literal> = wlits
            .iter()
            .map(|wlit| wlit.literal)
            .filter(|literal| self.core.value(*literal) == Some(false))
            .collect();
        self.resolver.wlits = wlits;

        let index = self
            .add_at_least(None, literals, k as u32, true)
            .unwrap_or(None);
        if let Some(index) = index {
            let glue = self.core.assignments().num_diff_levels(&false_literals);
            self.arena.get_mut(index).set_glue(glue);
        }
        index
    }

    /// Learn the inequality itself as a pseudo-Boolean constraint.
    fn active2constraint(&mut self) -> Option<ConstraintIndex> {
        if self.resolver.bound == 1 || self.resolver.overflow {
            return None;
        }
        self.normalize_active_coeffs();
        let mut wlits = Vec::with_capacity(self.resolver.active_vars.len());
        let mut sum: u64 = 0;
        for position in 0..self.resolver.active_vars.len() {
            let variable = self.resolver.active_vars[position];
            let weight = self.get_abs_coeff(variable);
            let is_positive = self.get_coeff(variable) >= 0;
            wlits.push(WeightedLiteral::new(
                weight,
                Literal::new(variable, is_positive),
            ));
            sum += u64::from(weight);
        }
        if self.resolver.overflow || sum >= u64::from(u32::MAX) / 2 {
            return None;
        }
        self.add_pb_ge(None, wlits, self.resolver.bound, true)
            .unwrap_or(None)
    }

    /// The deepest level involved in the conflict: the consequent's level
    /// together with every assigned literal of the justification.
    fn conflict_max_level(
        &self,
        consequent: Option<Literal>,
        justification: Justification,
    ) -> usize {
        let mut level = consequent
            .filter(|literal| self.core.assignments().is_literal_assigned(*literal))
            .map_or(0, |literal| self.core.lvl(literal));
        let mut visit = |literal: Literal, level: &mut usize| {
            if self.core.assignments().is_literal_assigned(literal) {
                *level = std::cmp::max(*level, self.core.lvl(literal));
            }
        };
        match justification {
            Justification::Decision => {}
            Justification::Binary(other) => visit(other, &mut level),
            Justification::Ternary(second, third) => {
                visit(second, &mut level);
                visit(third, &mut level);
            }
            Justification::Clause(reference) => {
                for &literal in self
                    .core
                    .clause_database()
                    .get_clause(reference)
                    .get_literal_slice()
                {
                    visit(literal, &mut level);
                }
            }
            Justification::Constraint(index) => {
                if let Some(constraint) = self.arena.try_get(index) {
                    for position in 0..constraint.size() {
                        visit(constraint.get_literal(position), &mut level);
                    }
                    if let Some(reifier) = constraint.reifier() {
                        visit(reifier, &mut level);
                    }
                }
            }
        }
        level
    }

    /// Abandon the in-flight resolution: clear the overflow latch and
    /// remove the remaining marks from the trail.
    fn bail_out(&mut self, trail_index: i64) -> Option<ConflictResolution> {
        self.resolver.overflow = false;
        let mut trail_index = trail_index;
        while self.resolver.num_marks > 0 && trail_index >= 0 {
            let variable = self
                .core
                .assignments()
                .get_trail_entry(trail_index as usize)
                .get_propositional_variable();
            if self.core.is_marked(variable) {
                self.core.reset_mark(variable);
                self.resolver.num_marks -= 1;
            }
            trail_index -= 1;
        }
        self.resolver.num_marks = 0;
        None
    }
}
