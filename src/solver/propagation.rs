use crate::basic_types::ConstraintIndex;
use crate::basic_types::Literal;
use crate::cardinal_assert_advanced;
use crate::cardinal_assert_moderate;
use crate::cardinal_assert_simple;
use crate::engine::Justification;
use crate::solver::CardinalSolver;

/// The in-band result of [CardinalSolver::add_assign]: a falsified watch
/// either conflicts, carries no information for the caller (the watch moved
/// or was stale), or propagated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagationOutcome {
    Conflict,
    NoInformation,
    Propagated,
}

impl CardinalSolver {
    /// Entry point for the core's watch dispatch: `literal` has just become
    /// true and `index` sits on its watch list. Returns whether the watch
    /// entry should be kept.
    pub fn propagate(&mut self, literal: Literal, index: ConstraintIndex) -> bool {
        cardinal_assert_moderate!(self.core.value(literal) == Some(true));
        let Some(constraint) = self.arena.try_get(index) else {
            return false;
        };
        if constraint.is_removed() {
            return false;
        }
        let reifier = constraint.reifier();
        if reifier.is_some_and(|reifier| {
            reifier.get_propositional_variable() == literal.get_propositional_variable()
        }) {
            // the reifier became assigned: re-initialise under the assigned
            // polarity and keep both reifier watches
            let _ = self.init_watch(index, literal.is_positive());
            true
        } else if reifier.is_some_and(|reifier| self.core.value(reifier) != Some(true)) {
            true
        } else {
            self.add_assign(index, !literal) != PropagationOutcome::NoInformation
        }
    }

    /// Process all trail literals that have not been pushed through the
    /// extension watch lists yet. Stops at the first recorded conflict.
    pub fn propagate_pending(&mut self) {
        while !self.core.inconsistent()
            && self.next_position_on_trail_to_propagate
                < self.core.assignments().num_trail_entries()
        {
            let position = self.next_position_on_trail_to_propagate;
            let true_literal = self.core.assignments().get_trail_entry(position);
            self.next_position_on_trail_to_propagate += 1;

            if self.core.watch_list().get(true_literal).is_empty() {
                continue;
            }

            // compact in place: entries whose constraint moved its watch are
            // dropped, everything else is kept
            let mut entries = std::mem::take(self.core.get_wlist(true_literal));
            let mut end_index = 0;
            for current_index in 0..entries.len() {
                let entry = entries[current_index];
                // on conflict the remaining watchers are put back untouched
                let keep = if entry.is_constraint() && !self.core.inconsistent() {
                    self.propagate(true_literal, entry.get_constraint_index())
                } else {
                    true
                };
                if keep {
                    entries[end_index] = entry;
                    end_index += 1;
                }
            }
            entries.truncate(end_index);
            let wlist = self.core.get_wlist(true_literal);
            // watches added while processing stay
            let added = std::mem::take(wlist);
            *wlist = entries;
            wlist.extend(added);
        }
    }

    pub(crate) fn init_watch(&mut self, index: ConstraintIndex, is_true: bool) -> bool {
        if self.core.inconsistent() {
            return false;
        }
        let constraint = self.arena.get(index);
        if constraint.is_cardinality() {
            self.init_watch_card(index, is_true)
        } else if constraint.is_pseudo_boolean() {
            self.init_watch_pb(index, is_true)
        } else {
            self.init_watch_xor(index, is_true)
        }
    }

    pub(crate) fn add_assign(
        &mut self,
        index: ConstraintIndex,
        literal: Literal,
    ) -> PropagationOutcome {
        let constraint = self.arena.get(index);
        if constraint.is_cardinality() {
            self.add_assign_card(index, literal)
        } else if constraint.is_pseudo_boolean() {
            self.add_assign_pb(index, literal)
        } else {
            self.add_assign_xor(index, literal)
        }
    }

    pub(crate) fn clear_watch(&mut self, index: ConstraintIndex) {
        let constraint = self.arena.get(index);
        if constraint.is_cardinality() {
            self.clear_watch_card(index);
        } else if constraint.is_pseudo_boolean() {
            self.clear_watch_pb(index);
        } else {
            self.clear_watch_xor(index);
        }
    }

    pub(crate) fn nullify_tracking_literal(&mut self, index: ConstraintIndex) {
        let Some(reifier) = self.arena.get(index).reifier() else {
            return;
        };
        self.core.watch_list_mut().unwatch_constraint(reifier, index);
        self.core
            .watch_list_mut()
            .unwatch_constraint(!reifier, index);
        self.arena.get_mut(index).nullify_reifier();
    }

    pub(crate) fn watch_literal(&mut self, literal: Literal, index: ConstraintIndex) {
        self.core.watch_list_mut().watch_constraint(literal, index);
    }

    pub(crate) fn unwatch_literal(&mut self, literal: Literal, index: ConstraintIndex) {
        self.core
            .watch_list_mut()
            .unwatch_constraint(literal, index);
    }

    /// Make `literal` true as a consequence of constraint `index`.
    pub(crate) fn assign_from(&mut self, index: ConstraintIndex, literal: Literal) {
        if self.core.inconsistent() {
            return;
        }
        match self.core.value(literal) {
            Some(true) => {}
            Some(false) => self.set_conflict_from(index, literal),
            None => {
                self.statistics.num_propagations += 1;
                self.num_propagations_since_pop += 1;
                cardinal_assert_advanced!(self.validate_unit_propagation(index, literal));
                self.core
                    .assign(literal, Justification::Constraint(index));
            }
        }
    }

    /// Record a conflict on constraint `index` with `literal` false.
    pub(crate) fn set_conflict_from(&mut self, index: ConstraintIndex, literal: Literal) {
        self.statistics.num_conflicts += 1;
        let mut literal = literal;
        if self.arena.get(index).is_parity() && self.core.value(literal) == Some(true) {
            literal = !literal;
        }
        cardinal_assert_moderate!(self.core.value(literal) == Some(false));
        self.core
            .set_conflict(Justification::Constraint(index), Some(!literal));
    }

    fn negate_if_sign_opposes(&mut self, index: ConstraintIndex, is_true: bool) {
        let constraint = self.arena.get(index);
        if constraint
            .reifier()
            .is_some_and(|reifier| reifier.is_negative() == is_true)
        {
            if constraint.is_parity() {
                self.negate_parity(index);
            } else {
                self.arena.get_mut(index).negate();
            }
        }
        cardinal_assert_moderate!(self
            .arena
            .get(index)
            .reifier()
            .map_or(true, |reifier| self.core.value(reifier) == Some(true)));
    }

    /// `~(a xor b xor ...) == (~a) xor b xor ...`: flipping the reifier and
    /// one body literal preserves the equivalence.
    fn negate_parity(&mut self, index: ConstraintIndex) {
        let constraint = self.arena.get_mut(index);
        if let Some(reifier) = constraint.reifier() {
            constraint.set_reifier(!reifier);
        }
        let parity = constraint.as_parity_mut();
        let flipped = !parity.literal(0);
        parity.set_literal(0, flipped);
    }

    // ----------------------
    // cardinality

    pub(crate) fn init_watch_card(&mut self, index: ConstraintIndex, is_true: bool) -> bool {
        self.clear_watch_card(index);
        self.negate_if_sign_opposes(index, is_true);

        let (size, bound) = {
            let cardinality = self.arena.get(index).as_cardinality();
            (cardinality.size(), cardinality.k() as usize)
        };

        if bound == size {
            // every literal is forced
            for position in 0..size {
                let literal = self.arena.get(index).as_cardinality().literal(position);
                self.assign_from(index, literal);
            }
            return false;
        }

        // put the non-false literals into the head
        let mut non_false = 0;
        for position in 0..size {
            let literal = self.arena.get(index).as_cardinality().literal(position);
            if self.core.value(literal) != Some(false) {
                if non_false != position {
                    self.arena
                        .get_mut(index)
                        .as_cardinality_mut()
                        .swap(position, non_false);
                }
                non_false += 1;
            }
        }

        if non_false < bound {
            cardinal_assert_simple!(0 < bound && bound < size);
            // conflict: the asserting literal must have maximal assignment
            // level so conflict resolution can start from it
            let mut asserting = self.arena.get(index).as_cardinality().literal(non_false);
            for position in bound..size {
                let candidate = self.arena.get(index).as_cardinality().literal(position);
                if self.core.lvl(asserting) < self.core.lvl(candidate) {
                    self.arena
                        .get_mut(index)
                        .as_cardinality_mut()
                        .swap(position, non_false);
                    asserting = self.arena.get(index).as_cardinality().literal(non_false);
                }
            }
            self.set_conflict_from(index, asserting);
            false
        } else if non_false == bound {
            for position in 0..bound {
                let literal = self.arena.get(index).as_cardinality().literal(position);
                self.assign_from(index, literal);
            }
            false
        } else {
            for position in 0..=bound {
                let literal = self.arena.get(index).as_cardinality().literal(position);
                self.watch_literal(literal, index);
            }
            true
        }
    }

    pub(crate) fn clear_watch_card(&mut self, index: ConstraintIndex) {
        let cardinality = self.arena.get(index).as_cardinality();
        let watched = std::cmp::min(cardinality.k() as usize + 1, cardinality.size());
        let literals: Vec<Literal> = cardinality.literals()[..watched].to_vec();
        for literal in literals {
            self.unwatch_literal(literal, index);
        }
    }

    /// `literal` is a watched literal of the cardinality constraint that
    /// just became false.
    fn add_assign_card(&mut self, index: ConstraintIndex, literal: Literal) -> PropagationOutcome {
        let (size, bound) = {
            let cardinality = self.arena.get(index).as_cardinality();
            (cardinality.size(), cardinality.k() as usize)
        };
        cardinal_assert_simple!(0 < bound && bound <= size);

        if bound == size {
            self.set_conflict_from(index, literal);
            return PropagationOutcome::Conflict;
        }

        cardinal_assert_moderate!(self.core.value(literal) == Some(false));
        cardinal_assert_moderate!(self
            .arena
            .get(index)
            .reifier()
            .map_or(true, |reifier| self.core.value(reifier) == Some(true)));

        // locate the falsified watch among the first bound + 1 positions
        let mut watch_position = None;
        for position in 0..=bound {
            if self.arena.get(index).as_cardinality().literal(position) == literal {
                watch_position = Some(position);
                break;
            }
        }
        let Some(watch_position) = watch_position else {
            // the literal is no longer watched
            return PropagationOutcome::NoInformation;
        };

        // find a literal to swap with
        for position in bound + 1..size {
            let candidate = self.arena.get(index).as_cardinality().literal(position);
            if self.core.value(candidate) != Some(false) {
                self.arena
                    .get_mut(index)
                    .as_cardinality_mut()
                    .swap(watch_position, position);
                self.watch_literal(candidate, index);
                return PropagationOutcome::NoInformation;
            }
        }

        // no replacement: if the backup watch is false as well the
        // constraint is conflicting
        let backup = self.arena.get(index).as_cardinality().literal(bound);
        if watch_position != bound && self.core.value(backup) == Some(false) {
            self.set_conflict_from(index, literal);
            return PropagationOutcome::Conflict;
        }

        // prepare for unit propagation by moving the false literal into
        // position bound; the literals in front of it are all forced
        if watch_position != bound {
            self.arena
                .get_mut(index)
                .as_cardinality_mut()
                .swap(watch_position, bound);
        }
        for position in 0..bound {
            let forced = self.arena.get(index).as_cardinality().literal(position);
            self.assign_from(index, forced);
        }

        let (is_learned, glue) = {
            let constraint = self.arena.get(index);
            (constraint.is_learned(), constraint.glue())
        };
        if is_learned && glue > 2 {
            let literals = self.arena.get(index).as_cardinality().literals().to_vec();
            if let Some(improved) = self
                .core
                .assignments()
                .num_diff_false_levels_below(&literals, glue)
            {
                self.arena.get_mut(index).set_glue(improved);
            }
        }

        if self.core.inconsistent() {
            PropagationOutcome::Conflict
        } else {
            PropagationOutcome::Propagated
        }
    }

    // ----------------------
    // pseudo-Boolean (watched prefix whose weight sum exceeds the bound)

    pub(crate) fn init_watch_pb(&mut self, index: ConstraintIndex, is_true: bool) -> bool {
        self.clear_watch_pb(index);
        self.negate_if_sign_opposes(index, is_true);

        let (size, bound) = {
            let pseudo_boolean = self.arena.get(index).as_pseudo_boolean();
            (pseudo_boolean.size(), pseudo_boolean.k())
        };

        // put the non-false literals into the head and grow the watched
        // prefix until its weight sum exceeds the bound
        let mut slack: u32 = 0;
        let mut slack_rest: u32 = 0;
        let mut num_watch = 0;
        let mut non_false = 0;
        for position in 0..size {
            let term = self.arena.get(index).as_pseudo_boolean().term(position);
            if self.core.value(term.literal) != Some(false) {
                if non_false != position {
                    self.arena
                        .get_mut(index)
                        .as_pseudo_boolean_mut()
                        .swap(position, non_false);
                }
                if slack <= bound {
                    slack += term.weight;
                    num_watch += 1;
                } else {
                    slack_rest += term.weight;
                }
                non_false += 1;
            }
        }

        if slack < bound {
            // conflict: report the false literal with maximal level
            let mut conflict_literal = self.arena.get(index).as_pseudo_boolean().literal(non_false);
            for position in non_false + 1..size {
                let candidate = self.arena.get(index).as_pseudo_boolean().literal(position);
                if self.core.lvl(conflict_literal) < self.core.lvl(candidate) {
                    conflict_literal = candidate;
                }
            }
            self.set_conflict_from(index, conflict_literal);
            false
        } else {
            for position in 0..num_watch {
                let literal = self.arena.get(index).as_pseudo_boolean().literal(position);
                self.watch_literal(literal, index);
            }
            {
                let pseudo_boolean = self.arena.get_mut(index).as_pseudo_boolean_mut();
                pseudo_boolean.set_slack(slack);
                pseudo_boolean.set_num_watch(num_watch);
            }
            cardinal_assert_advanced!(self.validate_watch_pb(index));

            if u64::from(slack) + u64::from(slack_rest) == u64::from(bound) {
                // the slack is tight: every non-false literal is forced
                cardinal_assert_simple!(slack_rest == 0 && non_false == num_watch);
                for position in 0..non_false {
                    let literal = self.arena.get(index).as_pseudo_boolean().literal(position);
                    self.assign_from(index, literal);
                }
            }
            true
        }
    }

    pub(crate) fn clear_watch_pb(&mut self, index: ConstraintIndex) {
        let pseudo_boolean = self.arena.get(index).as_pseudo_boolean();
        let literals: Vec<Literal> = pseudo_boolean.terms()[..pseudo_boolean.num_watch()]
            .iter()
            .map(|term| term.literal)
            .collect();
        for literal in literals {
            self.unwatch_literal(literal, index);
        }
        self.arena
            .get_mut(index)
            .as_pseudo_boolean_mut()
            .set_num_watch(0);
    }

    /// `literal` is a watched literal of the pseudo-Boolean constraint that
    /// just became false: shrink the slack, pull replacement watches from
    /// the tail while the slack stays below `bound + a_max`, then either
    /// conflict or propagate the watched literals whose weight no longer
    /// fits in the slack.
    fn add_assign_pb(&mut self, index: ConstraintIndex, literal: Literal) -> PropagationOutcome {
        cardinal_assert_simple!(!self.core.inconsistent());
        let (size, bound, mut num_watch, mut slack) = {
            let pseudo_boolean = self.arena.get(index).as_pseudo_boolean();
            (
                pseudo_boolean.size(),
                pseudo_boolean.k(),
                pseudo_boolean.num_watch(),
                pseudo_boolean.slack(),
            )
        };
        cardinal_assert_moderate!(self.core.value(literal) == Some(false));
        cardinal_assert_moderate!(self
            .arena
            .get(index)
            .reifier()
            .map_or(true, |reifier| self.core.value(reifier) == Some(true)));
        cardinal_assert_simple!(num_watch > 0 && num_watch <= size);

        // collect the unassigned watched terms and the maximal unassigned
        // weight, and locate the falsified watch
        let mut a_max: u32 = 0;
        let mut pending = std::mem::take(&mut self.pb_undef);
        pending.clear();
        let mut watch_position = None;
        for position in 0..num_watch {
            let term = self.arena.get(index).as_pseudo_boolean().term(position);
            if term.literal == literal {
                watch_position = Some(position);
            } else if self.core.value(term.literal).is_none() {
                pending.push((term.weight, term.literal));
                a_max = std::cmp::max(a_max, term.weight);
            }
        }
        let Some(watch_position) = watch_position else {
            self.pb_undef = pending;
            return PropagationOutcome::NoInformation;
        };

        cardinal_assert_advanced!(self.validate_watch_pb(index));

        let weight = self.arena.get(index).as_pseudo_boolean().weight(watch_position);
        cardinal_assert_simple!(weight <= slack);
        slack -= weight;

        // find literals to swap with
        let mut tail = num_watch;
        while tail < size && u64::from(slack) < u64::from(bound) + u64::from(a_max) {
            let term = self.arena.get(index).as_pseudo_boolean().term(tail);
            if self.core.value(term.literal) != Some(false) {
                slack += term.weight;
                self.watch_literal(term.literal, index);
                self.arena
                    .get_mut(index)
                    .as_pseudo_boolean_mut()
                    .swap(num_watch, tail);
                if self.core.value(term.literal).is_none() {
                    pending.push((term.weight, term.literal));
                    a_max = std::cmp::max(a_max, term.weight);
                }
                num_watch += 1;
            }
            tail += 1;
        }

        if slack < bound {
            // maintain the watch; the restored slack keeps the prefix
            // invariant for the next initialisation
            slack += weight;
            {
                let pseudo_boolean = self.arena.get_mut(index).as_pseudo_boolean_mut();
                pseudo_boolean.set_slack(slack);
                pseudo_boolean.set_num_watch(num_watch);
            }
            pending.clear();
            self.pb_undef = pending;
            self.set_conflict_from(index, literal);
            return PropagationOutcome::Conflict;
        }

        // swap out the falsified watch
        num_watch -= 1;
        cardinal_assert_simple!(num_watch > 0);
        {
            let pseudo_boolean = self.arena.get_mut(index).as_pseudo_boolean_mut();
            pseudo_boolean.set_slack(slack);
            pseudo_boolean.set_num_watch(num_watch);
            pseudo_boolean.swap(num_watch, watch_position);
        }

        // slack >= bound, but a watched literal whose weight does not fit
        // must be true
        if u64::from(slack) < u64::from(bound) + u64::from(a_max) {
            for &(candidate_weight, candidate) in &pending {
                if u64::from(slack) < u64::from(bound) + u64::from(candidate_weight) {
                    self.assign_from(index, candidate);
                }
            }
        }

        pending.clear();
        self.pb_undef = pending;

        if self.core.inconsistent() {
            PropagationOutcome::Conflict
        } else {
            PropagationOutcome::NoInformation
        }
    }

    // ----------------------
    // parity (positions 0 and 1 watched in both polarities)

    /// Parity of the assigned literals from `offset` onward; everything
    /// beyond `offset` must be assigned.
    pub(crate) fn parity(&self, index: ConstraintIndex, offset: usize) -> bool {
        let parity = self.arena.get(index).as_parity();
        let mut odd = false;
        for position in offset..parity.size() {
            cardinal_assert_moderate!(self.core.value(parity.literal(position)).is_some());
            if self.core.value(parity.literal(position)) == Some(true) {
                odd = !odd;
            }
        }
        odd
    }

    pub(crate) fn init_watch_xor(&mut self, index: ConstraintIndex, is_true: bool) -> bool {
        self.clear_watch_xor(index);
        self.negate_if_sign_opposes(index, is_true);

        let size = self.arena.get(index).as_parity().size();
        // move unassigned literals to the watched pair
        let mut unassigned = 0;
        for position in 0..size {
            if unassigned >= 2 {
                break;
            }
            let literal = self.arena.get(index).as_parity().literal(position);
            if self.core.value(literal).is_none() {
                self.arena
                    .get_mut(index)
                    .as_parity_mut()
                    .swap(position, unassigned);
                unassigned += 1;
            }
        }
        match unassigned {
            0 => {
                if !self.parity(index, 0) {
                    // conflict on the highest-level literal
                    let mut conflict_position = 0;
                    let mut level = self
                        .core
                        .lvl(self.arena.get(index).as_parity().literal(0));
                    for position in 1..size {
                        let candidate_level = self
                            .core
                            .lvl(self.arena.get(index).as_parity().literal(position));
                        if candidate_level > level {
                            conflict_position = position;
                            level = candidate_level;
                        }
                    }
                    let conflict_literal =
                        self.arena.get(index).as_parity().literal(conflict_position);
                    self.set_conflict_from(index, conflict_literal);
                }
                false
            }
            1 => {
                let head = self.arena.get(index).as_parity().literal(0);
                let forced = if self.parity(index, 1) { !head } else { head };
                self.assign_from(index, forced);
                false
            }
            _ => {
                let first = self.arena.get(index).as_parity().literal(0);
                let second = self.arena.get(index).as_parity().literal(1);
                self.watch_literal(first, index);
                self.watch_literal(second, index);
                self.watch_literal(!first, index);
                self.watch_literal(!second, index);
                true
            }
        }
    }

    pub(crate) fn clear_watch_xor(&mut self, index: ConstraintIndex) {
        let parity = self.arena.get(index).as_parity();
        if parity.size() < 2 {
            return;
        }
        let first = parity.literal(0);
        let second = parity.literal(1);
        self.unwatch_literal(first, index);
        self.unwatch_literal(second, index);
        self.unwatch_literal(!first, index);
        self.unwatch_literal(!second, index);
    }

    /// A watched literal of the parity constraint has been assigned (either
    /// polarity).
    fn add_assign_xor(&mut self, index: ConstraintIndex, literal: Literal) -> PropagationOutcome {
        cardinal_assert_moderate!(self.core.value(literal).is_some());
        cardinal_assert_moderate!(self
            .arena
            .get(index)
            .reifier()
            .map_or(true, |reifier| self.core.value(reifier) == Some(true)));
        let size = self.arena.get(index).as_parity().size();

        let variable = literal.get_propositional_variable();
        let mut watch_position = None;
        for position in 0..2 {
            let watched = self.arena.get(index).as_parity().literal(position);
            if watched.get_propositional_variable() == variable {
                watch_position = Some(position);
                break;
            }
        }
        let Some(watch_position) = watch_position else {
            // the literal is no longer watched
            return PropagationOutcome::NoInformation;
        };

        // find an unassigned literal to take the slot
        for position in 2..size {
            let candidate = self.arena.get(index).as_parity().literal(position);
            if self.core.value(candidate).is_none() {
                self.arena
                    .get_mut(index)
                    .as_parity_mut()
                    .swap(watch_position, position);
                // the triggered watch entry is dropped by the caller; the
                // entry for the opposite polarity is removed here so the
                // watched pair stays positions 0 and 1
                self.unwatch_literal(!literal, index);
                self.watch_literal(candidate, index);
                self.watch_literal(!candidate, index);
                return PropagationOutcome::NoInformation;
            }
        }

        if watch_position == 0 {
            self.arena.get_mut(index).as_parity_mut().swap(0, 1);
        }
        // the assigned literal resides at position 1
        let head = self.arena.get(index).as_parity().literal(0);
        if self.core.value(head).is_none() {
            let forced = if self.parity(index, 1) { !head } else { head };
            self.assign_from(index, forced);
        } else if !self.parity(index, 0) {
            let second = self.arena.get(index).as_parity().literal(1);
            self.set_conflict_from(index, !second);
        }
        if self.core.inconsistent() {
            PropagationOutcome::Conflict
        } else {
            PropagationOutcome::Propagated
        }
    }

}
