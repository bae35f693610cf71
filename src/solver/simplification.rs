use log::debug;

use crate::basic_types::ClauseReference;
use crate::basic_types::ConstraintIndex;
use crate::basic_types::Literal;
use crate::basic_types::StorageKey;
use crate::basic_types::WeightedLiteral;
use crate::cardinal_assert_moderate;
use crate::cardinal_assert_simple;
use crate::engine::Justification;
use crate::solver::CardinalSolver;

impl CardinalSolver {
    /// Root-level simplification, run to fixed point: per-constraint
    /// simplification against the root assignment, removal of unused
    /// definitions, pure literal elimination, and subsumption.
    pub fn simplify(&mut self) {
        cardinal_assert_simple!(self.core.at_base_lvl());
        let mut trail_size;
        loop {
            self.propagate_pending();
            if self.core.inconsistent() {
                return;
            }
            trail_size = self.core.assignments().num_trail_entries();
            self.simplify_change = false;
            self.clause_removed = false;
            self.constraint_removed = false;
            for position in 0..self.constraints.len() {
                let index = self.constraints[position];
                self.simplify_constraint(index);
            }
            for position in 0..self.learned.len() {
                let index = self.learned[position];
                self.simplify_constraint(index);
            }
            if self.core.inconsistent() {
                return;
            }
            self.init_use_lists();
            self.remove_unused_defs();
            let _ = self.set_non_external();
            let _ = self.elim_pure();
            for position in 0..self.constraints.len() {
                let index = self.constraints[position];
                self.subsumption(index);
            }
            for position in 0..self.learned.len() {
                let index = self.learned[position];
                self.subsumption(index);
            }
            self.cleanup_constraints();
            if !self.simplify_change
                && !self.clause_removed
                && trail_size >= self.core.assignments().num_trail_entries()
            {
                break;
            }
        }

        debug!(
            "simplify: constraints {} lemmas {} subsumes {} gc {}",
            self.constraints.len(),
            self.learned.len(),
            self.statistics.num_bin_subsumes
                + self.statistics.num_clause_subsumes
                + self.statistics.num_pb_subsumes,
            self.statistics.num_gc
        );
    }

    fn simplify_constraint(&mut self, index: ConstraintIndex) {
        let Some(constraint) = self.arena.try_get(index) else {
            return;
        };
        if constraint.is_removed() || constraint.is_parity() {
            // parity constraints are left untouched by root simplification
            return;
        }
        self.simplify_pb_base(index);
    }

    /// Simplify a cardinality or pseudo-Boolean constraint against the root
    /// assignment: satisfied constraints disappear, refuted ones flag a
    /// conflict (or force the reifier), tight ones become unconstrained
    /// assignments, and otherwise the assigned literals are stripped and the
    /// bound reduced by the true weight.
    fn simplify_pb_base(&mut self, index: ConstraintIndex) {
        cardinal_assert_simple!(self.core.at_base_lvl());
        let reifier = self.arena.get(index).reifier();
        if reifier.is_some_and(|reifier| self.core.value(reifier) == Some(false)) {
            // the sign is flipped; the watch dispatch re-initialises the
            // negated form when the reifier assignment is processed
            debug!("sign is flipped: {}", self.arena.get(index));
            return;
        }
        let nullify = reifier.is_some_and(|reifier| self.core.value(reifier) == Some(true));
        if nullify {
            cardinal_assert_simple!(
                self.core.lvl(reifier.expect("the reifier is assigned")) == 0
            );
            self.nullify_tracking_literal(index);
        }
        let reifier = self.arena.get(index).reifier();
        cardinal_assert_moderate!(reifier
            .map_or(true, |reifier| self.core.value(reifier).is_none()));

        let (size, bound, is_learned) = {
            let constraint = self.arena.get(index);
            (constraint.size(), constraint.k(), constraint.is_learned())
        };
        let mut true_val: u64 = 0;
        let mut slack: u64 = 0;
        let mut num_false: usize = 0;
        for position in 0..size {
            let constraint = self.arena.get(index);
            let literal = constraint.get_literal(position);
            let coeff = u64::from(constraint.get_coeff(position));
            match self.core.value(literal) {
                Some(true) => true_val += coeff,
                Some(false) => num_false += 1,
                None => slack += coeff,
            }
        }

        if bound == 1 && reifier.is_none() {
            let literals = self.arena.get(index).literals();
            let _ = self.core.mk_clause(literals, is_learned);
            self.remove_constraint(index);
        } else if true_val == 0 && num_false == 0 {
            if nullify {
                let _ = self.init_watch(index, true);
            }
        } else if true_val >= u64::from(bound) {
            if let Some(reifier) = reifier {
                self.core.assign(reifier, Justification::Decision);
            }
            self.remove_constraint(index);
        } else if slack + true_val < u64::from(bound) {
            if let Some(reifier) = reifier {
                self.core.assign(!reifier, Justification::Decision);
            } else {
                debug!("unsat during simplification");
                self.core.set_conflict(Justification::Decision, None);
            }
            self.remove_constraint(index);
        } else if slack + true_val == u64::from(bound) {
            let literals = self.arena.get(index).literals();
            self.assert_unconstrained(reifier, &literals);
            self.remove_constraint(index);
        } else {
            self.clear_watch(index);
            // strip the assigned literals and absorb the true weight into
            // the bound
            let mut new_size = size;
            let mut position = 0;
            while position < new_size {
                let literal = self.arena.get(index).get_literal(position);
                if self.core.value(literal).is_some() {
                    new_size -= 1;
                    self.arena.get_mut(index).swap(position, new_size);
                } else {
                    position += 1;
                }
            }
            let new_bound = bound - true_val as u32;
            {
                let constraint = self.arena.get_mut(index);
                constraint.truncate(new_size);
                constraint.set_k(new_bound);
            }
            if self.arena.get(index).is_pseudo_boolean() {
                // weights shrink, the sum cannot overflow anymore
                let _ = self
                    .arena
                    .get_mut(index)
                    .as_pseudo_boolean_mut()
                    .update_max_sum();
            }

            if new_bound == 1 && reifier.is_none() {
                let literals = self.arena.get(index).literals();
                let _ = self.core.mk_clause(literals, is_learned);
                self.remove_constraint(index);
                return;
            } else if reifier.is_none() {
                let _ = self.init_watch(index, true);
            } else {
                cardinal_assert_simple!(self
                    .core
                    .value(reifier.expect("reified"))
                    .is_none());
            }
            cardinal_assert_simple!(self.arena.get(index).well_formed());
            self.simplify_change = true;
        }
    }

    /// `reifier <-> conjunction of the unassigned literals` (or plain
    /// assignments when unreified): used when the remaining slack is tight.
    fn assert_unconstrained(&mut self, reifier: Option<Literal>, literals: &[Literal]) {
        match reifier {
            None => {
                for &literal in literals {
                    if self.core.value(literal).is_none() {
                        self.core.assign(literal, Justification::Decision);
                    }
                }
            }
            Some(reifier) => {
                cardinal_assert_simple!(self.core.value(reifier).is_none());
                let mut clause = vec![reifier];
                for &literal in literals {
                    if self.core.value(literal).is_none() {
                        let _ = self.core.mk_clause(vec![!reifier, literal], false);
                        clause.push(!literal);
                    }
                }
                let _ = self.core.mk_clause(clause, false);
            }
        }
    }

    // ----------------------
    // occurrence bookkeeping

    pub(crate) fn ensure_literal_scratch(&mut self) {
        let num_literals = 2 * self.core.num_vars() as usize;
        while self.weights.len() < num_literals {
            let _ = self.weights.push(0);
        }
        while self.visited.len() < num_literals {
            let _ = self.visited.push(false);
        }
        while self.roots.len() < num_literals {
            let identity = Literal::create_from_index(self.roots.len());
            let _ = self.roots.push(identity);
        }
        while self.root_vars.len() < self.core.num_vars() as usize {
            let _ = self.root_vars.push(false);
        }
        while self.cnstr_use_list.len() < num_literals {
            let _ = self.cnstr_use_list.push(vec![]);
        }
        while self.clause_use_list.len() < num_literals {
            let _ = self.clause_use_list.push(vec![]);
        }
    }

    pub(crate) fn mark_visited(&mut self, literal: Literal) {
        self.visited[literal] = true;
    }

    pub(crate) fn unmark_visited(&mut self, literal: Literal) {
        self.visited[literal] = false;
    }

    pub(crate) fn is_visited(&self, literal: Literal) -> bool {
        self.visited[literal]
    }

    /// Per-literal occurrence lists over the problem constraints and the
    /// clause store. Reified constraints are listed under both polarities of
    /// every mentioned literal, since their negated form mentions the
    /// negations.
    pub(crate) fn init_use_lists(&mut self) {
        self.ensure_literal_scratch();
        for list in self.cnstr_use_list.iter_mut() {
            list.clear();
        }
        for list in self.clause_use_list.iter_mut() {
            list.clear();
        }

        let references: Vec<ClauseReference> =
            self.core.clause_database().references().collect();
        for reference in references {
            let clause = self.core.clause_database().get_clause(reference);
            if clause.is_removed() {
                continue;
            }
            let literals = clause.get_literal_slice().to_vec();
            for literal in literals {
                self.clause_use_list[literal].push(reference);
            }
        }

        for position in 0..self.constraints.len() {
            let index = self.constraints[position];
            let Some(constraint) = self.arena.try_get(index) else {
                continue;
            };
            if constraint.is_removed() {
                continue;
            }
            let reifier = constraint.reifier();
            let is_parity = constraint.is_parity();
            let literals = constraint.literals();
            if let Some(reifier) = reifier {
                self.cnstr_use_list[reifier].push(index);
                self.cnstr_use_list[!reifier].push(index);
            }
            for literal in literals {
                self.cnstr_use_list[literal].push(index);
                if reifier.is_some() || is_parity {
                    self.cnstr_use_list[!literal].push(index);
                }
            }
        }
    }

    pub(crate) fn use_count(&self, literal: Literal) -> usize {
        self.cnstr_use_list[literal].len() + self.clause_use_list[literal].len()
    }

    /// Drop constraints whose reifier occurs nowhere outside its own
    /// definition.
    pub(crate) fn remove_unused_defs(&mut self) {
        for position in 0..self.constraints.len() {
            let index = self.constraints[position];
            let Some(constraint) = self.arena.try_get(index) else {
                continue;
            };
            if constraint.is_removed() || constraint.is_parity() {
                continue;
            }
            let Some(reifier) = constraint.reifier() else {
                continue;
            };
            if self.use_count(reifier) == 1
                && self.use_count(!reifier) == 1
                && self.core.watch_list().num_non_learned_binary(reifier) == 0
                && self.core.watch_list().num_non_learned_binary(!reifier) == 0
            {
                self.remove_constraint(index);
            }
        }
    }

    /// Variables no longer mentioned by any extension constraint become
    /// non-external; learned constraints must in turn only mention external,
    /// non-eliminated variables.
    pub(crate) fn set_non_external(&mut self) -> u32 {
        let mut converted = 0;
        for variable in self.core.assignments().get_propositional_variables() {
            let literal = Literal::new(variable, true);
            if self.core.is_external(variable)
                && self.cnstr_use_list[literal].is_empty()
                && self.cnstr_use_list[!literal].is_empty()
                && !self.core.is_assumption(variable)
            {
                self.core.set_non_external(variable);
                converted += 1;
            }
        }
        for position in 0..self.learned.len() {
            let index = self.learned[position];
            let Some(constraint) = self.arena.try_get(index) else {
                continue;
            };
            if constraint.is_removed() {
                continue;
            }
            cardinal_assert_simple!(constraint.reifier().is_none());
            let literals = constraint.literals();
            for literal in literals {
                let variable = literal.get_propositional_variable();
                if self.core.was_eliminated(variable) {
                    self.remove_constraint(index);
                    break;
                }
                if !self.core.is_external(variable) {
                    self.core.set_external(variable);
                }
            }
        }
        debug!("non-external variables converted: {converted}");
        converted
    }

    fn elim_pure_literal(&mut self, literal: Literal) -> bool {
        if self.core.value(literal).is_some() {
            return false;
        }
        if !self.cnstr_use_list[literal].is_empty()
            && self.use_count(!literal) == 0
            && self.core.watch_list().num_non_learned_binary(!literal) == 0
        {
            self.core.assign(literal, Justification::Decision);
            return true;
        }
        false
    }

    /// A literal whose negation occurs nowhere can be forced.
    pub(crate) fn elim_pure(&mut self) -> u32 {
        let mut pure_literals = 0;
        for variable in self.core.assignments().get_propositional_variables() {
            if self.core.assignments().is_variable_assigned(variable) {
                continue;
            }
            let literal = Literal::new(variable, true);
            if self.cnstr_use_list[literal].is_empty()
                && self.cnstr_use_list[!literal].is_empty()
            {
                continue;
            }
            if self.elim_pure_literal(literal) || self.elim_pure_literal(!literal) {
                pure_literals += 1;
            }
        }
        debug!("pure literals converted: {pure_literals}");
        pure_literals
    }

    // ----------------------
    // subsumption

    pub(crate) fn subsumption(&mut self, index: ConstraintIndex) {
        let Some(constraint) = self.arena.try_get(index) else {
            return;
        };
        if constraint.is_removed() {
            return;
        }
        if constraint.is_cardinality() && constraint.as_cardinality().k() > 1 {
            self.subsumption_card(index);
        } else if constraint.is_pseudo_boolean() && constraint.as_pseudo_boolean().k() > 1 {
            self.subsumption_pb(index);
        }
    }

    fn subsumption_card(&mut self, index: ConstraintIndex) {
        if self.arena.get(index).reifier().is_some() {
            return;
        }
        let literals = self.arena.get(index).as_cardinality().literals().to_vec();
        let bound = self.arena.get(index).as_cardinality().k() as usize;
        for &literal in &literals {
            self.mark_visited(literal);
        }
        let mut removed_clauses: Vec<ClauseReference> = vec![];
        let watched = std::cmp::min(literals.len(), bound + 1);
        for &literal in literals.iter().take(watched) {
            self.card_subsumption(index, literal);
            self.clause_subsumption(index, literal, &mut removed_clauses);
            self.binary_subsumption(index, literal);
        }
        for &literal in &literals {
            self.unmark_visited(literal);
        }
        self.clause_removed |= !removed_clauses.is_empty();
        for reference in removed_clauses {
            self.core
                .clause_database_mut()
                .get_mutable_clause(reference)
                .mark_removed();
        }
    }

    /// `A >= k` subsumes `A u B >= k'` when `k' <= k`, and more generally
    /// `A1 u A2 >= k` subsumes `A1 u B >= k'` when `k' + |A2| <= k`. A
    /// single complementary literal would allow self-subsumption; that case
    /// is recognised and counted but the strengthening is not performed.
    fn card_subsumption(&mut self, index: ConstraintIndex, literal: Literal) {
        let candidates = self.cnstr_use_list[literal].clone();
        for candidate in candidates {
            if candidate == index {
                continue;
            }
            let Some(other) = self.arena.try_get(candidate) else {
                continue;
            };
            if other.is_removed() || !other.is_cardinality() || other.reifier().is_some() {
                continue;
            }
            let (subsumes, complementary) = {
                let subsumer = self.arena.get(index).as_cardinality();
                let subsumed = other.as_cardinality();
                let mut common = 0usize;
                let mut complementary = 0usize;
                let mut exclusive = 0usize;
                for &subsumed_literal in subsumed.literals() {
                    if self.is_visited(subsumed_literal) {
                        common += 1;
                    } else if self.is_visited(!subsumed_literal) {
                        complementary += 1;
                    } else {
                        exclusive += 1;
                    }
                }
                let _ = exclusive;
                let subsumer_exclusive = subsumer.size() - common - complementary;
                (
                    subsumer_exclusive + subsumed.k() as usize + complementary
                        <= subsumer.k() as usize,
                    complementary,
                )
            };
            if subsumes {
                if complementary == 0 {
                    self.statistics.num_pb_subsumes += 1;
                    self.arena.get_mut(index).set_learned(false);
                    self.remove_constraint(candidate);
                } else {
                    // self-subsumption with a complementary literal; the
                    // strengthening rewrite is a planned optimisation
                    self.statistics.num_self_subsumptions_skipped += 1;
                    debug!("self-subsuming cardinality not performed");
                }
            }
        }
    }

    fn clause_subsumption(
        &mut self,
        index: ConstraintIndex,
        literal: Literal,
        removed_clauses: &mut Vec<ClauseReference>,
    ) {
        let candidates = self.clause_use_list[literal].clone();
        for reference in candidates {
            let clause = self.core.clause_database().get_clause(reference);
            if clause.is_removed() {
                continue;
            }
            let mut common = 0usize;
            let mut complementary = 0usize;
            for &clause_literal in clause.get_literal_slice() {
                if self.is_visited(clause_literal) {
                    common += 1;
                } else if self.is_visited(!clause_literal) {
                    complementary += 1;
                }
            }
            if complementary > 0 {
                // self-subsumption over clauses is likewise not performed
                continue;
            }
            let subsumer = self.arena.get(index).as_cardinality();
            let subsumer_exclusive = subsumer.size() - common;
            if subsumer_exclusive + 1 <= subsumer.k() as usize {
                removed_clauses.push(reference);
                self.statistics.num_clause_subsumes += 1;
                self.arena.get_mut(index).set_learned(false);
            }
        }
    }

    /// A cardinality constraint with `size == k + 1` is a clique of binary
    /// clauses; any watched binary clause over two of its literals is
    /// subsumed.
    fn binary_subsumption(&mut self, index: ConstraintIndex, literal: Literal) {
        {
            let cardinality = self.arena.get(index).as_cardinality();
            if cardinality.k() as usize + 1 != cardinality.size() {
                return;
            }
        }
        cardinal_assert_moderate!(self.is_visited(literal));
        let subsumed: Vec<(Literal, bool)> = self
            .core
            .watch_list()
            .get(!literal)
            .iter()
            .filter(|entry| entry.is_binary_clause())
            .map(|entry| {
                (
                    entry.get_binary_clause_literal(),
                    entry.is_learned_binary_clause(),
                )
            })
            .filter(|(other, _)| self.is_visited(*other))
            .collect();
        for (other, is_learned) in subsumed {
            self.statistics.num_bin_subsumes += 1;
            if !is_learned {
                self.arena.get_mut(index).set_learned(false);
            }
            self.core
                .watch_list_mut()
                .remove_binary_clause_half(literal, other);
            self.core
                .watch_list_mut()
                .remove_binary_clause_half(other, literal);
        }
    }

    fn subsumption_pb(&mut self, index: ConstraintIndex) {
        if self.arena.get(index).reifier().is_some() {
            return;
        }
        self.ensure_literal_scratch();
        let terms = self.arena.get(index).as_pseudo_boolean().terms().to_vec();
        for term in &terms {
            cardinal_assert_moderate!(self.weights[term.literal] == 0);
            self.weights[term.literal] = u64::from(term.weight);
            self.mark_visited(term.literal);
        }
        let num_watch = self.arena.get(index).as_pseudo_boolean().num_watch();
        for term in terms.iter().take(num_watch) {
            self.pb_subsumption_on(index, term.literal);
        }
        for term in &terms {
            self.weights[term.literal] = 0;
            self.unmark_visited(term.literal);
        }
    }

    /// `sum a_i * l_i >= k` subsumes `sum b_j * m_j >= k'` iff every term of
    /// the subsumer matches a term of the subsumed with `a_i <= b_j` and
    /// `k >= k'`.
    fn pb_subsumption_on(&mut self, index: ConstraintIndex, literal: Literal) {
        let candidates = self.cnstr_use_list[literal].clone();
        for candidate in candidates {
            if candidate == index {
                continue;
            }
            let Some(other) = self.arena.try_get(candidate) else {
                continue;
            };
            if other.is_removed()
                || other.is_parity()
                || other.reifier().is_some()
            {
                continue;
            }
            let subsumes = {
                let subsumer = self.arena.get(index).as_pseudo_boolean();
                if subsumer.k() < other.k() || subsumer.size() > other.size() {
                    false
                } else {
                    let mut matched = 0usize;
                    for position in 0..other.size() {
                        let subsumed_literal = other.get_literal(position);
                        if self.is_visited(subsumed_literal)
                            && self.weights[subsumed_literal]
                                <= u64::from(other.get_coeff(position))
                        {
                            matched += 1;
                        }
                    }
                    matched == subsumer.size()
                }
            };
            if subsumes {
                self.statistics.num_pb_subsumes += 1;
                self.arena.get_mut(index).set_learned(false);
                self.remove_constraint(candidate);
            }
        }
    }

    /// Sweep the removed constraints out of both collections, releasing
    /// their arena slots; constraints promoted to problem status by
    /// subsumption migrate from the learned collection.
    pub(crate) fn cleanup_constraints(&mut self) {
        if !self.constraint_removed {
            return;
        }
        let mut constraints = std::mem::take(&mut self.constraints);
        constraints.retain(|&index| {
            if self.arena.get(index).is_removed() {
                self.arena.release(index);
                false
            } else {
                true
            }
        });
        let mut learned = std::mem::take(&mut self.learned);
        learned.retain(|&index| {
            if self.arena.get(index).is_removed() {
                self.arena.release(index);
                false
            } else if !self.arena.get(index).is_learned() {
                constraints.push(index);
                false
            } else {
                true
            }
        });
        self.constraints = constraints;
        self.learned = learned;
        let arena = &self.arena;
        self.constraint_to_reinit
            .retain(|&index| arena.try_get(index).is_some());
        self.constraint_removed = false;
    }

    // ----------------------
    // equivalent-literal substitution

    /// Record that `literal` is equivalent to its representative `root`.
    pub fn set_root(&mut self, literal: Literal, root: Literal) -> bool {
        if self
            .core
            .is_assumption(literal.get_propositional_variable())
        {
            return false;
        }
        self.ensure_literal_scratch();
        self.roots[literal] = root;
        self.roots[!literal] = !root;
        self.root_vars[literal.get_propositional_variable()] = true;
        true
    }

    /// Substitute every recorded equivalence through the constraint store.
    /// Substitution can introduce duplicate literals (recompiled away) or
    /// pull a reifier into its own body (decomposed by [Self::split_root]).
    pub fn flush_roots(&mut self) {
        if !self.root_vars.iter().any(|&is_root| is_root) {
            return;
        }
        self.ensure_literal_scratch();
        self.constraint_removed = false;
        for position in 0..self.constraints.len() {
            let index = self.constraints[position];
            self.flush_roots_constraint(index);
        }
        for position in 0..self.learned.len() {
            let index = self.learned[position];
            self.flush_roots_constraint(index);
        }
        self.cleanup_constraints();
    }

    fn flush_roots_constraint(&mut self, index: ConstraintIndex) {
        let Some(constraint) = self.arena.try_get(index) else {
            return;
        };
        if constraint.is_removed() {
            return;
        }
        let mut involved = constraint
            .reifier()
            .is_some_and(|reifier| self.root_vars[reifier.get_propositional_variable()]);
        for position in 0..constraint.size() {
            if involved {
                break;
            }
            involved = self.root_vars
                [constraint.get_literal(position).get_propositional_variable()];
        }
        if !involved {
            return;
        }

        self.clear_watch(index);

        // this could create duplicate literals
        for position in 0..self.arena.get(index).size() {
            let literal = self.arena.get(index).get_literal(position);
            let root = self.roots[literal];
            self.arena.get_mut(index).set_literal(position, root);
        }

        if let Some(reifier) = self.arena.get(index).reifier() {
            let root = self.roots[reifier];
            if root != reifier {
                self.nullify_tracking_literal(index);
                self.arena.get_mut(index).set_reifier(root);
                self.core.watch_list_mut().watch_constraint(root, index);
                self.core.watch_list_mut().watch_constraint(!root, index);
            }
        }

        let reifier = self.arena.get(index).reifier();
        let size = self.arena.get(index).size();
        let mut found_dup = false;
        for position in 0..size {
            let literal = self.arena.get(index).get_literal(position);
            if self.is_visited(literal) {
                found_dup = true;
                break;
            }
            self.mark_visited(literal);
            self.mark_visited(!literal);
        }
        let mut found_root = false;
        for position in 0..size {
            let literal = self.arena.get(index).get_literal(position);
            self.unmark_visited(literal);
            self.unmark_visited(!literal);
            found_root |= reifier.is_some_and(|reifier| {
                literal.get_propositional_variable() == reifier.get_propositional_variable()
            });
        }

        if found_root {
            if self.arena.get(index).is_parity() {
                self.split_parity_root(index);
            } else {
                self.split_root(index);
                self.arena.get_mut(index).negate();
                self.split_root(index);
            }
            self.remove_constraint(index);
        } else if found_dup {
            self.recompile(index);
        } else {
            let reinitialise = match self.arena.get(index).reifier() {
                None => true,
                Some(reifier) => self.core.value(reifier) == Some(true),
            };
            if reinitialise {
                let _ = self.init_watch(index, true);
            }
            cardinal_assert_simple!(self.arena.get(index).well_formed());
        }
    }

    /// A reified constraint whose reifier appears in its own body is split
    /// into an unreified pseudo-Boolean constraint:
    /// `x <-> (a*x + B*y >= k)` yields `(k - a)*~x + B*y >= k - a`, and the
    /// negated form yields the second half.
    pub(crate) fn split_root(&mut self, index: ConstraintIndex) {
        let (root, size) = {
            let constraint = self.arena.get(index);
            cardinal_assert_simple!(!constraint.is_learned());
            (
                constraint.reifier().expect("split_root needs a reifier"),
                constraint.size(),
            )
        };
        self.ensure_literal_scratch();
        let mut bound = u64::from(self.arena.get(index).k());
        self.weights[!root] = bound;
        let mut literals: Vec<Literal> = Vec::with_capacity(size + 1);
        for position in 0..size {
            let constraint = self.arena.get(index);
            let literal = constraint.get_literal(position);
            let coeff = u64::from(constraint.get_coeff(position));
            self.weights[literal] += coeff;
            literals.push(literal);
        }
        literals.push(!root);

        let mut trivially_true = false;
        for &literal in &literals {
            let weight = self.weights[literal];
            let complement = self.weights[!literal];
            if weight >= complement {
                if complement >= bound {
                    trivially_true = true;
                    break;
                }
                bound -= complement;
                self.weights[!literal] = 0;
                self.weights[literal] = weight - complement;
            }
        }

        if trivially_true {
            for &literal in &literals {
                self.weights[literal] = 0;
                self.weights[!literal] = 0;
            }
            return;
        }
        cardinal_assert_simple!(bound > 0);

        let mut wlits: Vec<WeightedLiteral> = vec![];
        for &literal in &literals {
            let weight = self.weights[literal];
            if weight != 0 {
                wlits.push(WeightedLiteral::new(weight as u32, literal));
            }
            self.weights[literal] = 0;
            self.weights[!literal] = 0;
        }

        let _ = self.add_pb_ge(None, wlits, bound as u32, false);
    }

    /// The parity analogue of [Self::split_root]: from `x <-> (x xor R)`
    /// follows that `R` has even parity, and from `x <-> (~x xor R)` that
    /// `R` has odd parity; either way the reification dissolves into an
    /// unreified parity constraint over `R`.
    fn split_parity_root(&mut self, index: ConstraintIndex) {
        let (root, literals) = {
            let constraint = self.arena.get(index);
            (
                constraint.reifier().expect("split needs a reifier"),
                constraint.as_parity().literals().to_vec(),
            )
        };
        // substitution may have introduced the root variable several times:
        // x contributes x per positive occurrence, and x xor 1 per negative
        // occurrence
        let mut rest: Vec<Literal> = Vec::with_capacity(literals.len().saturating_sub(1));
        let mut occurrences = 0usize;
        let mut negated_occurrences = 0usize;
        for literal in literals {
            if literal.get_propositional_variable() == root.get_propositional_variable() {
                occurrences += 1;
                if literal != root {
                    negated_occurrences += 1;
                }
            } else {
                rest.push(literal);
            }
        }
        if occurrences == 0 {
            return;
        }
        // the remainder may itself contain duplicates
        let (mut rest, rest_flips) = self.cancel_parity_pairs(&rest);
        let constant_is_odd = (negated_occurrences % 2 == 1) ^ rest_flips;
        if occurrences % 2 == 0 {
            // the root cancels within the body: the reification survives
            // over the rest, with the constant folded in
            if rest.is_empty() {
                let forced = if constant_is_odd { root } else { !root };
                self.core.assign(forced, Justification::Decision);
                return;
            }
            if constant_is_odd {
                let flipped = !rest[0];
                rest[0] = flipped;
            }
            let _ = self.add_xor(Some(root), rest, false);
            return;
        }
        // x <-> (x xor c xor R) forces R = c
        if rest.is_empty() {
            if constant_is_odd {
                // x <-> (~x): contradiction
                self.core.set_conflict(Justification::Decision, None);
            }
            return;
        }
        if !constant_is_odd {
            // even parity: assert the negation of the exclusive-or
            let flipped = !rest[0];
            rest[0] = flipped;
        }
        let _ = self.add_xor(None, rest, false);
    }

    // ----------------------
    // recompilation after substitution

    /// Merge duplicate and complementary occurrences of a variable,
    /// reducing the bound accordingly, and re-express the constraint in its
    /// simplest form.
    pub(crate) fn recompile(&mut self, index: ConstraintIndex) {
        if self.arena.get(index).is_parity() {
            self.recompile_parity(index);
        } else {
            self.recompile_pb_base(index);
        }
    }

    fn recompile_pb_base(&mut self, index: ConstraintIndex) {
        self.ensure_literal_scratch();
        let (size, reifier, is_learned) = {
            let constraint = self.arena.get(index);
            (
                constraint.size(),
                constraint.reifier(),
                constraint.is_learned(),
            )
        };
        let mut bound = u64::from(self.arena.get(index).k());
        let mut order: Vec<Literal> = Vec::with_capacity(size);
        for position in 0..size {
            let constraint = self.arena.get(index);
            let literal = constraint.get_literal(position);
            let coeff = u64::from(constraint.get_coeff(position));
            if self.weights[literal] == 0 && self.weights[!literal] == 0 {
                order.push(literal);
            }
            self.weights[literal] += coeff;
        }

        let mut merged: Vec<WeightedLiteral> = vec![];
        let mut all_units = true;
        for literal in order {
            let weight = self.weights[literal];
            let complement = self.weights[!literal];
            self.weights[literal] = 0;
            self.weights[!literal] = 0;
            if bound == 0 {
                continue;
            }
            let (kept_literal, kept_weight, cancelled) = if weight >= complement {
                (literal, weight - complement, complement)
            } else {
                (!literal, complement - weight, weight)
            };
            if bound <= cancelled {
                bound = 0;
                continue;
            }
            bound -= cancelled;
            if kept_weight > 0 {
                all_units &= kept_weight == 1;
                merged.push(WeightedLiteral::new(kept_weight as u32, kept_literal));
            }
        }

        if bound == 0 {
            if let Some(reifier) = reifier {
                self.core.assign(reifier, Justification::Decision);
            }
            self.remove_constraint(index);
            return;
        }
        if bound == 1 && reifier.is_none() {
            let literals = merged.into_iter().map(|wlit| wlit.literal).collect();
            let _ = self.core.mk_clause(literals, is_learned);
            self.remove_constraint(index);
            return;
        }
        if merged
            .iter()
            .map(|wlit| u64::from(wlit.weight))
            .sum::<u64>()
            < bound
        {
            // the merged body can no longer reach the bound
            if let Some(reifier) = reifier {
                self.core.assign(!reifier, Justification::Decision);
            } else {
                self.core.set_conflict(Justification::Decision, None);
            }
            self.remove_constraint(index);
            return;
        }

        if all_units {
            let literals: Vec<Literal> =
                merged.into_iter().map(|wlit| wlit.literal).collect();
            self.remove_constraint(index);
            let _ = self.add_at_least(reifier, literals, bound as u32, is_learned);
            return;
        }
        // every weight equal to the maximum: a cardinality constraint with
        // a scaled threshold
        let first_weight = merged[0].weight;
        if merged.iter().all(|wlit| wlit.weight == first_weight) {
            let literals: Vec<Literal> =
                merged.into_iter().map(|wlit| wlit.literal).collect();
            let threshold = (bound + u64::from(first_weight) - 1) / u64::from(first_weight);
            self.remove_constraint(index);
            let _ = self.add_at_least(reifier, literals, threshold as u32, is_learned);
            return;
        }

        // rebuild in place
        if self.arena.get(index).is_cardinality() {
            // weights no longer uniform: the body changes representation
            self.remove_constraint(index);
            let _ = self.add_pb_ge(reifier, merged, bound as u32, is_learned);
            return;
        }
        {
            let pseudo_boolean = self.arena.get_mut(index).as_pseudo_boolean_mut();
            pseudo_boolean.replace(merged, bound as u32);
            let _ = pseudo_boolean.update_max_sum();
        }
        cardinal_assert_simple!(self.arena.get(index).well_formed());

        let reinitialise = match self.arena.get(index).reifier() {
            None => true,
            Some(reifier) => self.core.value(reifier) == Some(true),
        };
        if reinitialise {
            let _ = self.init_watch(index, true);
        }
    }

    /// Cancel pairwise variable occurrences in an exclusive-or:
    /// `l xor l` vanishes and `l xor ~l` is constant true. Returns the
    /// surviving literals and whether an odd number of constant-true pairs
    /// was folded out.
    fn cancel_parity_pairs(&mut self, literals: &[Literal]) -> (Vec<Literal>, bool) {
        self.ensure_literal_scratch();
        let mut kept: Vec<Literal> = vec![];
        let mut flips = 0usize;
        for literal in literals {
            self.weights[*literal] += 1;
        }
        for literal in literals {
            let positive = self.weights[*literal];
            let negative = self.weights[!*literal];
            if positive == 0 && negative == 0 {
                continue;
            }
            let pairs = std::cmp::min(positive, negative);
            flips += pairs as usize;
            let surviving = positive.abs_diff(negative);
            let survivor = if positive > negative {
                *literal
            } else {
                !*literal
            };
            if surviving % 2 == 1 {
                kept.push(survivor);
            }
            self.weights[*literal] = 0;
            self.weights[!*literal] = 0;
        }
        (kept, flips % 2 == 1)
    }

    /// Duplicate variables in a parity constraint cancel pairwise.
    fn recompile_parity(&mut self, index: ConstraintIndex) {
        let literals = self.arena.get(index).as_parity().literals().to_vec();
        let reifier = self.arena.get(index).reifier();
        let (kept, parity_flipped) = self.cancel_parity_pairs(&literals);

        self.remove_constraint(index);
        match (kept.is_empty(), parity_flipped) {
            (true, false) => {
                // the body is identically false
                if let Some(reifier) = reifier {
                    self.core.assign(!reifier, Justification::Decision);
                } else {
                    self.core.set_conflict(Justification::Decision, None);
                }
            }
            (true, true) => {
                // the body is identically true
                if let Some(reifier) = reifier {
                    self.core.assign(reifier, Justification::Decision);
                }
            }
            (false, flipped) => {
                let mut kept = kept;
                if flipped {
                    let negated = !kept[0];
                    kept[0] = negated;
                }
                let _ = self.add_xor(reifier, kept, false);
            }
        }
    }
}
