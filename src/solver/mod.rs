mod conflict_resolution;
mod explanation;
mod gc;
mod propagation;
mod simplification;
#[cfg(test)]
mod tests;
mod validation;

pub use conflict_resolution::ConflictResolution;
pub use propagation::PropagationOutcome;
pub use validation::Inequality;

use log::debug;

use crate::basic_types::ConstraintIndex;
use crate::basic_types::ConstraintOperationError;
use crate::basic_types::HashSet;
use crate::basic_types::KeyedVec;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::basic_types::WeightedLiteral;
use crate::cardinal_assert_simple;
use crate::constraints::Cardinality;
use crate::constraints::Constraint;
use crate::constraints::ConstraintArena;
use crate::constraints::ConstraintBody;
use crate::constraints::Parity;
use crate::constraints::PseudoBoolean;
use crate::engine::SolverCore;

/// Counters reported by [CardinalSolver::statistics] and summarised at the
/// end of every simplification round.
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    pub num_propagations: u64,
    pub num_conflicts: u64,
    pub num_resolutions: u64,
    pub num_cuts: u64,
    pub num_gc: u64,
    pub num_bin_subsumes: u64,
    pub num_clause_subsumes: u64,
    pub num_pb_subsumes: u64,
    pub num_self_subsumptions_skipped: u64,
}

/// Scratchpad of the cutting-planes resolver: the running inequality
/// `sum coeffs[v] * v >= bound` over the active variables, plus the marks
/// bookkeeping. Reset at the start of every resolution.
#[derive(Debug, Default)]
pub(crate) struct ResolverState {
    pub(crate) coeffs: KeyedVec<PropositionalVariable, i64>,
    pub(crate) active_vars: Vec<PropositionalVariable>,
    pub(crate) active_var_set: HashSet<PropositionalVariable>,
    pub(crate) bound: u32,
    pub(crate) overflow: bool,
    pub(crate) num_marks: usize,
    pub(crate) conflict_level: usize,
    pub(crate) lemma: Vec<Literal>,
    pub(crate) asserting: Option<Literal>,
    pub(crate) wlits: Vec<WeightedLiteral>,
}

/// The extension solver: cardinality, pseudo-Boolean, and parity constraints
/// with watched-literal propagation, cutting-planes conflict resolution, a
/// root-level simplification pipeline, and learned-constraint garbage
/// collection. It owns the trail-facing [SolverCore] it collaborates with.
#[derive(Debug, Default)]
pub struct CardinalSolver {
    pub(crate) core: SolverCore,
    pub(crate) arena: ConstraintArena,
    /// Problem constraints.
    pub(crate) constraints: Vec<ConstraintIndex>,
    /// Derived (learned) constraints.
    pub(crate) learned: Vec<ConstraintIndex>,
    /// Learned constraints awaiting watch re-establishment after backjump.
    pub(crate) constraint_to_reinit: Vec<ConstraintIndex>,
    constraint_to_reinit_lim: Vec<usize>,
    constraint_to_reinit_last_size: usize,
    next_constraint_id: u32,
    pub(crate) num_propagations_since_pop: u64,
    next_position_on_trail_to_propagate: usize,
    pub(crate) resolver: ResolverState,
    pub(crate) statistics: Statistics,
    // simplification scratch
    pub(crate) weights: KeyedVec<Literal, u64>,
    pub(crate) visited: KeyedVec<Literal, bool>,
    pub(crate) roots: KeyedVec<Literal, Literal>,
    pub(crate) root_vars: KeyedVec<PropositionalVariable, bool>,
    pub(crate) cnstr_use_list: KeyedVec<Literal, Vec<ConstraintIndex>>,
    pub(crate) clause_use_list: KeyedVec<Literal, Vec<crate::basic_types::ClauseReference>>,
    pub(crate) constraint_removed: bool,
    pub(crate) clause_removed: bool,
    pub(crate) simplify_change: bool,
    // propagation scratch
    pub(crate) pb_undef: Vec<(u32, Literal)>,
    pub(crate) parity_marks: KeyedVec<PropositionalVariable, u32>,
}

impl CardinalSolver {
    pub fn new() -> CardinalSolver {
        CardinalSolver::default()
    }

    pub fn new_variable(&mut self) -> PropositionalVariable {
        self.core.new_variable()
    }

    pub fn new_literal(&mut self) -> Literal {
        Literal::new(self.new_variable(), true)
    }

    pub fn core(&self) -> &SolverCore {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_learned(&self) -> usize {
        self.learned.len()
    }

    pub fn get_constraint(&self, index: ConstraintIndex) -> &Constraint {
        self.arena.get(index)
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_constraint_id;
        self.next_constraint_id += 1;
        id
    }

    /// Add `reifier == (sum literals >= k)`. With `k == 1` and no reifier the
    /// constraint is a plain clause and is handed to the core instead;
    /// `None` is returned in every degenerate case that creates no
    /// constraint.
    pub fn add_at_least(
        &mut self,
        reifier: Option<Literal>,
        literals: Vec<Literal>,
        k: u32,
        learned: bool,
    ) -> Result<Option<ConstraintIndex>, ConstraintOperationError> {
        if k == 0 {
            if let Some(reifier) = reifier {
                self.core
                    .assign(reifier, crate::engine::Justification::Decision);
            }
            return Ok(None);
        }
        if k == 1 && reifier.is_none() {
            let _ = self.core.mk_clause(literals, learned)?;
            return Ok(None);
        }
        cardinal_assert_simple!(k as usize <= literals.len());
        let id = self.next_id();
        let constraint = Constraint::new(
            id,
            reifier,
            learned,
            ConstraintBody::Cardinality(Cardinality::new(literals, k)),
        );
        let index = self.arena.insert(constraint);
        self.register_constraint(index);
        Ok(Some(index))
    }

    /// Add `reifier == (sum weight_i * literal_i >= k)`. Unit weights and
    /// `k == 1` degrade to a cardinality constraint; `k == 0` without a
    /// reifier is vacuous.
    pub fn add_pb_ge(
        &mut self,
        reifier: Option<Literal>,
        wlits: Vec<WeightedLiteral>,
        k: u32,
        learned: bool,
    ) -> Result<Option<ConstraintIndex>, ConstraintOperationError> {
        if k == 0 {
            if let Some(reifier) = reifier {
                self.core
                    .assign(reifier, crate::engine::Justification::Decision);
            }
            return Ok(None);
        }
        let units = wlits.iter().all(|wlit| wlit.weight == 1);
        if units || k == 1 {
            let literals = wlits.into_iter().map(|wlit| wlit.literal).collect();
            return self.add_at_least(reifier, literals, k, learned);
        }
        let body = PseudoBoolean::new(wlits, k)?;
        if body.max_sum() < u64::from(k) {
            // the weights cannot reach the bound
            match reifier {
                Some(reifier) => {
                    self.core
                        .assign(!reifier, crate::engine::Justification::Decision);
                    return Ok(None);
                }
                None => {
                    self.core
                        .set_conflict(crate::engine::Justification::Decision, None);
                    return Err(ConstraintOperationError::InfeasibleConstraint);
                }
            }
        }
        let id = self.next_id();
        let constraint = Constraint::new(
            id,
            reifier,
            learned,
            ConstraintBody::PseudoBoolean(body),
        );
        let index = self.arena.insert(constraint);
        self.register_constraint(index);
        Ok(Some(index))
    }

    /// Add `reifier == (literal_1 xor ... xor literal_n)`. Without a reifier
    /// the exclusive-or itself is asserted.
    pub fn add_xor(
        &mut self,
        reifier: Option<Literal>,
        literals: Vec<Literal>,
        learned: bool,
    ) -> Result<Option<ConstraintIndex>, ConstraintOperationError> {
        for literal in &literals {
            self.core.set_external(literal.get_propositional_variable());
        }
        let id = self.next_id();
        let constraint = Constraint::new(id, reifier, learned, ConstraintBody::Parity(Parity::new(literals)));
        let index = self.arena.insert(constraint);
        self.register_constraint(index);
        Ok(Some(index))
    }

    fn register_constraint(&mut self, index: ConstraintIndex) {
        let (is_learned, reifier) = {
            let constraint = self.arena.get(index);
            (constraint.is_learned(), constraint.reifier())
        };
        if is_learned {
            self.learned.push(index);
        } else {
            cardinal_assert_simple!(self.core.at_base_lvl());
            self.constraints.push(index);
        }
        if is_learned && !self.core.at_base_lvl() {
            cardinal_assert_simple!(reifier.is_none());
            // gets initialized after backjump
            self.constraint_to_reinit.push(index);
        } else if let Some(reifier) = reifier {
            self.core.set_external(reifier.get_propositional_variable());
            // both polarities wake the constraint so it re-initializes
            // whenever the reifier becomes assigned
            self.core.watch_list_mut().watch_constraint(reifier, index);
            self.core.watch_list_mut().watch_constraint(!reifier, index);
        } else {
            let _ = self.init_watch(index, true);
        }
        cardinal_assert_simple!(self.arena.get(index).well_formed());
    }

    pub(crate) fn remove_constraint(&mut self, index: ConstraintIndex) {
        self.nullify_tracking_literal(index);
        self.clear_watch(index);
        self.arena.get_mut(index).mark_removed();
        self.constraint_removed = true;
    }

    pub fn push(&mut self) {
        self.constraint_to_reinit_lim
            .push(self.constraint_to_reinit.len());
    }

    pub fn pop(&mut self, n: usize) {
        let new_lim = self.constraint_to_reinit_lim.len() - n;
        self.constraint_to_reinit_last_size = self.constraint_to_reinit_lim[new_lim];
        self.constraint_to_reinit_lim.truncate(new_lim);
        self.num_propagations_since_pop = 0;
        self.next_position_on_trail_to_propagate = std::cmp::min(
            self.next_position_on_trail_to_propagate,
            self.core.assignments().num_trail_entries(),
        );
    }

    /// Re-establish the watches of the learned constraints that were created
    /// above the backjump level. A constraint that still cannot watch (it
    /// propagated or conflicted during re-initialisation below the current
    /// level) stays on the queue.
    pub fn pop_reinit(&mut self) {
        let mut kept = self.constraint_to_reinit_last_size;
        for position in self.constraint_to_reinit_last_size..self.constraint_to_reinit.len() {
            let index = self.constraint_to_reinit[position];
            match self.arena.try_get(index) {
                None => continue,
                Some(constraint) if constraint.is_removed() => continue,
                Some(_) => {}
            }
            if !self.init_watch(index, true) && !self.core.at_base_lvl() {
                self.constraint_to_reinit[kept] = index;
                kept += 1;
            }
        }
        self.constraint_to_reinit.truncate(kept);
    }

    /// Rebuild the problem constraints onto a fresh solver with the same
    /// variables; learned constraints are not carried over.
    pub fn copy(&self) -> Result<CardinalSolver, ConstraintOperationError> {
        let mut result = CardinalSolver::new();
        for _ in 0..self.core.num_vars() {
            let _ = result.new_variable();
        }
        for &index in &self.constraints {
            let Some(constraint) = self.arena.try_get(index) else {
                continue;
            };
            if constraint.is_removed() {
                continue;
            }
            let reifier = constraint.reifier();
            let learned = constraint.is_learned();
            match constraint.body() {
                ConstraintBody::Cardinality(cardinality) => {
                    let _ = result.add_at_least(
                        reifier,
                        cardinality.literals().to_vec(),
                        cardinality.k(),
                        learned,
                    )?;
                }
                ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                    let _ = result.add_pb_ge(
                        reifier,
                        pseudo_boolean.terms().to_vec(),
                        pseudo_boolean.k(),
                        learned,
                    )?;
                }
                ConstraintBody::Parity(parity) => {
                    let _ = result.add_xor(reifier, parity.literals().to_vec(), learned)?;
                }
            }
        }
        Ok(result)
    }

    /// Recognise at-most-one cliques among `literals`: an unreified
    /// cardinality constraint with `size == k + 1` states that at most one
    /// of the negated literals is true. Recognised literals are moved from
    /// `literals` into `mutexes`.
    pub fn find_mutexes(&self, literals: &mut Vec<Literal>, mutexes: &mut Vec<Vec<Literal>>) {
        let mut remaining: HashSet<Literal> = literals.iter().copied().collect();
        let mut change = false;
        for &index in &self.constraints {
            let Some(constraint) = self.arena.try_get(index) else {
                continue;
            };
            if constraint.is_removed() || !constraint.is_cardinality() {
                continue;
            }
            let cardinality = constraint.as_cardinality();
            if cardinality.size() != cardinality.k() as usize + 1 {
                continue;
            }
            let mutex: Vec<Literal> = cardinality
                .literals()
                .iter()
                .filter(|literal| remaining.contains(&!**literal))
                .map(|literal| !*literal)
                .collect();
            if mutex.len() <= 1 {
                continue;
            }
            for literal in &mutex {
                let _ = remaining.remove(literal);
            }
            change = true;
            mutexes.push(mutex);
        }
        if change {
            literals.retain(|literal| remaining.contains(literal));
        }
    }

    /// Turn every at-most-one clique over the full literal set back into a
    /// cardinality constraint.
    pub fn mutex_reduction(&mut self) -> Result<(), ConstraintOperationError> {
        let mut literals = Vec::new();
        for variable in self.core.assignments().get_propositional_variables() {
            literals.push(Literal::new(variable, false));
            literals.push(Literal::new(variable, true));
        }
        let mut mutexes = Vec::new();
        self.find_mutexes(&mut literals, &mut mutexes);
        for mutex in mutexes {
            if mutex.len() > 2 {
                debug!("mutex of size {}", mutex.len());
                let size = mutex.len() as u32;
                let negated = mutex.into_iter().map(|literal| !literal).collect();
                let _ = self.add_at_least(None, negated, size - 1, false)?;
            }
        }
        Ok(())
    }

    /// An unreified cardinality constraint with `size == k + 1` acts as a
    /// clique of binary clauses; report its literals so the core can use
    /// them for binary reasoning.
    pub fn is_extended_binary(&self, index: ConstraintIndex, out: &mut Vec<Literal>) -> bool {
        let Some(constraint) = self.arena.try_get(index) else {
            return false;
        };
        if !constraint.is_cardinality() || constraint.reifier().is_some() {
            return false;
        }
        let cardinality = constraint.as_cardinality();
        if cardinality.size() == cardinality.k() as usize + 1 {
            out.clear();
            out.extend_from_slice(cardinality.literals());
            true
        } else {
            false
        }
    }

    /// Blocked-literal test for the eliminator contract: `literal` occurs in
    /// a clause, it occurs negatively in this constraint, and all other
    /// clause literals are marked. The constraint blocks the resolvent when
    /// the marked weight reaches the bound.
    pub fn is_blocked(
        &self,
        literal: Literal,
        index: ConstraintIndex,
        is_marked: impl Fn(Literal) -> bool,
    ) -> bool {
        let Some(constraint) = self.arena.try_get(index) else {
            return false;
        };
        if constraint.reifier().is_some() {
            return false;
        }
        match constraint.body() {
            ConstraintBody::Cardinality(cardinality) => {
                let weight = cardinality
                    .literals()
                    .iter()
                    .filter(|body_literal| is_marked(!**body_literal))
                    .count() as u64;
                weight >= u64::from(cardinality.k())
            }
            ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                let Some(offset) = pseudo_boolean
                    .terms()
                    .iter()
                    .find(|term| !term.literal == literal)
                    .map(|term| term.weight)
                else {
                    return false;
                };
                let weight: u64 = pseudo_boolean
                    .terms()
                    .iter()
                    .filter(|term| is_marked(!term.literal))
                    .map(|term| u64::from(std::cmp::min(offset, term.weight)))
                    .sum();
                weight >= u64::from(pseudo_boolean.k())
            }
            ConstraintBody::Parity(_) => false,
        }
    }

    /// Lookahead reward of a constraint under the current assignment:
    /// `occs` supplies the occurrence score of a literal.
    pub fn get_reward(
        &self,
        index: ConstraintIndex,
        mut occs: impl FnMut(Literal) -> f64,
    ) -> f64 {
        let Some(constraint) = self.arena.try_get(index) else {
            return 0.0;
        };
        match constraint.body() {
            ConstraintBody::Cardinality(cardinality) => {
                let mut k = i64::from(cardinality.k());
                let mut slack: i64 = 0;
                let mut to_add = 0.0;
                for &literal in cardinality.literals() {
                    match self.core.value(literal) {
                        Some(true) => {
                            k -= 1;
                            if k == 0 {
                                return 0.0;
                            }
                        }
                        None => {
                            to_add += occs(literal);
                            slack += 1;
                        }
                        Some(false) => {}
                    }
                }
                if k >= slack {
                    return 1.0;
                }
                0.5f64.powi((slack - k + 1) as i32) * to_add
            }
            ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                let mut k = i64::from(pseudo_boolean.k());
                let mut slack: i64 = 0;
                let mut undefs: f64 = 0.0;
                let mut to_add = 0.0;
                for term in pseudo_boolean.terms() {
                    match self.core.value(term.literal) {
                        Some(true) => {
                            if k <= i64::from(term.weight) {
                                return 0.0;
                            }
                            k -= i64::from(term.weight);
                        }
                        None => {
                            to_add += occs(term.literal);
                            undefs += 1.0;
                            slack += i64::from(term.weight);
                        }
                        Some(false) => {}
                    }
                }
                if k >= slack || undefs == 0.0 {
                    return 0.0;
                }
                let avg = slack as f64 / undefs;
                0.5f64.powf((slack - k + 1) as f64 / avg) * to_add
            }
            ConstraintBody::Parity(_) => 0.0,
        }
    }
}

impl std::fmt::Display for CardinalSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &index in &self.constraints {
            if let Some(constraint) = self.arena.try_get(index) {
                writeln!(f, "{constraint}")?;
            }
        }
        if !self.learned.is_empty() {
            writeln!(f, "learned:")?;
        }
        for &index in &self.learned {
            if let Some(constraint) = self.arena.try_get(index) {
                writeln!(f, "{constraint}")?;
            }
        }
        Ok(())
    }
}
