use crate::basic_types::ConstraintIndex;
use crate::basic_types::Literal;
use crate::constraints::ConstraintBody;
use crate::solver::CardinalSolver;

/// Reference representation of an inequality `sum coeffs[i] * lits[i] >= k`
/// used to validate the resolver and learned lemmas against a
/// straightforward reading of the constraint semantics.
#[derive(Clone, Debug, Default)]
pub struct Inequality {
    pub lits: Vec<Literal>,
    pub coeffs: Vec<u64>,
    pub k: u64,
}

impl Inequality {
    pub fn reset(&mut self, k: u64) {
        self.lits.clear();
        self.coeffs.clear();
        self.k = k;
    }

    pub fn push(&mut self, literal: Literal, coeff: u64) {
        self.lits.push(literal);
        self.coeffs.push(coeff);
    }
}

impl std::fmt::Display for Inequality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (literal, coeff) in self.lits.iter().zip(self.coeffs.iter()) {
            write!(f, "{coeff}*{literal} ")?;
        }
        write!(f, ">= {}", self.k)
    }
}

impl CardinalSolver {
    /// Evaluate the constraint under the current assignment, reifier
    /// included: `None` when undetermined.
    pub fn evaluate(&self, index: ConstraintIndex) -> Option<bool> {
        let constraint = self.arena.get(index);
        let reifier_value = match constraint.reifier() {
            None => Some(true),
            Some(reifier) => self.core.value(reifier),
        };
        let body_value = match constraint.body() {
            ConstraintBody::Cardinality(cardinality) => {
                let mut trues: u64 = 0;
                let mut undefs: u64 = 0;
                for &literal in cardinality.literals() {
                    match self.core.value(literal) {
                        Some(true) => trues += 1,
                        None => undefs += 1,
                        Some(false) => {}
                    }
                }
                if trues + undefs < u64::from(cardinality.k()) {
                    Some(false)
                } else if trues >= u64::from(cardinality.k()) {
                    Some(true)
                } else {
                    None
                }
            }
            ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                let mut trues: u64 = 0;
                let mut undefs: u64 = 0;
                for term in pseudo_boolean.terms() {
                    match self.core.value(term.literal) {
                        Some(true) => trues += u64::from(term.weight),
                        None => undefs += u64::from(term.weight),
                        Some(false) => {}
                    }
                }
                if trues + undefs < u64::from(pseudo_boolean.k()) {
                    Some(false)
                } else if trues >= u64::from(pseudo_boolean.k()) {
                    Some(true)
                } else {
                    None
                }
            }
            ConstraintBody::Parity(parity) => {
                let mut odd = false;
                let mut undetermined = false;
                for &literal in parity.literals() {
                    match self.core.value(literal) {
                        Some(true) => odd = !odd,
                        Some(false) => {}
                        None => {
                            undetermined = true;
                            break;
                        }
                    }
                }
                if undetermined {
                    None
                } else {
                    Some(odd)
                }
            }
        };
        match (reifier_value, body_value) {
            (Some(reifier), Some(body)) => Some(reifier == body),
            _ => None,
        }
    }

    /// Watch coverage of a single constraint: every watched position is on
    /// the watch list of its literal, and nothing else is.
    pub fn validate_watched_constraint(&self, index: ConstraintIndex) -> bool {
        let constraint = self.arena.get(index);
        if constraint.is_removed() {
            return true;
        }
        if constraint.is_pseudo_boolean()
            && (!self.validate_watch_pb(index) || !self.validate_pb_slack(index))
        {
            return false;
        }
        if let Some(reifier) = constraint.reifier() {
            if self.core.value(reifier) != Some(true) {
                return true;
            }
            if self.core.lvl(reifier) != 0
                && (!self.core.watch_list().get(reifier).iter().any(|entry| {
                    entry.is_constraint() && entry.get_constraint_index() == index
                }) || !self.core.watch_list().get(!reifier).iter().any(|entry| {
                    entry.is_constraint() && entry.get_constraint_index() == index
                }))
            {
                return false;
            }
        }
        if self.evaluate(index) == Some(true) {
            return true;
        }
        for position in 0..constraint.size() {
            let literal = constraint.get_literal(position);
            if self.core.assignments().is_literal_root_assignment(literal) {
                continue;
            }
            let watched = self.core.watch_list().is_watching(literal, index);
            if watched != constraint.is_watching(literal) {
                return false;
            }
        }
        true
    }

    /// The pseudo-Boolean prefix invariant: exactly the first `num_watch`
    /// terms are on the watch lists.
    pub fn validate_watch_pb(&self, index: ConstraintIndex) -> bool {
        let pseudo_boolean = self.arena.get(index).as_pseudo_boolean();
        for (position, term) in pseudo_boolean.terms().iter().enumerate() {
            let should_watch = position < pseudo_boolean.num_watch();
            if self.core.assignments().is_literal_assigned(term.literal)
                && self.core.lvl(term.literal) == 0
            {
                continue;
            }
            if self.core.watch_list().is_watching(term.literal, index) != should_watch {
                return false;
            }
        }
        true
    }

    /// At quiescence the cached slack equals the weight of the non-false
    /// watched terms.
    pub fn validate_pb_slack(&self, index: ConstraintIndex) -> bool {
        let pseudo_boolean = self.arena.get(index).as_pseudo_boolean();
        if pseudo_boolean.num_watch() == 0 {
            return true;
        }
        let slack: u64 = pseudo_boolean.terms()[..pseudo_boolean.num_watch()]
            .iter()
            .filter(|term| self.core.value(term.literal) != Some(false))
            .map(|term| u64::from(term.weight))
            .sum();
        slack == u64::from(pseudo_boolean.slack())
    }

    /// Every stored constraint has a well-formed body.
    pub fn validate_well_formed(&self) -> bool {
        self.constraints
            .iter()
            .chain(self.learned.iter())
            .filter_map(|&index| self.arena.try_get(index))
            .all(|constraint| constraint.is_removed() || constraint.well_formed())
    }

    /// The unit propagation of `literal` by constraint `index` is justified
    /// under the current assignment.
    pub(crate) fn validate_unit_propagation(
        &self,
        index: ConstraintIndex,
        literal: Literal,
    ) -> bool {
        let constraint = self.arena.get(index);
        if constraint
            .reifier()
            .is_some_and(|reifier| self.core.value(reifier) != Some(true))
        {
            return false;
        }
        match constraint.body() {
            ConstraintBody::Cardinality(cardinality) => {
                // the tail must be false
                cardinality.literals()[cardinality.k() as usize..]
                    .iter()
                    .all(|&tail| self.core.value(tail) == Some(false))
            }
            ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                // without the propagated literal the bound is unreachable
                let sum: u64 = pseudo_boolean
                    .terms()
                    .iter()
                    .filter(|term| {
                        term.literal != literal
                            && self.core.value(term.literal) != Some(false)
                    })
                    .map(|term| u64::from(term.weight))
                    .sum();
                sum < u64::from(pseudo_boolean.k())
            }
            ConstraintBody::Parity(parity) => parity.literals()[1..]
                .iter()
                .all(|&tail| self.core.value(tail).is_some()),
        }
    }

    /// The running inequality of the resolver is still conflicting: its
    /// slack under the current assignment is negative.
    pub(crate) fn validate_lemma(&self) -> bool {
        let mut value: i64 = -i64::from(self.resolver.bound);
        let mut seen: crate::basic_types::HashSet<crate::basic_types::PropositionalVariable> = crate::basic_types::HashSet::default();
        for &variable in &self.resolver.active_vars {
            if !seen.insert(variable) {
                continue;
            }
            let coeff = self.resolver.coeffs[variable];
            if coeff == 0 {
                continue;
            }
            let literal = Literal::new(variable, true);
            if coeff < 0 && self.core.value(literal) != Some(true) {
                value -= coeff;
            } else if coeff > 0 && self.core.value(literal) != Some(false) {
                value += coeff;
            }
        }
        value < 0
    }

    /// Render the resolver state in the reference representation.
    pub(crate) fn active_to_inequality(&self, out: &mut Inequality) {
        out.reset(u64::from(self.resolver.bound));
        let mut seen: crate::basic_types::HashSet<crate::basic_types::PropositionalVariable> = crate::basic_types::HashSet::default();
        for &variable in &self.resolver.active_vars {
            if !seen.insert(variable) {
                continue;
            }
            let coeff = self.resolver.coeffs[variable];
            if coeff == 0 {
                continue;
            }
            out.push(Literal::new(variable, coeff >= 0), coeff.unsigned_abs());
        }
    }

    /// A conflict certificate: all of `lits` are false and the inequality
    /// cannot be satisfied by the remaining terms.
    pub fn validate_conflict(&self, lits: &[Literal], inequality: &Inequality) -> bool {
        if lits
            .iter()
            .any(|&literal| self.core.value(literal) != Some(false))
        {
            return false;
        }
        let mut value: u64 = 0;
        for (literal, coeff) in inequality.lits.iter().zip(inequality.coeffs.iter()) {
            if !lits.contains(literal) {
                value += coeff;
            }
        }
        value < inequality.k
    }
}
