use crate::basic_types::ConstraintOperationError;
use crate::basic_types::Literal;
use crate::basic_types::WeightedLiteral;
use crate::cardinal_assert_simple;

/// The body of a pseudo-Boolean constraint: the weighted sum of the true
/// literals must reach `bound`. The first `num_watch` terms are the watched
/// prefix, and `slack` caches the weight sum of the watched terms that are
/// not false.
#[derive(Clone, Debug)]
pub struct PseudoBoolean {
    terms: Vec<WeightedLiteral>,
    bound: u32,
    slack: u32,
    num_watch: usize,
    max_sum: u64,
}

impl PseudoBoolean {
    pub fn new(
        terms: Vec<WeightedLiteral>,
        bound: u32,
    ) -> Result<PseudoBoolean, ConstraintOperationError> {
        let mut pb = PseudoBoolean {
            terms,
            bound,
            slack: 0,
            num_watch: 0,
            max_sum: 0,
        };
        pb.update_max_sum()?;
        Ok(pb)
    }

    pub fn k(&self) -> u32 {
        self.bound
    }

    pub fn set_k(&mut self, bound: u32) {
        self.bound = bound;
    }

    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn term(&self, index: usize) -> WeightedLiteral {
        self.terms[index]
    }

    pub fn set_term(&mut self, index: usize, term: WeightedLiteral) {
        self.terms[index] = term;
    }

    pub fn terms(&self) -> &[WeightedLiteral] {
        &self.terms
    }

    pub fn literal(&self, index: usize) -> Literal {
        self.terms[index].literal
    }

    pub fn set_literal(&mut self, index: usize, literal: Literal) {
        self.terms[index].literal = literal;
    }

    pub fn weight(&self, index: usize) -> u32 {
        self.terms[index].weight
    }

    pub fn literals(&self) -> Vec<Literal> {
        self.terms.iter().map(|term| term.literal).collect()
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.terms.swap(a, b);
    }

    pub fn truncate(&mut self, new_size: usize) {
        self.terms.truncate(new_size);
    }

    /// Replace the whole body, used when recompilation merges terms. The
    /// caller refreshes the cached sums through [PseudoBoolean::update_max_sum].
    pub fn replace(&mut self, terms: Vec<WeightedLiteral>, bound: u32) {
        self.terms = terms;
        self.bound = bound;
        self.slack = 0;
        self.num_watch = 0;
    }

    pub fn slack(&self) -> u32 {
        self.slack
    }

    pub fn set_slack(&mut self, slack: u32) {
        self.slack = slack;
    }

    pub fn num_watch(&self) -> usize {
        self.num_watch
    }

    pub fn set_num_watch(&mut self, num_watch: usize) {
        self.num_watch = num_watch;
    }

    pub fn max_sum(&self) -> u64 {
        self.max_sum
    }

    /// Clip every weight to the bound (only `min(weight, k)` matters for a
    /// `>= k` constraint) and recompute the weight sum, rejecting sums that
    /// leave the weight range.
    pub fn update_max_sum(&mut self) -> Result<(), ConstraintOperationError> {
        self.max_sum = 0;
        for term in self.terms.iter_mut() {
            term.weight = std::cmp::min(self.bound, term.weight);
            self.max_sum += u64::from(term.weight);
            if self.max_sum > u64::from(u32::MAX) {
                return Err(ConstraintOperationError::WeightOverflow);
            }
        }
        Ok(())
    }

    /// De Morgan on the weighted form: the negated body requires the negated
    /// literals to reach `max_sum - k + 1`.
    pub fn negate(&mut self) {
        let mut weight_sum: u64 = 0;
        for term in self.terms.iter_mut() {
            term.literal = !term.literal;
            weight_sum += u64::from(term.weight);
        }
        cardinal_assert_simple!(weight_sum >= u64::from(self.bound));
        self.bound = (weight_sum - u64::from(self.bound) + 1) as u32;
        cardinal_assert_simple!(self.bound > 0);
    }

    /// The watched positions are the prefix `[0, num_watch)`.
    pub fn is_watching(&self, literal: Literal) -> bool {
        self.terms[..self.num_watch]
            .iter()
            .any(|term| term.literal == literal)
    }

    /// All weights equal: the constraint is a cardinality constraint in
    /// disguise, with bound `ceil(k / weight)`.
    pub fn is_cardinality(&self) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let weight = self.terms[0].weight;
        self.terms.iter().all(|term| term.weight == weight)
    }
}

impl std::fmt::Display for PseudoBoolean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (position, term) in self.terms.iter().enumerate() {
            if position > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{term}")?;
        }
        write!(f, " >= {}", self.bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::PropositionalVariable;

    fn term(weight: u32, index: u32) -> WeightedLiteral {
        WeightedLiteral::new(weight, Literal::new(PropositionalVariable::new(index), true))
    }

    #[test]
    fn weights_are_clipped_to_the_bound() {
        let pb = PseudoBoolean::new(vec![term(10, 0), term(2, 1)], 4).unwrap();
        assert_eq!(pb.weight(0), 4);
        assert_eq!(pb.weight(1), 2);
        assert_eq!(pb.max_sum(), 6);
    }

    #[test]
    fn negation_is_an_involution() {
        let original = PseudoBoolean::new(vec![term(3, 0), term(2, 1), term(1, 2)], 4).unwrap();
        let mut negated = original.clone();
        negated.negate();
        // 3 + 2 + 1 - 4 + 1
        assert_eq!(negated.k(), 3);
        negated.negate();
        assert_eq!(negated.k(), original.k());
        assert_eq!(negated.terms(), original.terms());
    }

    #[test]
    fn equal_weights_are_recognised_as_cardinality() {
        let uniform = PseudoBoolean::new(vec![term(2, 0), term(2, 1)], 3).unwrap();
        assert!(uniform.is_cardinality());
        let mixed = PseudoBoolean::new(vec![term(2, 0), term(1, 1)], 3).unwrap();
        assert!(!mixed.is_cardinality());
    }
}
