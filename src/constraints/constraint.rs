use crate::basic_types::HashSet;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::cardinal_assert_moderate;
use crate::constraints::Cardinality;
use crate::constraints::Parity;
use crate::constraints::PseudoBoolean;

/// A stored extension constraint: the header shared between the three
/// variants plus the variant body. The reifying literal, when present, makes
/// the constraint conditional: it only has to hold when the reifier is true,
/// and its negation has to hold when the reifier is false.
#[derive(Clone, Debug)]
pub struct Constraint {
    id: u32,
    reifier: Option<Literal>,
    is_learned: bool,
    is_removed: bool,
    glue: u32,
    psm: u32,
    body: ConstraintBody,
}

#[derive(Clone, Debug)]
pub enum ConstraintBody {
    Cardinality(Cardinality),
    PseudoBoolean(PseudoBoolean),
    Parity(Parity),
}

impl Constraint {
    pub fn new(
        id: u32,
        reifier: Option<Literal>,
        is_learned: bool,
        body: ConstraintBody,
    ) -> Constraint {
        let glue = match &body {
            ConstraintBody::Cardinality(cardinality) => cardinality.size() as u32,
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.size() as u32,
            ConstraintBody::Parity(parity) => parity.size() as u32,
        };
        Constraint {
            id,
            reifier,
            is_learned,
            is_removed: false,
            // pessimistic glue
            glue,
            psm: 0,
            body,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn reifier(&self) -> Option<Literal> {
        self.reifier
    }

    pub fn set_reifier(&mut self, reifier: Literal) {
        self.reifier = Some(reifier);
    }

    pub fn nullify_reifier(&mut self) {
        self.reifier = None;
    }

    fn negate_reifier(&mut self) {
        self.reifier = self.reifier.map(|literal| !literal);
    }

    pub fn is_learned(&self) -> bool {
        self.is_learned
    }

    pub fn set_learned(&mut self, is_learned: bool) {
        self.is_learned = is_learned;
    }

    pub fn is_removed(&self) -> bool {
        self.is_removed
    }

    pub fn mark_removed(&mut self) {
        self.is_removed = true;
    }

    pub fn glue(&self) -> u32 {
        self.glue
    }

    pub fn set_glue(&mut self, glue: u32) {
        self.glue = glue;
    }

    pub fn psm(&self) -> u32 {
        self.psm
    }

    pub fn set_psm(&mut self, psm: u32) {
        self.psm = psm;
    }

    pub fn body(&self) -> &ConstraintBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ConstraintBody {
        &mut self.body
    }

    pub fn is_cardinality(&self) -> bool {
        matches!(self.body, ConstraintBody::Cardinality(_))
    }

    pub fn is_pseudo_boolean(&self) -> bool {
        matches!(self.body, ConstraintBody::PseudoBoolean(_))
    }

    pub fn is_parity(&self) -> bool {
        matches!(self.body, ConstraintBody::Parity(_))
    }

    pub fn as_cardinality(&self) -> &Cardinality {
        match &self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality,
            _ => panic!("constraint {} is not a cardinality constraint", self.id),
        }
    }

    pub fn as_cardinality_mut(&mut self) -> &mut Cardinality {
        match &mut self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality,
            _ => panic!("not a cardinality constraint"),
        }
    }

    pub fn as_pseudo_boolean(&self) -> &PseudoBoolean {
        match &self.body {
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean,
            _ => panic!("constraint {} is not a pseudo-Boolean constraint", self.id),
        }
    }

    pub fn as_pseudo_boolean_mut(&mut self) -> &mut PseudoBoolean {
        match &mut self.body {
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean,
            _ => panic!("not a pseudo-Boolean constraint"),
        }
    }

    pub fn as_parity(&self) -> &Parity {
        match &self.body {
            ConstraintBody::Parity(parity) => parity,
            _ => panic!("constraint {} is not a parity constraint", self.id),
        }
    }

    pub fn as_parity_mut(&mut self) -> &mut Parity {
        match &mut self.body {
            ConstraintBody::Parity(parity) => parity,
            _ => panic!("not a parity constraint"),
        }
    }

    pub fn size(&self) -> usize {
        match &self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.size(),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.size(),
            ConstraintBody::Parity(parity) => parity.size(),
        }
    }

    pub fn get_literal(&self, index: usize) -> Literal {
        match &self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.literal(index),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.literal(index),
            ConstraintBody::Parity(parity) => parity.literal(index),
        }
    }

    pub fn set_literal(&mut self, index: usize, literal: Literal) {
        match &mut self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.set_literal(index, literal),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => {
                pseudo_boolean.set_literal(index, literal)
            }
            ConstraintBody::Parity(parity) => parity.set_literal(index, literal),
        }
    }

    pub fn get_coeff(&self, index: usize) -> u32 {
        match &self.body {
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.weight(index),
            _ => 1,
        }
    }

    pub fn literals(&self) -> Vec<Literal> {
        (0..self.size()).map(|index| self.get_literal(index)).collect()
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        match &mut self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.swap(a, b),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.swap(a, b),
            ConstraintBody::Parity(parity) => parity.swap(a, b),
        }
    }

    pub fn truncate(&mut self, new_size: usize) {
        match &mut self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.truncate(new_size),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.truncate(new_size),
            ConstraintBody::Parity(_) => panic!("parity constraints are not truncated"),
        }
    }

    /// The threshold of a cardinality or pseudo-Boolean constraint.
    pub fn k(&self) -> u32 {
        match &self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.k(),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.k(),
            ConstraintBody::Parity(_) => panic!("parity constraints have no threshold"),
        }
    }

    pub fn set_k(&mut self, k: u32) {
        match &mut self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.set_k(k),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.set_k(k),
            ConstraintBody::Parity(_) => panic!("parity constraints have no threshold"),
        }
    }

    /// Flip the constraint into its De Morgan dual, negating the reifier
    /// alongside the body. Parity constraints are never negated in place
    /// (their dual is handled by flipping the reifier at initialisation).
    pub fn negate(&mut self) {
        self.negate_reifier();
        match &mut self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.negate(),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.negate(),
            ConstraintBody::Parity(_) => {
                panic!("parity constraints are negated through their reifier")
            }
        }
    }

    pub fn is_watching(&self, literal: Literal) -> bool {
        match &self.body {
            ConstraintBody::Cardinality(cardinality) => cardinality.is_watching(literal),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => pseudo_boolean.is_watching(literal),
            ConstraintBody::Parity(parity) => parity.is_watching(literal),
        }
    }

    /// Each variable occurs at most once, the reifier included, and no
    /// pseudo-Boolean coefficient exceeds the bound.
    pub fn well_formed(&self) -> bool {
        let mut variables: HashSet<PropositionalVariable> = HashSet::default();
        if let Some(reifier) = self.reifier {
            let _ = variables.insert(reifier.get_propositional_variable());
        }
        for index in 0..self.size() {
            let variable = self.get_literal(index).get_propositional_variable();
            if !variables.insert(variable) {
                return false;
            }
            if let ConstraintBody::PseudoBoolean(pseudo_boolean) = &self.body {
                if pseudo_boolean.weight(index) > pseudo_boolean.k() {
                    return false;
                }
            }
        }
        if let ConstraintBody::Cardinality(cardinality) = &self.body {
            cardinal_assert_moderate!(cardinality.k() >= 1);
        }
        true
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(reifier) = self.reifier {
            write!(f, "{reifier} == ")?;
        }
        match &self.body {
            ConstraintBody::Cardinality(cardinality) => write!(f, "{cardinality}"),
            ConstraintBody::PseudoBoolean(pseudo_boolean) => write!(f, "{pseudo_boolean}"),
            ConstraintBody::Parity(parity) => write!(f, "{parity}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::WeightedLiteral;

    fn literal(index: u32) -> Literal {
        Literal::new(PropositionalVariable::new(index), true)
    }

    #[test]
    fn duplicate_variables_are_rejected() {
        let well = Constraint::new(
            0,
            None,
            false,
            ConstraintBody::Cardinality(Cardinality::new(vec![literal(0), literal(1)], 1)),
        );
        assert!(well.well_formed());

        let duplicated = Constraint::new(
            1,
            None,
            false,
            ConstraintBody::Cardinality(Cardinality::new(vec![literal(0), !literal(0)], 1)),
        );
        assert!(!duplicated.well_formed());

        let through_reifier = Constraint::new(
            2,
            Some(literal(1)),
            false,
            ConstraintBody::Cardinality(Cardinality::new(vec![literal(0), literal(1)], 1)),
        );
        assert!(!through_reifier.well_formed());
    }

    #[test]
    fn display_forms() {
        let cardinality = Constraint::new(
            0,
            Some(literal(5)),
            false,
            ConstraintBody::Cardinality(Cardinality::new(vec![literal(0), literal(1)], 2)),
        );
        assert_eq!(format!("{cardinality}"), "p5 == p0 p1 >= 2");

        let pseudo_boolean = Constraint::new(
            1,
            None,
            false,
            ConstraintBody::PseudoBoolean(
                PseudoBoolean::new(
                    vec![
                        WeightedLiteral::new(2, literal(0)),
                        WeightedLiteral::new(1, !literal(1)),
                    ],
                    2,
                )
                .unwrap(),
            ),
        );
        assert_eq!(format!("{pseudo_boolean}"), "2 * p0 + ~p1 >= 2");

        let parity = Constraint::new(
            2,
            None,
            false,
            ConstraintBody::Parity(Parity::new(vec![literal(0), literal(1), literal(2)])),
        );
        assert_eq!(format!("{parity}"), "p0 x p1 x p2");
    }
}
