use crate::basic_types::ConstraintIndex;
use crate::basic_types::KeyedVec;
use crate::cardinal_assert_simple;
use crate::constraints::Constraint;

/// Owner of all extension constraints. Slots are addressed by stable
/// [ConstraintIndex] handles which other components keep across watch lists
/// and justifications; a removed constraint keeps its (flagged) slot until
/// the post-GC sweep releases it into the free list. Traversals that may
/// hold a stale handle go through [ConstraintArena::try_get] and recheck the
/// removal flag.
#[derive(Debug, Default)]
pub struct ConstraintArena {
    slots: KeyedVec<ConstraintIndex, Option<Constraint>>,
    free: Vec<ConstraintIndex>,
}

impl ConstraintArena {
    pub fn insert(&mut self, constraint: Constraint) -> ConstraintIndex {
        if let Some(index) = self.free.pop() {
            cardinal_assert_simple!(self.slots[index].is_none());
            self.slots[index] = Some(constraint);
            index
        } else {
            let index = self.slots.push(Some(constraint));
            cardinal_assert_simple!(index.get() <= ConstraintIndex::MAX);
            index
        }
    }

    pub fn get(&self, index: ConstraintIndex) -> &Constraint {
        self.slots[index]
            .as_ref()
            .expect("constraint slot has been released")
    }

    pub fn get_mut(&mut self, index: ConstraintIndex) -> &mut Constraint {
        self.slots[index]
            .as_mut()
            .expect("constraint slot has been released")
    }

    /// Dangling-tolerant lookup used by traversals that may race a sweep.
    pub fn try_get(&self, index: ConstraintIndex) -> Option<&Constraint> {
        self.slots[index].as_ref()
    }

    /// Release the slot of a removed constraint for reuse.
    pub fn release(&mut self, index: ConstraintIndex) {
        cardinal_assert_simple!(self.slots[index]
            .as_ref()
            .is_some_and(|constraint| constraint.is_removed()));
        self.slots[index] = None;
        self.free.push(index);
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::Literal;
    use crate::basic_types::PropositionalVariable;
    use crate::constraints::Cardinality;
    use crate::constraints::ConstraintBody;

    fn cardinality(id: u32) -> Constraint {
        let literals = vec![
            Literal::new(PropositionalVariable::new(0), true),
            Literal::new(PropositionalVariable::new(1), true),
        ];
        Constraint::new(
            id,
            None,
            false,
            ConstraintBody::Cardinality(Cardinality::new(literals, 1)),
        )
    }

    #[test]
    fn released_slots_are_reused() {
        let mut arena = ConstraintArena::default();
        let first = arena.insert(cardinality(0));
        let second = arena.insert(cardinality(1));
        assert_ne!(first, second);

        arena.get_mut(first).mark_removed();
        arena.release(first);
        assert!(arena.try_get(first).is_none());

        let third = arena.insert(cardinality(2));
        assert_eq!(third, first);
        assert_eq!(arena.get(third).id(), 2);
        assert_eq!(arena.num_slots(), 2);
    }
}
