mod clause_reference;
mod constraint_index;
mod constraint_operation_error;
mod hash_structures;
mod keyed_vec;
mod literal;
mod propositional_variable;
mod trail;
mod watch_entry;
mod weighted_literal;

pub use clause_reference::ClauseReference;
pub use constraint_index::ConstraintIndex;
pub use constraint_operation_error::ConstraintOperationError;
pub use hash_structures::HashMap;
pub use hash_structures::HashSet;
pub use keyed_vec::KeyedVec;
pub use keyed_vec::StorageKey;
pub use literal::Literal;
pub use propositional_variable::PropositionalVariable;
pub use propositional_variable::PropositionalVariableGeneratorIterator;
pub(crate) use trail::Trail;
pub use watch_entry::WatchEntry;
pub use weighted_literal::WeightedLiteral;
