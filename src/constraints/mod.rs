mod arena;
mod cardinality;
mod constraint;
mod parity;
mod pseudo_boolean;

pub use arena::ConstraintArena;
pub use cardinality::Cardinality;
pub use constraint::Constraint;
pub use constraint::ConstraintBody;
pub use parity::Parity;
pub use pseudo_boolean::PseudoBoolean;
