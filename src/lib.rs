//! # Cardinal
//! Cardinal is a propagation and learning engine for Boolean cardinality,
//! pseudo-Boolean, and parity (xor) constraints, designed to extend a
//! CDCL-style search over a propositional trail. It keeps the three
//! constraint families in a shared store with watched-literal propagation
//! (the Chai-Kuhlmann watched-prefix scheme for the weighted form), learns
//! from conflicts by cutting-planes resolution over a running integer
//! inequality, and maintains the constraint database with root-level
//! simplification, subsumption, equivalent-literal substitution, and
//! glue-driven garbage collection of learned constraints.
//!
//! The crate also ships `fixplex`, a self-contained fixed-precision simplex
//! tableau that decides feasibility of systems of linear equalities modulo
//! `2^64` under modular interval bounds on the variables.
//!
//! # Example
//!
//! ```rust
//! use cardinal_solver::CardinalSolver;
//!
//! let mut solver = CardinalSolver::new();
//! let x = solver.new_literal();
//! let y = solver.new_literal();
//! let z = solver.new_literal();
//!
//! // at least two of x, y, z
//! let _ = solver.add_at_least(None, vec![x, y, z], 2, false).unwrap();
//!
//! solver.core_mut().increase_decision_level();
//! solver.core_mut().enqueue_decision_literal(!x);
//! solver.propagate_pending();
//!
//! // with x false, both y and z are forced
//! assert_eq!(solver.core().value(y), Some(true));
//! assert_eq!(solver.core().value(z), Some(true));
//! ```
pub mod asserts;
pub mod basic_types;
pub mod constraints;
pub mod engine;
pub mod fixplex;
pub mod solver;

pub use basic_types::ConstraintIndex;
pub use basic_types::Literal;
pub use basic_types::PropositionalVariable;
pub use basic_types::WeightedLiteral;
pub use solver::CardinalSolver;
pub use solver::ConflictResolution;
pub use solver::PropagationOutcome;
