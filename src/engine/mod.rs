mod assignments;
mod clause_database;
mod justification;
mod solver_core;
mod watch_list;

pub use assignments::Assignments;
pub use clause_database::Clause;
pub use clause_database::ClauseDatabase;
pub use justification::Justification;
pub use solver_core::SolverCore;
pub use solver_core::StoredConflict;
pub use watch_list::WatchList;
