use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConstraintOperationError {
    #[error("Adding the constraint failed because it is infeasible at the root")]
    InfeasibleConstraint,
    #[error("Adding the clause failed because it is infeasible at the root")]
    InfeasibleClause,
    #[error("Adding constraint failed because the solver is in an infeasible state")]
    InfeasibleState,
    #[error("The sum of the coefficients overflows the weight range")]
    WeightOverflow,
}
