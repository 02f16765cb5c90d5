use thiserror::Error;

/// Fatal faults of a generation run. An attempt that merely finds no
/// satisfying assignment is not an error; it is reported as an
/// infeasible outcome and the orchestrator moves on to the next seed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input references unknown ids or carries invalid counts. Rejected
    /// before modeling, never retried.
    #[error("malformed entity: {0}")]
    MalformedEntity(String),
    /// The solver boundary itself failed or exceeded its budget. An
    /// integration fault, not a constraint fault.
    #[error("solver failure: {0}")]
    Solver(String),
}
