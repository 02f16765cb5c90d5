use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver,
};
use log::{debug, info};

use crate::data::{SessionId, SlotIndex};
use crate::error::EngineError;
use crate::model::{Model, Sense, VarKind};

/// Outcome of one solve call. Infeasibility is an ordinary outcome, not
/// an error: the orchestrator simply moves on to the next seed.
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    Optimal(BTreeMap<SessionId, SlotIndex>),
    Infeasible,
}

/// The narrow solver boundary. The engine depends on nothing beyond
/// this contract.
pub trait SlotSolver {
    fn solve(&self, model: &Model) -> Result<SolveOutcome, EngineError>;
}

/// Solves the assignment model with the HiGHS ILP solver.
///
/// A fresh solver context is built per call and dropped on return;
/// a context that has reported an error or infeasibility is never
/// reused. Single-threaded with a fixed solver seed so identical
/// models resolve identically.
pub struct HighsSolver {
    /// Wall-clock budget per call, seconds. Exceeding it without an
    /// incumbent is reported as a solver error, not silently retried.
    pub time_budget_secs: f64,
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self {
            time_budget_secs: 10.0,
        }
    }
}

impl SlotSolver for HighsSolver {
    fn solve(&self, model: &Model) -> Result<SolveOutcome, EngineError> {
        let start_time = Instant::now();

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .vars
            .iter()
            .map(|var| match var.kind {
                VarKind::Binary => problem.add(variable().binary()),
                VarKind::NonNegative => problem.add(variable().min(0.0)),
            })
            .collect();

        let objective: Expression = model
            .objective
            .iter()
            .zip(&vars)
            .map(|(&coef, &var)| coef * var)
            .sum();

        let mut ilp = problem
            .minimise(objective)
            .using(default_solver)
            .set_option("threads", 1)
            .set_option("random_seed", 1234)
            .set_option("time_limit", self.time_budget_secs)
            .set_option("log_to_console", "false");

        for row in &model.rows {
            let expr: Expression = row
                .terms
                .iter()
                .map(|&(idx, coef)| coef * vars[idx])
                .sum();
            match row.sense {
                Sense::Eq => ilp.add_constraint(constraint!(expr == row.rhs)),
                Sense::Le => ilp.add_constraint(constraint!(expr <= row.rhs)),
                Sense::Ge => ilp.add_constraint(constraint!(expr >= row.rhs)),
            };
        }
        debug!(
            "submitted {} variables and {} rows to HiGHS",
            model.vars.len(),
            model.rows.len()
        );

        let solution = match ilp.solve() {
            Ok(s) => s,
            Err(ResolutionError::Infeasible) => {
                info!("solver reported infeasible in {:.2?}", start_time.elapsed());
                return Ok(SolveOutcome::Infeasible);
            }
            Err(e) => {
                return Err(EngineError::Solver(format!(
                    "HiGHS failed after {:.2?}: {e}",
                    start_time.elapsed()
                )));
            }
        };
        info!("solution found in {:.2?}", start_time.elapsed());

        let mut assignment: BTreeMap<SessionId, SlotIndex> = BTreeMap::new();
        let mut expected: HashSet<SessionId> = HashSet::new();
        for (idx, session, slot) in model.place_vars() {
            expected.insert(session);
            if solution.value(vars[idx]) > 0.9 && assignment.insert(session, slot).is_some() {
                return Err(EngineError::Solver(format!(
                    "session {session} was assigned more than one slot"
                )));
            }
        }
        if assignment.len() != expected.len() {
            return Err(EngineError::Solver(format!(
                "solver left {} of {} sessions unassigned",
                expected.len() - assignment.len(),
                expected.len()
            )));
        }
        Ok(SolveOutcome::Optimal(assignment))
    }
}
