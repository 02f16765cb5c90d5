use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};

use log::{debug, info, warn};

use crate::data::{
    GenerateOptions, GenerationResult, GenerationStatus, ScheduleOption, SessionId, SlotIndex,
    TimetableInput,
};
use crate::error::EngineError;
use crate::model::build_model;
use crate::solver::{HighsSolver, SlotSolver, SolveOutcome};
use crate::{assemble, domain, normalize, study_hall};

/// Base of the deterministic seed sequence; attempt i perturbs the
/// objective with seed BASE + i, so identical inputs replay the same
/// sequence and produce bit-identical results.
const SEED_BASE: u64 = 0x5eed_ba5e;

/// Runs bounded solve attempts under randomized tie-break seeds and
/// collects distinct feasible timetables.
///
/// Attempts run strictly in sequence; `on_progress` is invoked after
/// every attempt with (attempts completed, attempt budget, message).
/// The run terminates once `num_options` distinct schedules are
/// recorded or the attempt budget is exhausted. An infeasible attempt
/// moves on to the next seed; a solver fault aborts the whole run.
pub fn generate(
    input: &TimetableInput,
    options: &GenerateOptions,
    on_progress: &mut dyn FnMut(u32, u32, &str),
) -> GenerationResult {
    match run(input, options, on_progress) {
        Ok(result) => result,
        Err(e) => {
            warn!("generation aborted: {e}");
            GenerationResult::error(e.to_string())
        }
    }
}

fn run(
    input: &TimetableInput,
    options: &GenerateOptions,
    on_progress: &mut dyn FnMut(u32, u32, &str),
) -> Result<GenerationResult, EngineError> {
    let rules = input.rules.clone().validated()?;
    let mut sessions = normalize::build_sessions(input)?;
    if let Err(diagnostic) = domain::compute_domains(&mut sessions) {
        info!("model infeasible before solving: {diagnostic}");
        return Ok(GenerationResult::infeasible(diagnostic));
    }

    let mut model = build_model(&sessions, &rules);
    let solver = HighsSolver {
        time_budget_secs: options.time_budget_secs,
    };
    let num_options = options.num_options.max(1);
    let num_attempts = options.num_attempts.max(1);

    let mut recorded: Vec<ScheduleOption> = Vec::new();
    let mut assignments: Vec<BTreeMap<SessionId, SlotIndex>> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();

    for attempt in 0..num_attempts {
        model.reseed_objective(SEED_BASE + u64::from(attempt));
        let message = match solver.solve(&model)? {
            SolveOutcome::Optimal(assignment) => {
                if seen.insert(assignment_hash(&assignment)) {
                    if let Some(min) = min_hamming_distance(&assignment, &assignments) {
                        debug!("new assignment differs from nearest recorded in {min} sessions");
                    }
                    let halls = study_hall::place_study_halls(input, &sessions, &assignment, &rules);
                    let option = assemble::build_option(input, &sessions, &assignment, halls, &rules);
                    recorded.push(option);
                    assignments.push(assignment);
                    format!("recorded option {} of {num_options}", recorded.len())
                } else {
                    "discarded a repeated assignment".to_string()
                }
            }
            SolveOutcome::Infeasible => "attempt was infeasible".to_string(),
        };
        on_progress(attempt + 1, num_attempts, &message);
        if recorded.len() as u32 >= num_options {
            break;
        }
    }

    if recorded.is_empty() {
        return Ok(GenerationResult::infeasible(format!(
            "no feasible timetable found in {num_attempts} attempts; common causes: \
             a teacher committed beyond a day's capacity, conflicting fixed slots, \
             a grade with more weekly meetings than slots, or overly narrow \
             day/block restrictions"
        )));
    }

    assemble::rank_and_label(&mut recorded);
    info!(
        "generation finished with {} option(s), best has {} back-to-back issue(s)",
        recorded.len(),
        recorded[0].back_to_back_issues
    );
    Ok(GenerationResult {
        status: GenerationStatus::Ok,
        options: recorded,
        message: None,
    })
}

/// Distinctness key: two options count as the same schedule only if
/// their session-to-slot mappings are bit-identical.
fn assignment_hash(assignment: &BTreeMap<SessionId, SlotIndex>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for entry in assignment {
        entry.hash(&mut hasher);
    }
    hasher.finish()
}

/// Hamming distance to the nearest recorded assignment: the number of
/// sessions placed differently. Logged as a diversity signal, not
/// enforced as a bound.
fn min_hamming_distance(
    candidate: &BTreeMap<SessionId, SlotIndex>,
    recorded: &[BTreeMap<SessionId, SlotIndex>],
) -> Option<usize> {
    recorded
        .iter()
        .map(|other| {
            candidate
                .iter()
                .filter(|&(session, slot)| other.get(session) != Some(slot))
                .count()
        })
        .min()
}
