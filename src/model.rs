use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::{
    GradeId, NUM_DAYS, NUM_SLOTS, RuleConfig, SessionId, SlotIndex, SubjectId, TeacherId,
    slot_index,
};
use crate::normalize::Session;

/// Sessions a teacher may hold on one day beyond which the spread
/// penalty starts accruing.
const SPREAD_COMFORT_LOAD: f64 = 3.0;

/// Idle-gap patterns inside a teacher's day: (first block, last block)
/// pairs whose strictly-between blocks, when all open while both ends
/// are taught, form two or more consecutive open blocks.
const GAP_PATTERNS: [(u8, u8); 3] = [(1, 4), (2, 5), (1, 5)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    /// Continuous, lower-bounded at zero.
    NonNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRole {
    /// Decision variable: session placed at slot.
    Place { session: SessionId, slot: SlotIndex },
    /// Soft indicator: an idle gap inside teacher's day.
    Gap { teacher: TeacherId, day: u8 },
    /// Soft measure: teacher's day load above the comfort level.
    Overload { teacher: TeacherId, day: u8 },
}

#[derive(Debug, Clone)]
pub struct ModelVar {
    pub kind: VarKind,
    pub role: VarRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Eq,
    Le,
    Ge,
}

/// Which hard or soft rule a row encodes; kept for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTag {
    Assign,
    TeacherSlot,
    GradeSlot,
    GradePair,
    SubjectDay,
    CoLocate,
    GapLink,
    SpreadLink,
}

#[derive(Debug, Clone)]
pub struct Row {
    pub tag: RowTag,
    pub terms: Vec<(usize, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

/// A solver-agnostic assignment-problem description: binary placement
/// variables, linear constraint rows, and a minimized objective.
#[derive(Debug, Clone)]
pub struct Model {
    pub vars: Vec<ModelVar>,
    pub rows: Vec<Row>,
    /// One coefficient per variable, minimized.
    pub objective: Vec<f64>,
    num_place_vars: usize,
}

impl Model {
    /// Re-derives the pseudo-random placement coefficients from a new
    /// seed, leaving constraints and soft-term weights untouched. All
    /// hard constraints ignore the objective, so different seeds steer
    /// the solver toward different corners of the feasible region.
    pub fn reseed_objective(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for coef in self.objective.iter_mut().take(self.num_place_vars) {
            *coef = rng.random_range(1.0..2.0);
        }
    }

    pub fn place_vars(&self) -> impl Iterator<Item = (usize, SessionId, SlotIndex)> + '_ {
        self.vars
            .iter()
            .enumerate()
            .filter_map(|(idx, var)| match var.role {
                VarRole::Place { session, slot } => Some((idx, session, slot)),
                _ => None,
            })
    }
}

/// Builds the assignment model for one run. The objective starts as all
/// zeros; the orchestrator reseeds it before every attempt.
pub fn build_model(sessions: &[Session], rules: &RuleConfig) -> Model {
    let mut builder = Builder::new(sessions);
    builder.declare_place_vars();
    builder.add_assignment_rows();
    builder.add_teacher_exclusivity();
    builder.add_grade_exclusivity();
    builder.add_subject_day_dedup();
    builder.add_co_taught_equality();
    builder.add_gap_penalties(rules.back_to_back_weight);
    builder.add_spread_penalties(rules.spread_weight);
    builder.finish()
}

struct Builder<'a> {
    sessions: &'a [Session],
    vars: Vec<ModelVar>,
    rows: Vec<Row>,
    objective: Vec<f64>,
    /// (session, slot) -> variable index.
    var_of: HashMap<(SessionId, SlotIndex), usize>,
    /// session -> its variable indices, domain order.
    session_vars: HashMap<SessionId, Vec<usize>>,
    num_place_vars: usize,
    /// session -> lowest session id of its co-group (itself if unpaired).
    rep_of: HashMap<SessionId, SessionId>,
}

impl<'a> Builder<'a> {
    fn new(sessions: &'a [Session]) -> Self {
        let mut group_min: HashMap<u32, SessionId> = HashMap::new();
        for session in sessions {
            if let Some(group) = session.co_group {
                group_min
                    .entry(group)
                    .and_modify(|min| *min = (*min).min(session.id))
                    .or_insert(session.id);
            }
        }
        let rep_of = sessions
            .iter()
            .map(|s| {
                let rep = s.co_group.map_or(s.id, |g| group_min[&g]);
                (s.id, rep)
            })
            .collect();
        Self {
            sessions,
            vars: Vec::new(),
            rows: Vec::new(),
            objective: Vec::new(),
            var_of: HashMap::new(),
            session_vars: HashMap::new(),
            num_place_vars: 0,
            rep_of,
        }
    }

    /// A session represents its co-group in grade and subject rows so a
    /// co-taught meeting is counted once, not twice.
    fn is_rep(&self, session: &Session) -> bool {
        self.rep_of[&session.id] == session.id
    }

    fn declare_place_vars(&mut self) {
        for session in self.sessions {
            let mut indices = Vec::with_capacity(session.domain.len());
            for &slot in &session.domain {
                let idx = self.vars.len();
                self.vars.push(ModelVar {
                    kind: VarKind::Binary,
                    role: VarRole::Place {
                        session: session.id,
                        slot,
                    },
                });
                self.objective.push(0.0);
                self.var_of.insert((session.id, slot), idx);
                indices.push(idx);
            }
            self.session_vars.insert(session.id, indices);
        }
        self.num_place_vars = self.vars.len();
        debug!(
            "declared {} placement variables for {} sessions",
            self.num_place_vars,
            self.sessions.len()
        );
    }

    fn push_row(&mut self, tag: RowTag, terms: Vec<(usize, f64)>, sense: Sense, rhs: f64) {
        self.rows.push(Row {
            tag,
            terms,
            sense,
            rhs,
        });
    }

    fn add_assignment_rows(&mut self) {
        for session in self.sessions {
            let terms = self.session_vars[&session.id]
                .iter()
                .map(|&idx| (idx, 1.0))
                .collect();
            self.push_row(RowTag::Assign, terms, Sense::Eq, 1.0);
        }
    }

    fn teacher_sessions(&self) -> HashMap<TeacherId, Vec<&'a Session>> {
        self.sessions
            .iter()
            .map(|s| (s.teacher_id, s))
            .into_group_map()
    }

    /// Variables of the given sessions at one slot, one term each.
    fn terms_at_slot(&self, sessions: &[&Session], slot: SlotIndex) -> Vec<(usize, f64)> {
        sessions
            .iter()
            .filter_map(|s| self.var_of.get(&(s.id, slot)).map(|&idx| (idx, 1.0)))
            .collect()
    }

    fn add_teacher_exclusivity(&mut self) {
        for (_, sessions) in self.teacher_sessions().into_iter().sorted_by_key(|(t, _)| *t) {
            for slot in 0..NUM_SLOTS {
                let terms = self.terms_at_slot(&sessions, slot);
                if terms.len() >= 2 {
                    self.push_row(RowTag::TeacherSlot, terms, Sense::Le, 1.0);
                }
            }
        }
    }

    fn grade_sessions(&self) -> HashMap<GradeId, Vec<&'a Session>> {
        self.sessions
            .iter()
            .flat_map(|s| s.grade_ids.iter().map(move |&g| (g, s)))
            .into_group_map()
    }

    fn add_grade_exclusivity(&mut self) {
        let by_grade = self.grade_sessions();

        // at most one non-elective meeting of a grade per slot
        for (_, sessions) in by_grade.iter().sorted_by_key(|(g, _)| **g) {
            let non_elective: Vec<&Session> = sessions
                .iter()
                .copied()
                .filter(|s| !s.elective && self.is_rep(s))
                .collect();
            for slot in 0..NUM_SLOTS {
                let terms = self.terms_at_slot(&non_elective, slot);
                if terms.len() >= 2 {
                    self.push_row(RowTag::GradeSlot, terms, Sense::Le, 1.0);
                }
            }
        }

        // a non-elective meeting never coincides with an elective of an
        // overlapping grade; elective-vs-elective pairs are legal and
        // deliberately unconstrained
        let mut pairs: HashSet<(SessionId, SessionId)> = HashSet::new();
        for (_, sessions) in by_grade.iter().sorted_by_key(|(g, _)| **g) {
            for (a, b) in sessions.iter().tuple_combinations() {
                if a.elective == b.elective {
                    continue;
                }
                if !self.is_rep(a) || !self.is_rep(b) {
                    continue;
                }
                if a.co_group.is_some() && a.co_group == b.co_group {
                    continue;
                }
                pairs.insert((a.id.min(b.id), a.id.max(b.id)));
            }
        }
        for (a, b) in pairs.into_iter().sorted() {
            for slot in 0..NUM_SLOTS {
                if let (Some(&va), Some(&vb)) =
                    (self.var_of.get(&(a, slot)), self.var_of.get(&(b, slot)))
                {
                    self.push_row(
                        RowTag::GradePair,
                        vec![(va, 1.0), (vb, 1.0)],
                        Sense::Le,
                        1.0,
                    );
                }
            }
        }
    }

    fn add_subject_day_dedup(&mut self) {
        let groups: HashMap<(GradeId, SubjectId), Vec<&Session>> = self
            .sessions
            .iter()
            .filter(|s| self.is_rep(s))
            .flat_map(|s| s.grade_ids.iter().map(move |&g| ((g, s.subject_id), s)))
            .into_group_map();
        for (_, sessions) in groups.into_iter().sorted_by_key(|(k, _)| *k) {
            for day in 0..NUM_DAYS {
                let terms: Vec<(usize, f64)> = crate::data::day_slots(day)
                    .flat_map(|slot| self.terms_at_slot(&sessions, slot))
                    .collect();
                if terms.len() >= 2 {
                    self.push_row(RowTag::SubjectDay, terms, Sense::Le, 1.0);
                }
            }
        }
    }

    fn add_co_taught_equality(&mut self) {
        let by_group: HashMap<u32, Vec<&Session>> = self
            .sessions
            .iter()
            .filter_map(|s| s.co_group.map(|g| (g, s)))
            .into_group_map();
        for (_, members) in by_group.into_iter().sorted_by_key(|(g, _)| *g) {
            debug_assert_eq!(members.len(), 2);
            let (a, b) = (members[0], members[1]);
            // domains were intersected, so both sides exist per slot
            for &slot in &a.domain {
                let va = self.var_of[&(a.id, slot)];
                let vb = self.var_of[&(b.id, slot)];
                self.push_row(
                    RowTag::CoLocate,
                    vec![(va, 1.0), (vb, -1.0)],
                    Sense::Eq,
                    0.0,
                );
            }
        }
    }

    /// Penalizes two-plus consecutive open blocks between a teacher's
    /// first and last commitment of a day. For each gap pattern whose
    /// end blocks are taught while every block between them is open, a
    /// binary indicator is forced to one and priced at the configured
    /// weight.
    fn add_gap_penalties(&mut self, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        for (teacher, sessions) in
            self.teacher_sessions().into_iter().sorted_by_key(|(t, _)| *t)
        {
            for day in 0..NUM_DAYS {
                for (first, last) in GAP_PATTERNS {
                    let occ_first =
                        self.terms_at_slot(&sessions, slot_index(day, first).unwrap());
                    let occ_last = self.terms_at_slot(&sessions, slot_index(day, last).unwrap());
                    if occ_first.is_empty() || occ_last.is_empty() {
                        continue;
                    }
                    let gap_idx = self.vars.len();
                    self.vars.push(ModelVar {
                        kind: VarKind::Binary,
                        role: VarRole::Gap { teacher, day },
                    });
                    self.objective.push(weight);

                    // gap >= occ(first) + occ(last) - sum(middles) - 1
                    let mut terms = vec![(gap_idx, 1.0)];
                    for (idx, _) in occ_first.iter().chain(occ_last.iter()) {
                        terms.push((*idx, -1.0));
                    }
                    for block in (first + 1)..last {
                        for (idx, _) in
                            self.terms_at_slot(&sessions, slot_index(day, block).unwrap())
                        {
                            terms.push((idx, 1.0));
                        }
                    }
                    self.push_row(RowTag::GapLink, terms, Sense::Ge, -1.0);
                }
            }
        }
    }

    /// Penalizes piling more than `SPREAD_COMFORT_LOAD` sessions of one
    /// teacher into a single day, nudging loads to spread over the week.
    fn add_spread_penalties(&mut self, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        for (teacher, sessions) in
            self.teacher_sessions().into_iter().sorted_by_key(|(t, _)| *t)
        {
            for day in 0..NUM_DAYS {
                let load: Vec<(usize, f64)> = crate::data::day_slots(day)
                    .flat_map(|slot| self.terms_at_slot(&sessions, slot))
                    .collect();
                if load.len() as f64 <= SPREAD_COMFORT_LOAD {
                    continue;
                }
                let over_idx = self.vars.len();
                self.vars.push(ModelVar {
                    kind: VarKind::NonNegative,
                    role: VarRole::Overload { teacher, day },
                });
                self.objective.push(weight);

                // overload >= day load - comfort level
                let mut terms = vec![(over_idx, 1.0)];
                for (idx, _) in load {
                    terms.push((idx, -1.0));
                }
                self.push_row(RowTag::SpreadLink, terms, Sense::Ge, -SPREAD_COMFORT_LOAD);
            }
        }
    }

    fn finish(self) -> Model {
        debug!(
            "model: {} variables ({} placement), {} rows",
            self.vars.len(),
            self.num_place_vars,
            self.rows.len()
        );
        Model {
            vars: self.vars,
            rows: self.rows,
            objective: self.objective,
            num_place_vars: self.num_place_vars,
        }
    }
}
