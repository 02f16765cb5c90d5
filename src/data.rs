use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// Type aliases for clarity
pub type TeacherId = u32;
pub type GradeId = u32;
pub type SubjectId = u32;
pub type ClassId = u32;
pub type SessionId = u32;
pub type SlotIndex = u8;

pub const NUM_DAYS: u8 = 5;
pub const BLOCKS_PER_DAY: u8 = 5;
pub const NUM_SLOTS: u8 = NUM_DAYS * BLOCKS_PER_DAY;

/// Linearizes a (day, block) pair into a slot index 0..25.
/// Days run 0..=4, blocks 1..=5.
pub fn slot_index(day: u8, block: u8) -> Option<SlotIndex> {
    if day < NUM_DAYS && (1..=BLOCKS_PER_DAY).contains(&block) {
        Some(day * BLOCKS_PER_DAY + (block - 1))
    } else {
        None
    }
}

pub fn slot_day(slot: SlotIndex) -> u8 {
    slot / BLOCKS_PER_DAY
}

pub fn slot_block(slot: SlotIndex) -> u8 {
    slot % BLOCKS_PER_DAY + 1
}

/// The five slot indices of one weekday, in block order.
pub fn day_slots(day: u8) -> impl Iterator<Item = SlotIndex> {
    day * BLOCKS_PER_DAY..(day + 1) * BLOCKS_PER_DAY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Employment {
    FullTime,
    PartTime,
}

/// A teacher as supplied by the caller; immutable for the run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    pub employment: Employment,
    #[serde(default = "default_true")]
    pub study_hall_eligible: bool,
    #[serde(default)]
    pub study_hall_opt_out: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: GradeId,
    pub name: String,
    /// Tie-break key for deterministic iteration (study halls, grids).
    #[serde(default)]
    pub ordering: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

/// Availability restriction attached to a class. All fields optional;
/// an empty restriction leaves the full 25-slot universe open.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    /// Days (0..=4) the class may meet on. `None` means all days.
    #[serde(default)]
    pub allowed_days: Option<Vec<u8>>,
    /// Blocks (1..=5) the class may occupy. `None` means all blocks.
    #[serde(default)]
    pub allowed_blocks: Option<Vec<u8>>,
    /// (day, block) pairs pinning individual meetings to exact slots.
    #[serde(default)]
    pub fixed_slots: Vec<(u8, u8)>,
}

/// A class to be scheduled: one teacher meeting one or more grades
/// `meetings_per_week` times.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSpec {
    pub id: ClassId,
    pub teacher_id: TeacherId,
    pub grade_ids: Vec<GradeId>,
    pub subject_id: SubjectId,
    pub meetings_per_week: u32,
    #[serde(default)]
    pub elective: bool,
    #[serde(default)]
    pub co_taught: bool,
    #[serde(default)]
    pub restriction: Restriction,
}

/// Soft/medium rule configuration. Hard rules (teacher exclusivity,
/// grade exclusivity, availability, fixed slots, co-taught colocation,
/// subject/day dedup) are always active and carry no configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    /// Grades that receive one supervised study hall per weekday.
    #[serde(default)]
    pub study_hall_grades: Vec<GradeId>,
    #[serde(default = "default_true")]
    pub allow_full_time: bool,
    #[serde(default = "default_true")]
    pub allow_part_time: bool,
    /// Objective weight penalizing idle gaps inside a teacher's day.
    #[serde(default = "default_back_to_back_weight")]
    pub back_to_back_weight: f64,
    /// Objective weight penalizing overloaded teacher days.
    #[serde(default = "default_spread_weight")]
    pub spread_weight: f64,
}

fn default_true() -> bool {
    true
}

fn default_back_to_back_weight() -> f64 {
    0.5
}

fn default_spread_weight() -> f64 {
    0.25
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            study_hall_grades: Vec::new(),
            allow_full_time: true,
            allow_part_time: true,
            back_to_back_weight: default_back_to_back_weight(),
            spread_weight: default_spread_weight(),
        }
    }
}

impl RuleConfig {
    /// Validates the configuration at load time. Weights must be finite
    /// and non-negative. At least one supervisor category must remain
    /// allowed; disabling both falls back to full-time with a warning.
    pub fn validated(mut self) -> Result<Self, EngineError> {
        if !self.back_to_back_weight.is_finite() || self.back_to_back_weight < 0.0 {
            return Err(EngineError::MalformedEntity(format!(
                "ruleConfig: backToBackWeight must be finite and non-negative, got {}",
                self.back_to_back_weight
            )));
        }
        if !self.spread_weight.is_finite() || self.spread_weight < 0.0 {
            return Err(EngineError::MalformedEntity(format!(
                "ruleConfig: spreadWeight must be finite and non-negative, got {}",
                self.spread_weight
            )));
        }
        if !self.allow_full_time && !self.allow_part_time {
            warn!("ruleConfig disables both supervisor categories; re-enabling full-time");
            self.allow_full_time = true;
        }
        Ok(self)
    }

    pub fn allows(&self, employment: Employment) -> bool {
        match employment {
            Employment::FullTime => self.allow_full_time,
            Employment::PartTime => self.allow_part_time,
        }
    }
}

/// The complete input for one generation run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableInput {
    pub teachers: Vec<Teacher>,
    pub grades: Vec<Grade>,
    pub subjects: Vec<Subject>,
    pub classes: Vec<ClassSpec>,
    #[serde(default)]
    pub rules: RuleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    /// Distinct schedules desired.
    #[serde(default = "default_num_options")]
    pub num_options: u32,
    /// Attempt budget across all options.
    #[serde(default = "default_num_attempts")]
    pub num_attempts: u32,
    /// Per-attempt solver wall-clock budget, seconds.
    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: f64,
}

fn default_num_options() -> u32 {
    3
}

fn default_num_attempts() -> u32 {
    50
}

fn default_time_budget_secs() -> f64 {
    10.0
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            num_options: default_num_options(),
            num_attempts: default_num_attempts(),
            time_budget_secs: default_time_budget_secs(),
        }
    }
}

/// One cell of a teacher's weekly grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TeacherCell {
    #[serde(rename_all = "camelCase")]
    Class {
        class_id: ClassId,
        subject_id: SubjectId,
        grade_ids: Vec<GradeId>,
    },
    #[serde(rename_all = "camelCase")]
    StudyHall { grade_id: GradeId },
}

/// One entry of a grade's weekly grid cell. Coinciding electives produce
/// several entries in the same cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GradeCell {
    #[serde(rename_all = "camelCase")]
    Class {
        class_id: ClassId,
        subject_id: SubjectId,
        teacher_id: TeacherId,
        elective: bool,
    },
    #[serde(rename_all = "camelCase")]
    StudyHall { teacher_id: TeacherId },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherGrid {
    pub teacher_id: TeacherId,
    /// 25 cells, slot order.
    pub cells: Vec<Option<TeacherCell>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeGrid {
    pub grade_id: GradeId,
    /// 25 cells, slot order.
    pub cells: Vec<Vec<GradeCell>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyHallPlacement {
    pub grade_id: GradeId,
    pub teacher_id: TeacherId,
    pub day: u8,
    pub block: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLoad {
    pub teacher_id: TeacherId,
    pub employment: Employment,
    pub sessions_assigned: u32,
    pub study_halls_assigned: u32,
}

/// One fully assembled schedule handed back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOption {
    pub label: String,
    pub teacher_grids: Vec<TeacherGrid>,
    pub grade_grids: Vec<GradeGrid>,
    pub study_halls: Vec<StudyHallPlacement>,
    pub teacher_stats: Vec<TeacherLoad>,
    /// Teacher/day pairs with two or more consecutive open blocks
    /// between that day's first and last commitment.
    pub back_to_back_issues: u32,
    pub study_halls_placed: u32,
    pub study_hall_target: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Ok,
    Infeasible,
    Error,
}

/// The final output of a generation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub status: GenerationStatus,
    /// Best first.
    pub options: Vec<ScheduleOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerationResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: GenerationStatus::Error,
            options: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn infeasible(message: impl Into<String>) -> Self {
        Self {
            status: GenerationStatus::Infeasible,
            options: Vec::new(),
            message: Some(message.into()),
        }
    }
}
