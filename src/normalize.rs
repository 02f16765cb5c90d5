use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::{debug, warn};

use crate::data::{
    ClassId, ClassSpec, GradeId, SessionId, SlotIndex, SubjectId, TeacherId, TimetableInput,
};
use crate::error::EngineError;

pub type CoGroupId = u32;

/// One weekly meeting instance of a class; the atomic unit placed into
/// a slot. A class with N meetings per week yields N sessions.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub class_id: ClassId,
    pub teacher_id: TeacherId,
    pub grade_ids: Vec<GradeId>,
    pub subject_id: SubjectId,
    pub elective: bool,
    /// (day, block) this meeting is pinned to, if any.
    pub fixed: Option<(u8, u8)>,
    pub allowed_days: Option<Vec<u8>>,
    pub allowed_blocks: Option<Vec<u8>>,
    pub co_group: Option<CoGroupId>,
    /// Feasible slots, sorted ascending. Filled by the domain calculator.
    pub domain: Vec<SlotIndex>,
}

/// Expands class specs into sessions, validating every id reference and
/// detecting co-taught pairs.
///
/// Co-taught detection groups flagged classes by (subject, grade set);
/// a group of exactly two classes with distinct teachers is paired
/// meeting-by-meeting under shared co-group ids. A flagged class with
/// no partner schedules independently. Groups of three or more are
/// rejected, as is a pair with mismatched meeting counts.
pub fn build_sessions(input: &TimetableInput) -> Result<Vec<Session>, EngineError> {
    if input.classes.is_empty() {
        return Err(EngineError::MalformedEntity(
            "no classes to schedule".to_string(),
        ));
    }

    let teacher_ids = unique_ids(input.teachers.iter().map(|t| t.id), "teacher")?;
    let grade_ids = unique_ids(input.grades.iter().map(|g| g.id), "grade")?;
    let subject_ids = unique_ids(input.subjects.iter().map(|s| s.id), "subject")?;
    unique_ids(input.classes.iter().map(|c| c.id), "class")?;

    for class in &input.classes {
        validate_class(class, &teacher_ids, &grade_ids, &subject_ids)?;
    }

    let co_map = pair_co_taught(&input.classes)?;

    let mut sessions = Vec::new();
    let mut next_id: SessionId = 0;
    for class in &input.classes {
        for meeting in 0..class.meetings_per_week {
            sessions.push(Session {
                id: next_id,
                class_id: class.id,
                teacher_id: class.teacher_id,
                grade_ids: class.grade_ids.clone(),
                subject_id: class.subject_id,
                elective: class.elective,
                fixed: class.restriction.fixed_slots.get(meeting as usize).copied(),
                allowed_days: class.restriction.allowed_days.clone(),
                allowed_blocks: class.restriction.allowed_blocks.clone(),
                co_group: co_map.get(&(class.id, meeting)).copied(),
                domain: Vec::new(),
            });
            next_id += 1;
        }
    }
    debug!(
        "normalized {} classes into {} sessions ({} co-taught pairs)",
        input.classes.len(),
        sessions.len(),
        co_map.len() / 2
    );
    Ok(sessions)
}

fn unique_ids(
    ids: impl Iterator<Item = u32>,
    kind: &str,
) -> Result<HashSet<u32>, EngineError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EngineError::MalformedEntity(format!(
                "duplicate {kind} id {id}"
            )));
        }
    }
    Ok(seen)
}

fn validate_class(
    class: &ClassSpec,
    teacher_ids: &HashSet<TeacherId>,
    grade_ids: &HashSet<GradeId>,
    subject_ids: &HashSet<SubjectId>,
) -> Result<(), EngineError> {
    if class.meetings_per_week == 0 {
        return Err(EngineError::MalformedEntity(format!(
            "class {} has zero meetings per week",
            class.id
        )));
    }
    if class.grade_ids.is_empty() {
        return Err(EngineError::MalformedEntity(format!(
            "class {} has no grades",
            class.id
        )));
    }
    if !teacher_ids.contains(&class.teacher_id) {
        return Err(EngineError::MalformedEntity(format!(
            "class {} references unknown teacher {}",
            class.id, class.teacher_id
        )));
    }
    for grade_id in &class.grade_ids {
        if !grade_ids.contains(grade_id) {
            return Err(EngineError::MalformedEntity(format!(
                "class {} references unknown grade {}",
                class.id, grade_id
            )));
        }
    }
    if !subject_ids.contains(&class.subject_id) {
        return Err(EngineError::MalformedEntity(format!(
            "class {} references unknown subject {}",
            class.id, class.subject_id
        )));
    }
    if class.restriction.fixed_slots.len() as u32 > class.meetings_per_week {
        return Err(EngineError::MalformedEntity(format!(
            "class {} fixes {} slots but meets only {} times per week",
            class.id,
            class.restriction.fixed_slots.len(),
            class.meetings_per_week
        )));
    }
    Ok(())
}

/// Maps (class id, meeting index) to a co-group id for every paired
/// co-taught meeting.
fn pair_co_taught(
    classes: &[ClassSpec],
) -> Result<HashMap<(ClassId, u32), CoGroupId>, EngineError> {
    let groups: HashMap<(SubjectId, Vec<GradeId>), Vec<&ClassSpec>> = classes
        .iter()
        .filter(|c| c.co_taught)
        .map(|c| {
            let key = (c.subject_id, c.grade_ids.iter().copied().sorted().collect());
            (key, c)
        })
        .into_group_map();

    let mut co_map = HashMap::new();
    let mut next_group: CoGroupId = 0;
    for ((subject_id, _), mut members) in groups.into_iter().sorted_by_key(|(k, _)| k.clone()) {
        match members.len() {
            1 => {
                warn!(
                    "co-taught class {} has no partner; scheduling it independently",
                    members[0].id
                );
            }
            2 => {
                members.sort_by_key(|c| c.id);
                let (a, b) = (members[0], members[1]);
                if a.teacher_id == b.teacher_id {
                    return Err(EngineError::MalformedEntity(format!(
                        "co-taught classes {} and {} share teacher {}",
                        a.id, b.id, a.teacher_id
                    )));
                }
                if a.meetings_per_week != b.meetings_per_week {
                    return Err(EngineError::MalformedEntity(format!(
                        "co-taught classes {} and {} have mismatched meeting counts ({} vs {})",
                        a.id, b.id, a.meetings_per_week, b.meetings_per_week
                    )));
                }
                for meeting in 0..a.meetings_per_week {
                    co_map.insert((a.id, meeting), next_group);
                    co_map.insert((b.id, meeting), next_group);
                    next_group += 1;
                }
            }
            n => {
                return Err(EngineError::MalformedEntity(format!(
                    "{n} co-taught classes share subject {subject_id} and grade set; \
                     only pairs are supported"
                )));
            }
        }
    }
    Ok(co_map)
}
