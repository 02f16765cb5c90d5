use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use log::debug;

use crate::data::{
    Grade, GradeId, NUM_DAYS, RuleConfig, SessionId, SlotIndex, StudyHallPlacement, Teacher,
    TeacherId, TimetableInput, day_slots, slot_block,
};
use crate::normalize::Session;

/// Weekly supervision cap per teacher.
pub const SUPERVISION_CAP: u32 = 3;

/// Assigns supervised study halls into slots left open by the class
/// assignment: one per configured grade per weekday where possible.
///
/// Runs after the class assignment is fixed and never changes it.
/// Selection is deterministic: grades by (ordering key, id), days in
/// week order, blocks lowest-first, supervisors by teacher id. A
/// grade-day with no open slot or no free eligible supervisor is left
/// open and simply counts against the target.
pub fn place_study_halls(
    input: &TimetableInput,
    sessions: &[Session],
    assignment: &BTreeMap<SessionId, SlotIndex>,
    rules: &RuleConfig,
) -> Vec<StudyHallPlacement> {
    if rules.study_hall_grades.is_empty() {
        return Vec::new();
    }

    let mut teacher_busy: HashMap<TeacherId, [bool; 25]> = HashMap::new();
    let mut grade_busy: HashMap<GradeId, [bool; 25]> = HashMap::new();
    for session in sessions {
        let slot = assignment[&session.id] as usize;
        teacher_busy.entry(session.teacher_id).or_insert([false; 25])[slot] = true;
        for &grade_id in &session.grade_ids {
            grade_busy.entry(grade_id).or_insert([false; 25])[slot] = true;
        }
    }

    let grades: Vec<&Grade> = input
        .grades
        .iter()
        .filter(|g| rules.study_hall_grades.contains(&g.id))
        .sorted_by_key(|g| (g.ordering, g.id))
        .collect();
    let supervisors: Vec<&Teacher> = input
        .teachers
        .iter()
        .filter(|t| t.study_hall_eligible && !t.study_hall_opt_out && rules.allows(t.employment))
        .sorted_by_key(|t| t.id)
        .collect();

    let mut supervision_count: HashMap<TeacherId, u32> = HashMap::new();
    let mut placements = Vec::new();

    for grade in &grades {
        for day in 0..NUM_DAYS {
            let open_slots: Vec<SlotIndex> = day_slots(day)
                .filter(|&slot| {
                    !grade_busy
                        .get(&grade.id)
                        .is_some_and(|busy| busy[slot as usize])
                })
                .collect();
            let mut placed = false;
            for slot in open_slots {
                let free = supervisors.iter().find(|t| {
                    let busy = teacher_busy
                        .get(&t.id)
                        .is_some_and(|grid| grid[slot as usize]);
                    !busy && supervision_count.get(&t.id).copied().unwrap_or(0) < SUPERVISION_CAP
                });
                if let Some(teacher) = free {
                    placements.push(StudyHallPlacement {
                        grade_id: grade.id,
                        teacher_id: teacher.id,
                        day,
                        block: slot_block(slot),
                    });
                    teacher_busy.entry(teacher.id).or_insert([false; 25])[slot as usize] = true;
                    grade_busy.entry(grade.id).or_insert([false; 25])[slot as usize] = true;
                    *supervision_count.entry(teacher.id).or_insert(0) += 1;
                    placed = true;
                    break;
                }
            }
            if !placed {
                debug!(
                    "no study hall for grade {} on day {day}: no open slot with a free supervisor",
                    grade.id
                );
            }
        }
    }
    placements
}

/// Study halls a full placement pass aims for: one per configured
/// grade (that exists) per weekday.
pub fn target(input: &TimetableInput, rules: &RuleConfig) -> u32 {
    let configured = input
        .grades
        .iter()
        .filter(|g| rules.study_hall_grades.contains(&g.id))
        .count() as u32;
    configured * u32::from(NUM_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClassSpec, Employment, Restriction, Subject, TimetableInput};
    use crate::domain::compute_domains;
    use crate::normalize::build_sessions;

    fn teacher(id: TeacherId, employment: Employment) -> Teacher {
        Teacher {
            id,
            name: format!("T{id}"),
            employment,
            study_hall_eligible: true,
            study_hall_opt_out: false,
        }
    }

    fn grade(id: GradeId, ordering: u32) -> Grade {
        Grade {
            id,
            name: format!("G{id}"),
            ordering,
        }
    }

    /// One class, teacher 1, grade 10, fixed to monday block 1.
    fn fixture(rules: RuleConfig) -> (TimetableInput, Vec<Session>, BTreeMap<SessionId, SlotIndex>)
    {
        let input = TimetableInput {
            teachers: vec![
                teacher(1, Employment::FullTime),
                teacher(2, Employment::PartTime),
            ],
            grades: vec![grade(10, 0), grade(11, 1)],
            subjects: vec![Subject {
                id: 20,
                name: "Math".to_string(),
            }],
            classes: vec![ClassSpec {
                id: 1,
                teacher_id: 1,
                grade_ids: vec![10],
                subject_id: 20,
                meetings_per_week: 1,
                elective: false,
                co_taught: false,
                restriction: Restriction {
                    fixed_slots: vec![(0, 1)],
                    ..Restriction::default()
                },
            }],
            rules,
        };
        let mut sessions = build_sessions(&input).unwrap();
        compute_domains(&mut sessions).unwrap();
        let assignment = sessions.iter().map(|s| (s.id, s.domain[0])).collect();
        (input, sessions, assignment)
    }

    fn rules_for(grades: Vec<GradeId>) -> RuleConfig {
        RuleConfig {
            study_hall_grades: grades,
            ..RuleConfig::default()
        }
    }

    #[test]
    fn fills_one_hall_per_grade_day() {
        let (input, sessions, assignment) = fixture(rules_for(vec![10]));
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        assert_eq!(placements.len(), 5);
        let days: Vec<u8> = placements.iter().map(|p| p.day).collect();
        assert_eq!(days, vec![0, 1, 2, 3, 4]);
        assert_eq!(target(&input, &input.rules), 5);
    }

    #[test]
    fn skips_slots_the_grade_already_occupies() {
        let (input, sessions, assignment) = fixture(rules_for(vec![10]));
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        // monday block 1 is taken by the fixed class, so the hall lands
        // on block 2; teacher 1 teaches then, so teacher 2 at block 1
        // would clash with the grade, not the teacher
        let monday = &placements[0];
        assert_eq!((monday.day, monday.block), (0, 2));
    }

    #[test]
    fn lowest_teacher_id_wins_when_both_free() {
        let (input, sessions, assignment) = fixture(rules_for(vec![10]));
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        // tuesday: both teachers free at block 1, teacher 1 selected
        assert_eq!(placements[1].teacher_id, 1);
    }

    #[test]
    fn honors_supervision_cap() {
        let (input, sessions, assignment) = fixture(rules_for(vec![10, 11]));
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        let mut per_teacher: HashMap<TeacherId, u32> = HashMap::new();
        for p in &placements {
            *per_teacher.entry(p.teacher_id).or_insert(0) += 1;
        }
        assert!(per_teacher.values().all(|&n| n <= SUPERVISION_CAP));
        // two teachers, cap 3 each: at most 6 of the 10 targeted halls
        assert_eq!(placements.len(), 6);
    }

    #[test]
    fn part_time_excluded_when_configured() {
        let mut rules = rules_for(vec![10]);
        rules.allow_part_time = false;
        let (input, sessions, assignment) = fixture(rules);
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        assert!(placements.iter().all(|p| p.teacher_id == 1));
    }

    #[test]
    fn opt_out_is_honored() {
        let rules = rules_for(vec![10]);
        let (mut input, sessions, assignment) = fixture(rules);
        input.teachers[0].study_hall_opt_out = true;
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        assert!(placements.iter().all(|p| p.teacher_id == 2));
    }

    #[test]
    fn grades_ordered_by_ordering_key() {
        let (mut input, sessions, assignment) = fixture(rules_for(vec![10, 11]));
        input.grades[0].ordering = 5; // grade 11 now sorts first
        let placements = place_study_halls(&input, &sessions, &assignment, &input.rules);
        assert_eq!(placements[0].grade_id, 11);
    }
}
