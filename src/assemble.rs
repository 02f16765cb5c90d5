use std::cmp::Reverse;
use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;

use crate::data::{
    BLOCKS_PER_DAY, GradeCell, GradeGrid, NUM_DAYS, NUM_SLOTS, RuleConfig, ScheduleOption,
    SessionId, SlotIndex, StudyHallPlacement, TeacherCell, TeacherGrid, TeacherLoad, TimetableInput,
    slot_index,
};
use crate::normalize::Session;
use crate::study_hall;

/// Inverts a final assignment (class sessions plus study halls) into
/// per-teacher and per-grade grids and computes the option's soft
/// statistics. The label is assigned later, after ranking.
pub fn build_option(
    input: &TimetableInput,
    sessions: &[Session],
    assignment: &BTreeMap<SessionId, SlotIndex>,
    study_halls: Vec<StudyHallPlacement>,
    rules: &RuleConfig,
) -> ScheduleOption {
    let mut teacher_grids: Vec<TeacherGrid> = input
        .teachers
        .iter()
        .sorted_by_key(|t| t.id)
        .map(|t| TeacherGrid {
            teacher_id: t.id,
            cells: vec![None; NUM_SLOTS as usize],
        })
        .collect();
    let mut grade_grids: Vec<GradeGrid> = input
        .grades
        .iter()
        .sorted_by_key(|g| (g.ordering, g.id))
        .map(|g| GradeGrid {
            grade_id: g.id,
            cells: vec![Vec::new(); NUM_SLOTS as usize],
        })
        .collect();

    for session in sessions {
        let slot = assignment[&session.id] as usize;
        if let Some(grid) = teacher_grids
            .iter_mut()
            .find(|g| g.teacher_id == session.teacher_id)
        {
            grid.cells[slot] = Some(TeacherCell::Class {
                class_id: session.class_id,
                subject_id: session.subject_id,
                grade_ids: session.grade_ids.clone(),
            });
        }
        for grid in grade_grids
            .iter_mut()
            .filter(|g| session.grade_ids.contains(&g.grade_id))
        {
            grid.cells[slot].push(GradeCell::Class {
                class_id: session.class_id,
                subject_id: session.subject_id,
                teacher_id: session.teacher_id,
                elective: session.elective,
            });
        }
    }

    for hall in &study_halls {
        let slot = slot_index(hall.day, hall.block).expect("placer emits valid slots") as usize;
        if let Some(grid) = teacher_grids
            .iter_mut()
            .find(|g| g.teacher_id == hall.teacher_id)
        {
            grid.cells[slot] = Some(TeacherCell::StudyHall {
                grade_id: hall.grade_id,
            });
        }
        if let Some(grid) = grade_grids
            .iter_mut()
            .find(|g| g.grade_id == hall.grade_id)
        {
            grid.cells[slot].push(GradeCell::StudyHall {
                teacher_id: hall.teacher_id,
            });
        }
    }

    let teacher_stats = input
        .teachers
        .iter()
        .sorted_by_key(|t| t.id)
        .map(|t| TeacherLoad {
            teacher_id: t.id,
            employment: t.employment,
            sessions_assigned: sessions.iter().filter(|s| s.teacher_id == t.id).count() as u32,
            study_halls_assigned: study_halls
                .iter()
                .filter(|h| h.teacher_id == t.id)
                .count() as u32,
        })
        .collect();

    let back_to_back_issues = count_back_to_back_issues(&teacher_grids);
    let study_halls_placed = study_halls.len() as u32;
    let study_hall_target = study_hall::target(input, rules);
    debug!(
        "assembled option: {back_to_back_issues} back-to-back issues, \
         {study_halls_placed}/{study_hall_target} study halls"
    );

    ScheduleOption {
        label: String::new(),
        teacher_grids,
        grade_grids,
        study_halls,
        teacher_stats,
        back_to_back_issues,
        study_halls_placed,
        study_hall_target,
    }
}

/// Counts teacher/day pairs with two or more consecutive open blocks
/// between the day's first and last commitment. Leading and trailing
/// open blocks are not gaps; a day counts at most once.
fn count_back_to_back_issues(teacher_grids: &[TeacherGrid]) -> u32 {
    let mut issues = 0;
    for grid in teacher_grids {
        for day in 0..NUM_DAYS {
            let occupied: Vec<u8> = (1..=BLOCKS_PER_DAY)
                .filter(|&block| {
                    let slot = slot_index(day, block).unwrap() as usize;
                    grid.cells[slot].is_some()
                })
                .collect();
            let (Some(&first), Some(&last)) = (occupied.first(), occupied.last()) else {
                continue;
            };
            let mut open_run = 0;
            for block in first..=last {
                if occupied.contains(&block) {
                    open_run = 0;
                } else {
                    open_run += 1;
                    if open_run >= 2 {
                        issues += 1;
                        break;
                    }
                }
            }
        }
    }
    issues
}

/// Ranks options in place (ascending back-to-back issues, then
/// descending study halls placed; recording order breaks ties) and
/// labels them "A", "B", "C", ... in final rank order.
pub fn rank_and_label(options: &mut [ScheduleOption]) {
    options.sort_by_key(|o| (o.back_to_back_issues, Reverse(o.study_halls_placed)));
    for (i, option) in options.iter_mut().enumerate() {
        option.label = char::from(b'A' + (i % 26) as u8).to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TeacherCell;

    fn grid_with(blocks: &[(u8, u8)]) -> TeacherGrid {
        let mut cells = vec![None; NUM_SLOTS as usize];
        for &(day, block) in blocks {
            cells[slot_index(day, block).unwrap() as usize] = Some(TeacherCell::StudyHall {
                grade_id: 0,
            });
        }
        TeacherGrid {
            teacher_id: 1,
            cells,
        }
    }

    #[test]
    fn single_commitment_day_has_no_issue() {
        let grid = grid_with(&[(0, 3)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 0);
    }

    #[test]
    fn adjacent_commitments_have_no_issue() {
        let grid = grid_with(&[(0, 2), (0, 3)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 0);
    }

    #[test]
    fn one_open_block_between_is_no_issue() {
        let grid = grid_with(&[(0, 1), (0, 3)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 0);
    }

    #[test]
    fn two_open_blocks_between_count_once() {
        let grid = grid_with(&[(0, 1), (0, 4)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 1);
    }

    #[test]
    fn three_open_blocks_still_count_once_per_day() {
        let grid = grid_with(&[(0, 1), (0, 5)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 1);
    }

    #[test]
    fn leading_and_trailing_open_blocks_are_not_gaps() {
        let grid = grid_with(&[(0, 4), (0, 5)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 0);
    }

    #[test]
    fn issues_accumulate_across_days() {
        let grid = grid_with(&[(0, 1), (0, 4), (2, 2), (2, 5)]);
        assert_eq!(count_back_to_back_issues(&[grid]), 2);
    }

    fn option_with(back_to_back: u32, halls: u32) -> ScheduleOption {
        ScheduleOption {
            label: String::new(),
            teacher_grids: Vec::new(),
            grade_grids: Vec::new(),
            study_halls: Vec::new(),
            teacher_stats: Vec::new(),
            back_to_back_issues: back_to_back,
            study_halls_placed: halls,
            study_hall_target: 10,
        }
    }

    #[test]
    fn ranking_prefers_fewer_issues_then_more_halls() {
        let mut options = vec![option_with(2, 9), option_with(0, 5), option_with(0, 8)];
        rank_and_label(&mut options);
        let ranked: Vec<(u32, u32, &str)> = options
            .iter()
            .map(|o| (o.back_to_back_issues, o.study_halls_placed, o.label.as_str()))
            .collect();
        assert_eq!(ranked, vec![(0, 8, "A"), (0, 5, "B"), (2, 9, "C")]);
    }

    #[test]
    fn recording_order_breaks_ties() {
        let mut options = vec![option_with(1, 5), option_with(1, 5)];
        options[0].study_halls = vec![StudyHallPlacement {
            grade_id: 1,
            teacher_id: 1,
            day: 0,
            block: 1,
        }];
        rank_and_label(&mut options);
        // the earlier-recorded option keeps rank A
        assert_eq!(options[0].label, "A");
        assert!(!options[0].study_halls.is_empty());
    }
}
