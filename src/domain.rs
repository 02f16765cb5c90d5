use std::collections::HashMap;

use itertools::Itertools;
use log::trace;

use crate::data::{NUM_SLOTS, SlotIndex, slot_block, slot_day, slot_index};
use crate::normalize::{CoGroupId, Session};

/// Computes the feasible slot set of every session in place.
///
/// A session's domain is the 25-slot universe minus slots excluded by
/// its class's day/block restriction; a fixed meeting collapses to its
/// configured slot. Co-taught partners end up with identical domains
/// (the intersection of both members').
///
/// An empty or out-of-range domain makes the whole model infeasible
/// before any solving happens; the returned diagnostic names the class.
pub fn compute_domains(sessions: &mut [Session]) -> Result<(), String> {
    for session in sessions.iter_mut() {
        session.domain = match session.fixed {
            Some((day, block)) => {
                let slot = slot_index(day, block).ok_or_else(|| {
                    format!(
                        "class {} fixes a meeting to out-of-range slot (day {}, block {})",
                        session.class_id, day, block
                    )
                })?;
                vec![slot]
            }
            None => restricted_universe(session),
        };
        if session.domain.is_empty() {
            return Err(format!(
                "class {} has no feasible slots under its day/block restriction",
                session.class_id
            ));
        }
        trace!(
            "session {} (class {}) domain: {} slots",
            session.id,
            session.class_id,
            session.domain.len()
        );
    }
    intersect_co_taught(sessions)
}

fn restricted_universe(session: &Session) -> Vec<SlotIndex> {
    (0..NUM_SLOTS)
        .filter(|&slot| {
            let day_ok = session
                .allowed_days
                .as_ref()
                .is_none_or(|days| days.contains(&slot_day(slot)));
            let block_ok = session
                .allowed_blocks
                .as_ref()
                .is_none_or(|blocks| blocks.contains(&slot_block(slot)));
            day_ok && block_ok
        })
        .collect()
}

fn intersect_co_taught(sessions: &mut [Session]) -> Result<(), String> {
    let mut by_group: HashMap<CoGroupId, Vec<usize>> = HashMap::new();
    for (idx, session) in sessions.iter().enumerate() {
        if let Some(group) = session.co_group {
            by_group.entry(group).or_default().push(idx);
        }
    }
    for (group, members) in by_group.into_iter().sorted_by_key(|(g, _)| *g) {
        // the normalizer only emits pairs
        debug_assert_eq!(members.len(), 2, "co-group {group} is not a pair");
        let [a, b] = [members[0], members[1]];
        let shared: Vec<SlotIndex> = sessions[a]
            .domain
            .iter()
            .copied()
            .filter(|slot| sessions[b].domain.contains(slot))
            .collect();
        if shared.is_empty() {
            return Err(format!(
                "co-taught classes {} and {} have no slot both can meet in",
                sessions[a].class_id, sessions[b].class_id
            ));
        }
        sessions[a].domain = shared.clone();
        sessions[b].domain = shared;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        ClassSpec, Employment, Grade, Restriction, RuleConfig, Subject, Teacher, TimetableInput,
    };
    use crate::normalize::build_sessions;

    fn input_with_classes(classes: Vec<ClassSpec>) -> TimetableInput {
        TimetableInput {
            teachers: vec![
                Teacher {
                    id: 1,
                    name: "T1".to_string(),
                    employment: Employment::FullTime,
                    study_hall_eligible: true,
                    study_hall_opt_out: false,
                },
                Teacher {
                    id: 2,
                    name: "T2".to_string(),
                    employment: Employment::FullTime,
                    study_hall_eligible: true,
                    study_hall_opt_out: false,
                },
            ],
            grades: vec![Grade {
                id: 10,
                name: "7th".to_string(),
                ordering: 0,
            }],
            subjects: vec![Subject {
                id: 20,
                name: "Math".to_string(),
            }],
            classes,
            rules: RuleConfig::default(),
        }
    }

    fn class(id: u32, teacher_id: u32, restriction: Restriction) -> ClassSpec {
        ClassSpec {
            id,
            teacher_id,
            grade_ids: vec![10],
            subject_id: 20,
            meetings_per_week: 1,
            elective: false,
            co_taught: false,
            restriction,
        }
    }

    fn sessions_for(classes: Vec<ClassSpec>) -> Vec<Session> {
        let input = input_with_classes(classes);
        let mut sessions = build_sessions(&input).unwrap();
        compute_domains(&mut sessions).unwrap();
        sessions
    }

    #[test]
    fn unrestricted_class_gets_full_universe() {
        let sessions = sessions_for(vec![class(1, 1, Restriction::default())]);
        assert_eq!(sessions[0].domain.len(), 25);
    }

    #[test]
    fn day_and_block_restrictions_compose() {
        let restriction = Restriction {
            allowed_days: Some(vec![0, 2]),
            allowed_blocks: Some(vec![1, 2]),
            fixed_slots: Vec::new(),
        };
        let sessions = sessions_for(vec![class(1, 1, restriction)]);
        assert_eq!(sessions[0].domain, vec![0, 1, 10, 11]);
    }

    #[test]
    fn fixed_meeting_collapses_to_singleton() {
        let restriction = Restriction {
            fixed_slots: vec![(3, 2)],
            ..Restriction::default()
        };
        let sessions = sessions_for(vec![class(1, 1, restriction)]);
        assert_eq!(sessions[0].domain, vec![16]);
    }

    #[test]
    fn out_of_range_fixed_slot_is_infeasible() {
        let restriction = Restriction {
            fixed_slots: vec![(9, 9)],
            ..Restriction::default()
        };
        let input = input_with_classes(vec![class(1, 1, restriction)]);
        let mut sessions = build_sessions(&input).unwrap();
        let err = compute_domains(&mut sessions).unwrap_err();
        assert!(err.contains("class 1"));
    }

    #[test]
    fn empty_restriction_intersection_is_infeasible() {
        let restriction = Restriction {
            allowed_days: Some(vec![9]),
            ..Restriction::default()
        };
        let input = input_with_classes(vec![class(1, 1, restriction)]);
        let mut sessions = build_sessions(&input).unwrap();
        assert!(compute_domains(&mut sessions).is_err());
    }

    #[test]
    fn co_taught_domains_intersect() {
        let mut a = class(1, 1, Restriction {
            allowed_days: Some(vec![0, 1]),
            ..Restriction::default()
        });
        a.co_taught = true;
        let mut b = class(2, 2, Restriction {
            allowed_days: Some(vec![1, 2]),
            ..Restriction::default()
        });
        b.co_taught = true;
        let sessions = sessions_for(vec![a, b]);
        let day1: Vec<SlotIndex> = (5..10).collect();
        assert_eq!(sessions[0].domain, day1);
        assert_eq!(sessions[1].domain, day1);
    }
}
