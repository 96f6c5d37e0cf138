//! Property-based tests for the seat ledger
//!
//! Random sequences of enroll/drop/complete calls are replayed against both the
//! ledger and a tiny in-memory model of who holds a seat. The ledger must agree
//! with the model on every outcome, and the capacity invariant must hold after
//! every step, not just at the end.

use std::collections::BTreeSet;
use std::sync::Arc;

use course_enrollment::config::LedgerConfig;
use course_enrollment::course::CourseDetails;
use course_enrollment::{EnrollmentError, EnrollmentLedger};
use proptest::prelude::*;

const COURSE: &str = "cs101";

#[derive(Debug, Clone)]
enum Op {
    Enroll(u8),
    Drop(u8),
    Complete,
}

/// Strategy over operations for a pool of six students, completion kept rare
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (0u8..6).prop_map(Op::Enroll),
        3 => (0u8..6).prop_map(Op::Drop),
        1 => Just(Op::Complete),
    ]
}

fn temporary_ledger(capacity: u32) -> EnrollmentLedger {
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .expect("temporary sled db");
    let ledger = EnrollmentLedger::new(Arc::new(db), &LedgerConfig::default()).expect("ledger");
    ledger
        .upsert_course(
            CourseDetails::new()
                .set_id(COURSE)
                .set_capacity(capacity)
                .set_owner("prof_ada"),
        )
        .expect("course");
    ledger
}

fn student(i: u8) -> String {
    format!("s{i}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: the ledger matches a set-based model and never oversubscribes
    ///
    /// The model is the set of students currently holding a seat. Each call's
    /// success or typed failure is fully determined by that set and the capacity.
    #[test]
    fn prop_ledger_matches_seat_model(
        capacity in 1u32..=4,
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let ledger = temporary_ledger(capacity);
        let mut seated: BTreeSet<u8> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Enroll(i) => {
                    let result = ledger.enroll(&student(i), COURSE);
                    if seated.contains(&i) {
                        let is_already_enrolled =
                            matches!(result, Err(EnrollmentError::AlreadyEnrolled { .. }));
                        prop_assert!(is_already_enrolled, "{:?}", result);
                    } else if seated.len() as u32 >= capacity {
                        let is_capacity_exceeded =
                            matches!(result, Err(EnrollmentError::CapacityExceeded { .. }));
                        prop_assert!(is_capacity_exceeded, "{:?}", result);
                    } else {
                        prop_assert!(result.is_ok(), "{:?}", result);
                        seated.insert(i);
                    }
                }
                Op::Drop(i) => {
                    let result = ledger.drop_enrollment(&student(i), COURSE);
                    if seated.remove(&i) {
                        prop_assert!(result.is_ok(), "{:?}", result);
                    } else {
                        let is_not_enrolled =
                            matches!(result, Err(EnrollmentError::NotEnrolled { .. }));
                        prop_assert!(is_not_enrolled, "{:?}", result);
                    }
                }
                Op::Complete => {
                    let completed = ledger.transition_to_completed(COURSE).unwrap();
                    prop_assert_eq!(completed.len(), seated.len());
                    seated.clear();
                }
            }

            let course = ledger.course(COURSE).unwrap().unwrap();
            prop_assert!(course.active_enrollment_count <= course.capacity);
            prop_assert_eq!(course.active_enrollment_count as usize, seated.len());
        }

        prop_assert!(ledger.audit_seat_counts().unwrap().is_empty());
        let roster: BTreeSet<String> = ledger
            .roster(COURSE)
            .unwrap()
            .into_iter()
            .map(|record| record.student_id)
            .collect();
        let expected: BTreeSet<String> = seated.iter().map(|i| student(*i)).collect();
        prop_assert_eq!(roster, expected);
    }

    /// Property: at most one active record per (student, course) pair
    ///
    /// However many times a student enrolls and drops, their history holds
    /// exactly one active record while seated and none otherwise.
    #[test]
    fn prop_at_most_one_active_record_per_pair(
        toggles in prop::collection::vec(any::<bool>(), 1..20),
    ) {
        let ledger = temporary_ledger(1);
        let mut seated = false;

        for enroll in toggles {
            if enroll {
                let _ = ledger.enroll("s1", COURSE);
                seated = true;
            } else {
                let _ = ledger.drop_enrollment("s1", COURSE);
                seated = false;
            }

            let active = ledger
                .enrollment_history("s1", COURSE)
                .unwrap()
                .iter()
                .filter(|record| record.is_active())
                .count();
            prop_assert_eq!(active, usize::from(seated));
        }
    }
}
