//! Property-based tests using proptest.
//!
//! Drives the store with arbitrary sequences of lifecycle operations and
//! checks that every committed record satisfies the data-model invariants,
//! that versions and progress never move backwards, and that input
//! validation agrees with the documented ranges. A fuzz-style section feeds
//! arbitrary JSON to the input and state deserializers.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

use research_tasks::constants::{MAX_ITERATIONS, MAX_QUERY_CHARS, MIN_ITERATIONS, MIN_QUERY_CHARS};
use research_tasks::store::{InMemoryTaskStore, TaskStore};
use research_tasks::{TaskFailure, TaskInput, TaskOutput, TaskState};

// ─── Arbitrary Strategies ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Start,
    Progress(u8),
    RequestCancel,
    Complete,
    Fail,
    Cancel,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        any::<u8>().prop_map(Op::Progress),
        Just(Op::RequestCancel),
        Just(Op::Complete),
        Just(Op::Fail),
        Just(Op::Cancel),
    ]
}

fn arb_state() -> impl Strategy<Value = TaskState> {
    prop::sample::select(TaskState::ALL.to_vec())
}

/// Applies `op` assuming the record is in `expected`; the store decides
/// whether that assumption and the resulting record are acceptable.
fn apply(store: &InMemoryTaskStore, id: &research_tasks::TaskId, expected: TaskState, op: &Op) -> bool {
    let now = Utc::now();
    let result = match op.clone() {
        Op::Start => store.compare_and_transition(id, expected, Box::new(move |r| r.start(now))),
        Op::Progress(p) => {
            store.compare_and_transition(id, expected, Box::new(move |r| r.advance_progress(p)))
        },
        Op::RequestCancel => {
            store.compare_and_transition(id, expected, Box::new(|r| r.cancel_requested = true))
        },
        Op::Complete => store.compare_and_transition(
            id,
            expected,
            Box::new(move |r| r.complete(TaskOutput::new(json!({})), now)),
        ),
        Op::Fail => store.compare_and_transition(
            id,
            expected,
            Box::new(move |r| r.fail(TaskFailure::work("prop"), now)),
        ),
        Op::Cancel => store.compare_and_transition(id, expected, Box::new(move |r| r.cancel(now))),
    };
    result.is_ok()
}

// ─── Store Invariants ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn arbitrary_operation_sequences_preserve_invariants(
        ops in prop::collection::vec((arb_op(), arb_state()), 1..40)
    ) {
        let store = InMemoryTaskStore::new();
        let id = store.create(TaskInput::new("property run")).unwrap().id;
        let mut previous = store.get(&id).unwrap();

        for (op, expected) in &ops {
            let committed = apply(&store, &id, *expected, op);
            let current = store.get(&id).unwrap();
            prop_assert!(current.check_invariants().is_ok());

            if committed {
                prop_assert_eq!(current.version, previous.version + 1);
                prop_assert!(!previous.state.is_terminal());
                if current.state != previous.state {
                    prop_assert!(previous.state.can_transition_to(&current.state));
                }
                if previous.state == TaskState::Running && current.state == TaskState::Running {
                    prop_assert!(current.progress >= previous.progress);
                }
                prop_assert!(current.cancel_requested || !previous.cancel_requested);
            } else {
                prop_assert_eq!(&current, &previous);
            }
            previous = current;
        }
    }

    #[test]
    fn terminal_records_are_immutable(
        finish in prop_oneof![Just(Op::Complete), Just(Op::Fail), Just(Op::Cancel)],
        later in prop::collection::vec((arb_op(), arb_state()), 1..20)
    ) {
        let store = InMemoryTaskStore::new();
        let id = store.create(TaskInput::new("frozen")).unwrap().id;
        prop_assert!(apply(&store, &id, TaskState::Queued, &Op::Start));
        prop_assert!(apply(&store, &id, TaskState::Running, &finish));
        let frozen = store.get(&id).unwrap();

        for (op, expected) in &later {
            prop_assert!(!apply(&store, &id, *expected, op));
        }
        prop_assert_eq!(store.get(&id).unwrap(), frozen);
    }

    #[test]
    fn purge_never_removes_live_records(
        live in 0usize..6,
        finished in 0usize..6
    ) {
        let store = InMemoryTaskStore::new();
        for i in 0..live {
            store.create(TaskInput::new(format!("live {i}"))).unwrap();
        }
        for i in 0..finished {
            let id = store.create(TaskInput::new(format!("done {i}"))).unwrap().id;
            prop_assert!(apply(&store, &id, TaskState::Queued, &Op::Cancel));
        }
        let purged = store.purge_finished_before(Utc::now() + chrono::Duration::seconds(1));
        prop_assert_eq!(purged, finished);
        prop_assert_eq!(store.len(), live);
        prop_assert_eq!(store.count_by_state().queued, live);
    }
}

// ─── Input Validation ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn validation_matches_documented_ranges(
        query in "[a-z ]{0,1100}",
        iterations in 0u32..30
    ) {
        let input = TaskInput::new(query.clone()).with_max_iterations(iterations);
        let chars = query.chars().count();
        let expected_ok = !query.trim().is_empty()
            && (MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&chars)
            && (MIN_ITERATIONS..=MAX_ITERATIONS).contains(&iterations);
        prop_assert_eq!(input.validate().is_ok(), expected_ok);
    }
}

// ─── Fuzz Deserialization ───────────────────────────────────────────────────

fn arb_json() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,20}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::hash_map("[a-z_]{1,15}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn task_input_deserialization_never_panics(value in arb_json()) {
        let _ = serde_json::from_value::<TaskInput>(value);
    }

    #[test]
    fn task_state_parse_never_panics(s in ".{0,32}") {
        let _ = s.parse::<TaskState>();
    }
}
