//! State machine transition tests.
//!
//! Covers the full 5x5 transition matrix: 5 valid edges, 5 self-transition
//! rejections and every edge out of a terminal state.

// ─── is_terminal Tests ──────────────────────────────────────────────────────

mod is_terminal {
    use research_tasks::TaskState;

    #[test]
    fn queued_is_not_terminal() {
        assert!(!TaskState::Queued.is_terminal());
    }

    #[test]
    fn running_is_not_terminal() {
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn completed_failed_cancelled_are_terminal() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }
}

// ─── Transition Matrix ──────────────────────────────────────────────────────

mod matrix {
    use research_tasks::TaskState;
    use rstest::rstest;

    #[rstest]
    #[case(TaskState::Queued, TaskState::Running)]
    #[case(TaskState::Queued, TaskState::Cancelled)]
    #[case(TaskState::Running, TaskState::Completed)]
    #[case(TaskState::Running, TaskState::Failed)]
    #[case(TaskState::Running, TaskState::Cancelled)]
    fn valid_edges(#[case] from: TaskState, #[case] to: TaskState) {
        assert!(from.can_transition_to(&to), "{from} -> {to} should be valid");
    }

    #[test]
    fn self_transitions_are_rejected() {
        for state in TaskState::ALL {
            assert!(!state.can_transition_to(&state), "{state} -> {state}");
        }
    }

    #[test]
    fn nothing_returns_to_queued() {
        for state in TaskState::ALL {
            assert!(!state.can_transition_to(&TaskState::Queued));
        }
    }

    #[test]
    fn queued_cannot_skip_running() {
        assert!(!TaskState::Queued.can_transition_to(&TaskState::Completed));
        assert!(!TaskState::Queued.can_transition_to(&TaskState::Failed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in TaskState::ALL.into_iter().filter(TaskState::is_terminal) {
            for to in TaskState::ALL {
                assert!(!from.can_transition_to(&to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn exactly_five_valid_edges() {
        let count = TaskState::ALL
            .iter()
            .flat_map(|from| TaskState::ALL.iter().map(move |to| (from, to)))
            .filter(|(from, to)| from.can_transition_to(to))
            .count();
        assert_eq!(count, 5);
    }
}

// ─── validate_transition ────────────────────────────────────────────────────

mod validate {
    use research_tasks::{TaskId, TaskState, TransitionError};

    #[test]
    fn ok_for_valid_edge() {
        assert!(TaskState::Queued
            .validate_transition(TaskId::new(), &TaskState::Running)
            .is_ok());
    }

    #[test]
    fn error_names_task_and_edge() {
        let id = TaskId::new();
        let err = TaskState::Failed
            .validate_transition(id, &TaskState::Running)
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition { task_id, from: TaskState::Failed, to: TaskState::Running }
                if task_id == id
        ));
        assert!(err.to_string().contains("failed -> running"));
    }
}
