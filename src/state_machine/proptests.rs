//! Property-based tests for the turn-taking state machine
//!
//! Random operation sequences run against a real orchestrator with a mock
//! backend; the log invariants must hold after every single operation.

use super::*;
use crate::conversation::{Speaker, Termination, Turn};
use crate::generation::GenerationError;
use crate::runtime::testing::MockGenerator;
use crate::runtime::{Session, TurnOrchestrator};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Text(String, bool),
    Failure,
}

#[derive(Debug, Clone)]
enum Op {
    Send(String),
    Step,
    Reply,
    Impersonate,
    Continue(usize),
    Clear,
    Pop,
    DismissError,
}

fn arb_reply() -> impl Strategy<Value = Reply> {
    prop_oneof![
        4 => ("[a-z ]{0,12}", any::<bool>()).prop_map(|(text, done)| Reply::Text(text, done)),
        1 => Just(Reply::Failure),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        "[a-zA-Z ]{0,10}".prop_map(Op::Send),
        Just(Op::Step),
        Just(Op::Reply),
        Just(Op::Impersonate),
        (0usize..6).prop_map(Op::Continue),
        Just(Op::Clear),
        Just(Op::Pop),
        Just(Op::DismissError),
    ]
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    let termination = prop_oneof![
        Just(Termination::Terminating),
        Just(Termination::Continuable),
        Just(Termination::Unspecified),
    ];
    ("[a-z]{0,8}", termination, 0u8..3).prop_map(|(text, t, kind)| match kind {
        0 => Turn::human(text),
        1 => Turn::synthetic_human(text, t),
        _ => Turn::model(text, t),
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn apply(orch: &TurnOrchestrator<MockGenerator>, op: &Op) {
    // Outcomes are irrelevant here; only the resulting state is checked
    let _ = match op {
        Op::Send(text) => orch.send_human_turn(text).await,
        Op::Step => orch.step().await,
        Op::Reply => orch.generate_model_reply().await,
        Op::Impersonate => orch.generate_synthetic_human_turn().await,
        Op::Continue(index) => orch.continue_turn(*index).await,
        Op::Clear => {
            orch.session().clear();
            return;
        }
        Op::Pop => {
            orch.session().pop_last_turn();
            return;
        }
        Op::DismissError => {
            orch.session().dismiss_error();
            return;
        }
    };
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Any sequence of operations keeps the log well formed
    #[test]
    fn prop_operations_preserve_invariants(
        replies in proptest::collection::vec(arb_reply(), 0..30),
        ops in proptest::collection::vec(arb_op(), 0..25),
    ) {
        let llm = MockGenerator::new();
        for reply in &replies {
            match reply {
                Reply::Text(text, done) => llm.queue_response(text, *done),
                Reply::Failure => llm.queue_error(GenerationError::network("down")),
            }
        }
        let orch = TurnOrchestrator::new(Arc::new(Session::new("prop")), Arc::new(llm));

        runtime().block_on(async {
            for op in &ops {
                apply(&orch, op).await;
                let snapshot = orch.session().snapshot();
                prop_assert!(!snapshot.status.generating, "gate left closed after {:?}", op);
                prop_assert_eq!(snapshot.status.continuation_target, None);
                let checked = orch.session().read(|store| store.check_invariants());
                prop_assert!(checked.is_ok(), "{:?} after {:?}", checked, op);
            }
            Ok(())
        })?;
    }

    /// A failing operation never changes the log, even when earlier steps of
    /// its chain already succeeded
    #[test]
    fn prop_failure_leaves_log_unchanged(
        setup in proptest::collection::vec("[a-z]{1,6}", 0..4),
        lead in proptest::collection::vec(("[a-z ]{0,8}", any::<bool>()), 0..3),
        op in arb_op(),
    ) {
        let llm = MockGenerator::new();
        for text in &setup {
            llm.queue_response(text, true);
        }
        for (text, done) in &lead {
            llm.queue_response(text, *done);
        }
        llm.queue_error(GenerationError::network("down"));
        let orch = TurnOrchestrator::new(Arc::new(Session::new("prop")), Arc::new(llm));

        runtime().block_on(async {
            for text in &setup {
                let _ = orch.send_human_turn(text).await;
            }
            let before = orch.session().snapshot().turns;
            let result = match &op {
                Op::Send(text) => orch.send_human_turn(text).await,
                Op::Step => orch.step().await,
                Op::Reply => orch.generate_model_reply().await,
                Op::Impersonate => orch.generate_synthetic_human_turn().await,
                Op::Continue(index) => orch.continue_turn(*index).await,
                Op::Clear | Op::Pop | Op::DismissError => return Ok(()),
            };
            if lead.is_empty() {
                // The very first backend call fails
                prop_assert!(result.is_err(), "{:?} succeeded", op);
            }
            if result.is_err() {
                prop_assert_eq!(orch.session().snapshot().turns, before);
                prop_assert!(orch.session().snapshot().status.last_error.is_some());
            }
            Ok(())
        })?;
    }

    /// The decision is total and only ever continues the last turn
    #[test]
    fn prop_decide_only_continues_last_turn(turns in proptest::collection::vec(arb_turn(), 0..8)) {
        match decide(&turns) {
            Step::Continue { index } => {
                prop_assert_eq!(index, turns.len() - 1);
                let last = &turns[index];
                prop_assert!(!last.is_terminating());
                prop_assert!(last.is_extendable());
            }
            Step::ModelReply => {
                prop_assert_eq!(turns.last().map(Turn::speaker), Some(Speaker::Human));
            }
            Step::SyntheticHumanTurn => {
                let after_finished_reply = turns
                    .last()
                    .map_or(true, |t| t.speaker() == Speaker::Model && t.is_terminating());
                prop_assert!(after_finished_reply, "unexpected synthetic turn after {:?}", turns);
            }
        }
    }
}
