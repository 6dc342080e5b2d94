// tests/flow_execution_tests.rs
mod common;

use common::*;
use serial_test::serial;
use std::sync::Arc;
use waypoint::{Control, Ctx, Flow, Outcome, StepPolicy};

use StepPolicy::{BestEffort, Required};

#[tokio::test]
#[serial]
async fn runs_steps_in_declared_order() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("ordered", &[("s1", Required), ("s2", Required), ("s3", Required)]);
  flow.on_boxed("s1", recording_handler("s1", " one"));
  flow.on_boxed("s2", recording_handler("s2", " two"));
  flow.on_boxed("s3", recording_handler("s3", " three"));

  let ctx = Ctx::new(TestContext::default());
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Completed);
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.message, " one two three");
  assert_eq!(guard.steps_executed, vec!["s1", "s2", "s3"]);
}

#[tokio::test]
#[serial]
async fn stop_signal_halts_remaining_steps() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("stopping", &[("a", Required), ("b", Required), ("c", Required)]);
  flow.on_boxed("a", recording_handler("a", "A"));
  flow.on_boxed("b", recording_handler("b", "B"));
  flow.on_boxed("c", recording_handler("c", "C"));

  let ctx = Ctx::new(TestContext {
    should_stop_at: Some("b".to_string()),
    ..Default::default()
  });
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Stopped);
  assert_eq!(ctx.read().steps_executed, vec!["a", "b"]);
  assert_eq!(ctx.read().message, "AB");
}

#[tokio::test]
#[serial]
async fn required_step_error_aborts_run() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("failing", &[("good", Required), ("bad", Required), ("never", Required)]);
  flow.on_boxed("good", recording_handler("good", "G"));
  flow.on_boxed("bad", failing_handler("bad", "boom"));
  flow.on_boxed("never", recording_handler("never", "N"));

  let ctx = Ctx::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("boom".to_string()));
  assert_eq!(ctx.read().steps_executed, vec!["good", "bad"]);
}

#[tokio::test]
#[serial]
async fn best_effort_step_error_is_swallowed() {
  setup_tracing();
  let mut flow =
    Flow::<TestContext, TestError>::new("best_effort", &[("first", Required), ("flaky", BestEffort), ("last", Required)]);
  flow.on_boxed("first", recording_handler("first", "F"));
  flow.on_boxed("flaky", failing_handler("flaky", "store unavailable"));
  flow.after("flaky", |ctx: Ctx<TestContext>| async move {
    ctx.write().steps_executed.push("flaky_after".to_string());
    Ok::<_, TestError>(Control::Continue)
  });
  flow.on_boxed("last", recording_handler("last", "L"));

  let ctx = Ctx::new(TestContext::default());
  let outcome = flow.run(ctx.clone()).await.unwrap();

  assert_eq!(outcome, Outcome::Completed);
  // The after handler of a failed step does not run.
  assert_eq!(ctx.read().steps_executed, vec!["first", "flaky", "last"]);
  assert_eq!(ctx.read().message, "FL");
}

#[tokio::test]
#[serial]
async fn skip_condition_bypasses_step() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("skipping", &[("s1", Required), ("maybe", Required), ("s3", Required)]);
  flow.skip_when("maybe", Arc::new(|ctx: Ctx<TestContext>| ctx.read().counter > 0));
  flow.on_boxed("s1", recording_handler("s1", "1"));
  flow.on_boxed("maybe", recording_handler("maybe", "?"));
  flow.on_boxed("s3", recording_handler("s3", "3"));

  let ctx = Ctx::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().steps_executed, vec!["s1", "s3"]);
  assert_eq!(ctx.read().message, "13");
}

#[tokio::test]
#[serial]
async fn after_handlers_run_once_on_handlers_finish() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("phases", &[("step", Required)]);
  flow.after("step", |ctx: Ctx<TestContext>| async move {
    ctx.write().message.push_str("-after");
    Ok::<_, TestError>(Control::Continue)
  });
  flow.on("step", |ctx: Ctx<TestContext>| async move {
    ctx.write().message.push_str("on");
    Ok::<_, TestError>(Control::Continue)
  });

  let ctx = Ctx::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().message, "on-after");
}

#[tokio::test]
#[serial]
async fn required_step_without_handlers_is_an_engine_error() {
  setup_tracing();
  let flow = Flow::<TestContext, TestError>::new("unwired", &[("missing", Required)]);

  let err = flow.run(Ctx::new(TestContext::default())).await.unwrap_err();
  match err {
    TestError::Engine(s) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("missing"));
    }
    other => panic!("expected engine error, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn best_effort_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("sparse", &[("optional", BestEffort), ("s2", Required)]);
  flow.on_boxed("s2", recording_handler("s2", "2"));

  let outcome = flow.run(Ctx::new(TestContext::default())).await.unwrap();
  assert_eq!(outcome, Outcome::Completed);
}

#[test]
#[should_panic(expected = "not_a_step")]
fn registering_handler_for_unknown_step_panics() {
  let mut flow = Flow::<TestContext, TestError>::new("typo", &[("real", Required)]);
  flow.on_boxed("not_a_step", recording_handler("x", "x"));
}

#[test]
#[should_panic(expected = "already exists")]
fn duplicate_step_names_panic() {
  let _ = Flow::<TestContext, TestError>::new("dupes", &[("same", Required), ("same", BestEffort)]);
}

#[test]
fn push_step_and_policy_lookup() {
  let mut flow = Flow::<TestContext, TestError>::new("growing", &[("a", Required)]);
  flow.push_step("b", BestEffort);
  assert_eq!(flow.step_names(), vec!["a", "b"]);
  assert_eq!(flow.policy_of("b"), Some(BestEffort));
  assert_eq!(flow.policy_of("zzz"), None);
}
