// tests/registry_tests.rs
mod common;

use common::*;
use waypoint::{Control, Ctx, Flow, Outcome, Registry, StepPolicy, WaypointError};

#[derive(Clone, Debug, Default)]
struct AlphaCtx {
  val: String,
}

#[derive(Clone, Debug, Default)]
struct BetaCtx {
  num: i32,
}

#[tokio::test]
async fn dispatches_by_context_type() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut alpha = Flow::<AlphaCtx, TestError>::new("alpha", &[("alpha_task", StepPolicy::Required)]);
  alpha.on("alpha_task", |ctx: Ctx<AlphaCtx>| async move {
    ctx.write().val = "alpha_processed".to_string();
    Ok::<_, TestError>(Control::Continue)
  });
  registry.register(alpha);

  let mut beta = Flow::<BetaCtx, TestError>::new("beta", &[("beta_task", StepPolicy::Required)]);
  beta.on("beta_task", |ctx: Ctx<BetaCtx>| async move {
    ctx.write().num = 100;
    Ok::<_, TestError>(Control::Continue)
  });
  registry.register(beta);

  assert_eq!(registry.len(), 2);
  assert!(registry.is_registered::<AlphaCtx>());

  let alpha_ctx = Ctx::new(AlphaCtx::default());
  assert_eq!(registry.run(alpha_ctx.clone()).await.unwrap(), Outcome::Completed);
  assert_eq!(alpha_ctx.read().val, "alpha_processed");

  let beta_ctx = Ctx::new(BetaCtx::default());
  assert_eq!(registry.run(beta_ctx.clone()).await.unwrap(), Outcome::Completed);
  assert_eq!(beta_ctx.read().num, 100);
}

#[tokio::test]
async fn unregistered_context_type_is_reported() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  #[derive(Default)]
  struct Unregistered;

  let err = registry.run(Ctx::new(Unregistered)).await.unwrap_err();
  match err {
    TestError::Engine(s) => {
      assert!(s.contains("NotRegistered"));
      assert!(s.contains("Unregistered"));
    }
    other => panic!("expected engine error, got {:?}", other),
  }
}

#[tokio::test]
async fn flow_errors_convert_into_registry_error_type() {
  setup_tracing();
  let registry = Registry::<WaypointError>::new();

  let mut flow = Flow::<AlphaCtx, WaypointError>::new("failing", &[("task", StepPolicy::Required)]);
  flow.on("task", |_ctx: Ctx<AlphaCtx>| async move {
    Err::<Control, _>(WaypointError::from(anyhow::anyhow!("intentional")))
  });
  registry.register(flow);

  let err = registry.run(Ctx::new(AlphaCtx::default())).await.unwrap_err();
  assert!(matches!(err, WaypointError::HandlerError { .. }));
  assert!(err.to_string().contains("intentional"));
}

#[tokio::test]
async fn later_registration_replaces_earlier() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut first = Flow::<BetaCtx, TestError>::new("first", &[("t", StepPolicy::Required)]);
  first.on("t", |ctx: Ctx<BetaCtx>| async move {
    ctx.write().num = 1;
    Ok::<_, TestError>(Control::Continue)
  });
  registry.register(first);

  let mut second = Flow::<BetaCtx, TestError>::new("second", &[("t", StepPolicy::Required)]);
  second.on("t", |ctx: Ctx<BetaCtx>| async move {
    ctx.write().num = 2;
    Ok::<_, TestError>(Control::Continue)
  });
  registry.register(second);

  let ctx = Ctx::new(BetaCtx::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(registry.len(), 1);
  assert_eq!(ctx.read().num, 2);
}
