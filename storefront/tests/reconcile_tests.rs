// tests/reconcile_tests.rs
mod common;

use common::*;
use serial_test::serial;
use storefront::models::outbox::OutboxStatus;
use storefront::reconcile::{run_pass, PassSummary};
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn pass_applies_deferred_decrements_once_the_catalog_recovers() {
  let app = spawn_app().await;
  app.catalog.set_unavailable(true);
  checkout(&app, Uuid::new_v4(), vec![item(ESPRESSO_CUP, 2), item(FILTER_PAPERS, 1)], None)
    .await
    .expect("checkout succeeds");

  let settings = app.state.config.reconcile;
  let still_down = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
    .await
    .expect("pass runs");
  assert_eq!(
    still_down,
    PassSummary {
      examined: 2,
      resolved: 0,
      retrying: 2,
      abandoned: 0,
      withdrawn: 0,
    }
  );
  assert!(app.orders.decrement_outbox().iter().all(|e| e.attempts == 1 && e.last_error.is_some()));

  app.catalog.set_unavailable(false);
  let recovered = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
    .await
    .expect("pass runs");
  assert_eq!(recovered.resolved, 2);
  assert_eq!(app.catalog.inventory_of(ESPRESSO_CUP), Some(118));
  assert_eq!(app.catalog.inventory_of(FILTER_PAPERS), Some(399));
  assert!(app
    .orders
    .decrement_outbox()
    .iter()
    .all(|e| e.status == OutboxStatus::Resolved));

  let idle = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
    .await
    .expect("pass runs");
  assert_eq!(idle, PassSummary::default());
}

#[tokio::test]
#[serial]
async fn entries_are_abandoned_after_the_attempt_limit() {
  let app = spawn_app().await;
  app.catalog.set_unavailable(true);
  checkout(&app, Uuid::new_v4(), vec![item(KETTLE, 1)], None)
    .await
    .expect("checkout succeeds");
  app.catalog.set_unavailable(false);
  app.catalog.remove_product(KETTLE);

  let settings = app.state.config.reconcile;
  assert_eq!(settings.max_attempts, 3);
  for _ in 0..2 {
    let summary = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
      .await
      .expect("pass runs");
    assert_eq!(summary.retrying, 1);
  }
  let last = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
    .await
    .expect("pass runs");
  assert_eq!(last.abandoned, 1);

  let entry = app.orders.decrement_outbox().pop().expect("outbox entry");
  assert_eq!(entry.status, OutboxStatus::Abandoned);
  assert_eq!(entry.attempts, 3);
  assert_eq!(entry.last_error.as_deref(), Some("product no longer exists"));

  let after = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
    .await
    .expect("pass runs");
  assert_eq!(after.examined, 0);
}

#[tokio::test]
#[serial]
async fn insufficient_stock_at_reconcile_time_is_retried() {
  let app = spawn_app().await;
  app.catalog.set_unavailable(true);
  checkout(&app, Uuid::new_v4(), vec![item(HAND_GRINDER, 3)], None)
    .await
    .expect("checkout succeeds");
  app.catalog.set_unavailable(false);
  checkout(&app, Uuid::new_v4(), vec![item(HAND_GRINDER, 1)], None)
    .await
    .expect("second checkout sees the undecremented stock");
  assert_eq!(app.catalog.inventory_of(HAND_GRINDER), Some(2));

  let settings = app.state.config.reconcile;
  let summary = run_pass(app.orders.as_ref(), app.catalog.as_ref(), &settings)
    .await
    .expect("pass runs");
  assert_eq!(summary.retrying, 1);
  let entry = &app.orders.decrement_outbox()[0];
  assert_eq!(entry.status, OutboxStatus::Pending);
  assert!(entry.last_error.as_deref().unwrap_or_default().contains("insufficient stock"));
}
