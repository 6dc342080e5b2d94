// tests/ctx_tests.rs
mod common;

use common::*;
use waypoint::Ctx;

#[test]
fn clones_share_the_same_data() {
  let ctx = Ctx::new(TestContext::default());
  let other = ctx.clone();
  other.write().counter = 7;
  assert_eq!(ctx.read().counter, 7);
}

#[test]
fn try_write_fails_while_read_guard_is_held() {
  let ctx = Ctx::new(TestContext::default());
  let guard = ctx.read();
  assert!(ctx.try_write().is_none());
  assert!(ctx.try_read().is_some());
  drop(guard);
  assert!(ctx.try_write().is_some());
}

#[test]
fn map_read_and_snapshot() {
  let ctx = Ctx::new(TestContext {
    message: "hello".to_string(),
    ..Default::default()
  });
  assert_eq!(&*ctx.map_read(|c| c.message.as_str()), "hello");

  let snap = ctx.snapshot();
  ctx.write().message.push('!');
  assert_eq!(snap.message, "hello");
  assert_eq!(ctx.read().message, "hello!");
}
