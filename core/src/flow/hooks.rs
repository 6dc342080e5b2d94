// core/src/flow/hooks.rs

//! Handler registration. User handlers may return any error that converts
//! into the flow's error type.

use crate::core::control::Control;
use crate::core::ctx::Ctx;
use crate::core::handler::Handler;
use crate::error::WaypointError;
use crate::flow::definition::Flow;
use std::future::Future;

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  /// Registers a main handler for `step_name`. Handlers of one step run in
  /// registration order.
  pub fn on<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(Ctx<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<Control, UserErr>> + Send + 'static,
    UserErr: Into<E> + Send + Sync + 'static,
  {
    self.step_index(step_name);
    let handler = wrap(handler_fn);
    self.on.entry(step_name.to_string()).or_default().push(handler);
  }

  /// Registers a handler that runs after all `on` handlers of `step_name`.
  pub fn after<F, UserErr>(&mut self, step_name: &str, handler_fn: impl Fn(Ctx<T>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<Control, UserErr>> + Send + 'static,
    UserErr: Into<E> + Send + Sync + 'static,
  {
    self.step_index(step_name);
    let handler = wrap(handler_fn);
    self.after.entry(step_name.to_string()).or_default().push(handler);
  }

  /// Registers an already boxed handler, e.g. one shared between flows.
  pub fn on_boxed(&mut self, step_name: &str, handler: Handler<T, E>) {
    self.step_index(step_name);
    self.on.entry(step_name.to_string()).or_default().push(handler);
  }
}

fn wrap<T, E, F, UserErr>(handler_fn: impl Fn(Ctx<T>) -> F + Send + Sync + 'static) -> Handler<T, E>
where
  T: 'static + Send + Sync,
  E: 'static,
  F: Future<Output = Result<Control, UserErr>> + Send + 'static,
  UserErr: Into<E> + Send + Sync + 'static,
{
  Box::new(move |ctx| {
    let user_fut = handler_fn(ctx);
    Box::pin(async move { user_fut.await.map_err(Into::into) })
  })
}
