// core/src/core/handler.rs
use crate::core::control::Control;
use crate::core::ctx::Ctx;
use std::future::Future;
use std::pin::Pin;

/// A boxed step handler.
///
/// Handlers receive a clone of the run's [`Ctx`] and resolve to a
/// [`Control`] signal or the flow's error type.
pub type Handler<T, E> =
  Box<dyn Fn(Ctx<T>) -> Pin<Box<dyn Future<Output = Result<Control, E>> + Send>> + Send + Sync>;
