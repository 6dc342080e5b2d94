// core/src/registry.rs

//! `Registry<E>`: flows keyed by their context type.
//!
//! Each flow may use its own handler error type; the registry converts it to
//! the application error `E` on the way out.

use crate::core::control::Outcome;
use crate::core::ctx::Ctx;
use crate::error::WaypointError;
use crate::flow::Flow;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, AppErr>;
  fn flow_name(&self) -> &str;
}

struct FlowRunner<T, FlowErr, AppErr>
where
  T: 'static + Send + Sync,
  FlowErr: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  flow: Arc<Flow<T, FlowErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<T, FlowErr, AppErr> ErasedRunner<AppErr> for FlowRunner<T, FlowErr, AppErr>
where
  T: 'static + Send + Sync,
  FlowErr: std::error::Error + From<WaypointError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<FlowErr> + From<WaypointError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<Outcome, AppErr> {
    let ctx = match ctx.downcast::<Ctx<T>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        return Err(AppErr::from(WaypointError::TypeMismatch {
          expected_type: std::any::type_name::<Ctx<T>>().to_string(),
        }));
      }
    };
    self.flow.run(ctx).await.map_err(AppErr::from)
  }

  fn flow_name(&self) -> &str {
    self.flow.name()
  }
}

pub struct Registry<AppErr = WaypointError>
where
  AppErr: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  flows: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Default for Registry<AppErr>
where
  AppErr: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> Registry<AppErr>
where
  AppErr: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `flow` as the flow for context type `T`, replacing any earlier one.
  pub fn register<T, FlowErr>(&self, flow: Flow<T, FlowErr>)
  where
    T: 'static + Send + Sync,
    FlowErr: std::error::Error + From<WaypointError> + Send + Sync + 'static,
    AppErr: From<FlowErr>,
  {
    event!(Level::DEBUG, flow = %flow.name(), context_type = %std::any::type_name::<T>(), "Registering flow.");
    let runner = FlowRunner::<T, FlowErr, AppErr> {
      flow: Arc::new(flow),
      _app_err: PhantomData,
    };
    if let Some(previous) = self.flows.write().insert(TypeId::of::<T>(), Arc::new(runner)) {
      event!(Level::WARN, replaced = %previous.flow_name(), "Flow registration replaced an existing flow.");
    }
  }

  pub fn is_registered<T: 'static + Send + Sync>(&self) -> bool {
    self.flows.read().contains_key(&TypeId::of::<T>())
  }

  pub fn len(&self) -> usize {
    self.flows.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.flows.read().is_empty()
  }

  /// Runs the flow registered for `T`.
  pub async fn run<T>(&self, ctx: Ctx<T>) -> Result<Outcome, AppErr>
  where
    T: 'static + Send + Sync,
  {
    let runner = self.flows.read().get(&TypeId::of::<T>()).cloned().ok_or_else(|| {
      let context_type = std::any::type_name::<T>();
      event!(Level::ERROR, %context_type, "No flow registered for context type.");
      AppErr::from(WaypointError::NotRegistered {
        context_type: context_type.to_string(),
      })
    })?;
    runner.run_erased(Box::new(ctx)).await
  }
}
