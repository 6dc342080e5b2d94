// core/src/core/step.rs
use super::Ctx;
use std::sync::Arc;

pub type SkipCondition<T> = Arc<dyn Fn(Ctx<T>) -> bool + Send + Sync + 'static>;

/// How a failing handler affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
  /// A handler error aborts the run and is returned to the caller.
  Required,
  /// A handler error is logged; the run continues with the next step.
  /// A best-effort step without handlers is skipped.
  BestEffort,
}

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  pub policy: StepPolicy,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> std::fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("policy", &self.policy)
      .field("skip_if_present", &self.skip_if.is_some())
      .finish()
  }
}
