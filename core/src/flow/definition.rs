// core/src/flow/definition.rs

use crate::core::handler::Handler;
use crate::core::step::{SkipCondition, StepDef, StepPolicy};
use crate::error::WaypointError;
use std::collections::HashMap;

/// An ordered set of named steps over a context of type `T`.
///
/// `E` is the error type returned by handlers and by [`Flow::run`]. It must be
/// constructible from [`WaypointError`] so engine-level failures (such as a
/// required step without handlers) reach the caller in the same type.
pub struct Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  pub(crate) name: String,
  pub(crate) steps: Vec<StepDef<T>>,
  pub(crate) on: HashMap<String, Vec<Handler<T, E>>>,
  pub(crate) after: HashMap<String, Vec<Handler<T, E>>>,
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  /// Creates a flow from `(step_name, policy)` pairs, run in the given order.
  ///
  /// Panics on duplicate step names.
  pub fn new(name: impl Into<String>, step_defs: &[(&str, StepPolicy)]) -> Self {
    let mut flow = Self {
      name: name.into(),
      steps: Vec::with_capacity(step_defs.len()),
      on: HashMap::new(),
      after: HashMap::new(),
    };
    for (step_name, policy) in step_defs {
      flow.ensure_step_not_exists(step_name);
      flow.steps.push(StepDef {
        name: (*step_name).to_string(),
        policy: *policy,
        skip_if: None,
      });
    }
    flow
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn policy_of(&self, step_name: &str) -> Option<StepPolicy> {
    self.steps.iter().find(|s| s.name == step_name).map(|s| s.policy)
  }

  /// Skips `step_name` whenever `condition` returns true for the run's context.
  pub fn skip_when(&mut self, step_name: &str, condition: SkipCondition<T>) {
    let idx = self.step_index(step_name);
    self.steps[idx].skip_if = Some(condition);
  }

  /// Appends a step at the end of the flow.
  pub fn push_step(&mut self, step_name: &str, policy: StepPolicy) {
    self.ensure_step_not_exists(step_name);
    self.steps.push(StepDef {
      name: step_name.to_string(),
      policy,
      skip_if: None,
    });
  }

  /// Looks a step up by name. Unknown names are a wiring mistake and panic.
  pub(crate) fn step_index(&self, step_name: &str) -> usize {
    match self.steps.iter().position(|s| s.name == step_name) {
      Some(idx) => idx,
      None => panic!(
        "waypoint setup error: {}",
        WaypointError::StepNotFound {
          flow: self.name.clone(),
          step_name: step_name.to_string(),
        }
      ),
    }
  }

  fn ensure_step_not_exists(&self, step_name: &str) {
    if self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "waypoint setup error: step '{}' already exists in flow '{}'",
        step_name, self.name
      );
    }
  }
}
