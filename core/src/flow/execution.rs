// core/src/flow/execution.rs

use crate::core::control::{Control, Outcome};
use crate::core::ctx::Ctx;
use crate::core::handler::Handler;
use crate::core::step::StepPolicy;
use crate::error::WaypointError;
use crate::flow::definition::Flow;
use tracing::{event, instrument, Instrument, Level};

/// What happened inside one phase (`on` or `after`) of a step.
enum PhaseResult<E> {
  Continue,
  Stop,
  Failed(E),
}

impl<T, E> Flow<T, E>
where
  T: 'static + Send + Sync,
  E: std::error::Error + From<WaypointError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx`.
  ///
  /// A `Required` step whose handler fails aborts the run with that error.
  /// A `BestEffort` step whose handler fails is logged and abandoned; the run
  /// carries on with the next step.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(flow = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx: Ctx<T>) -> Result<Outcome, E> {
    event!(Level::DEBUG, "Flow execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = tracing::info_span!("flow_step", step = step_name, step_index = step_idx);

      if let Some(skip_if) = &step_def.skip_if {
        if skip_if(ctx.clone()) {
          event!(parent: &step_span, Level::DEBUG, "Step skipped by condition.");
          continue;
        }
      }

      let on_handlers = self.on.get(step_name).filter(|v| !v.is_empty());
      let after_handlers = self.after.get(step_name).filter(|v| !v.is_empty());

      if on_handlers.is_none() && after_handlers.is_none() {
        match step_def.policy {
          StepPolicy::BestEffort => {
            event!(parent: &step_span, Level::DEBUG, "Best-effort step has no handlers, skipping.");
            continue;
          }
          StepPolicy::Required => {
            event!(parent: &step_span, Level::ERROR, "Required step has no handlers.");
            return Err(E::from(WaypointError::HandlerMissing {
              flow: self.name.clone(),
              step_name: step_def.name.clone(),
            }));
          }
        }
      }

      let mut phase = run_phase(on_handlers, &ctx).instrument(step_span.clone()).await;
      if matches!(phase, PhaseResult::Continue) {
        phase = run_phase(after_handlers, &ctx).instrument(step_span.clone()).await;
      }

      match phase {
        PhaseResult::Continue => {}
        PhaseResult::Stop => {
          event!(parent: &step_span, Level::INFO, "Flow stopped by handler.");
          return Ok(Outcome::Stopped);
        }
        PhaseResult::Failed(err) => match step_def.policy {
          StepPolicy::Required => {
            event!(parent: &step_span, Level::ERROR, error = %err, "Required step failed.");
            return Err(err);
          }
          StepPolicy::BestEffort => {
            event!(parent: &step_span, Level::WARN, error = %err, "Best-effort step failed, continuing.");
          }
        },
      }
    }

    event!(Level::DEBUG, "Flow execution completed.");
    Ok(Outcome::Completed)
  }
}

async fn run_phase<T, E>(handlers: Option<&Vec<Handler<T, E>>>, ctx: &Ctx<T>) -> PhaseResult<E>
where
  T: 'static + Send + Sync,
{
  let Some(handlers) = handlers else {
    return PhaseResult::Continue;
  };
  for handler in handlers {
    match handler(ctx.clone()).await {
      Ok(Control::Continue) => {}
      Ok(Control::Stop) => return PhaseResult::Stop,
      Err(e) => return PhaseResult::Failed(e),
    }
  }
  PhaseResult::Continue
}
