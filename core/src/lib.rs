// src/lib.rs

//! Waypoint: a small asynchronous step pipeline engine.
//!
//! A [`Flow`] is an ordered list of named steps. Each step has `on` and
//! `after` handlers that receive a shared [`Ctx`] and return a [`Control`]
//! signal. Steps are either [`StepPolicy::Required`] (a handler error aborts
//! the run) or [`StepPolicy::BestEffort`] (a handler error is logged and the
//! run moves on to the next step). A [`Registry`] keys flows by their context
//! type so callers run a workflow just by building its context.

pub mod core;
pub mod error;
pub mod flow;
pub mod registry;

pub use crate::core::control::{Control, Outcome};
pub use crate::core::ctx::Ctx;
pub use crate::core::handler::Handler;
pub use crate::core::step::{SkipCondition, StepDef, StepPolicy};
pub use crate::error::{WaypointError, WaypointResult};
pub use crate::flow::Flow;
pub use crate::registry::Registry;
