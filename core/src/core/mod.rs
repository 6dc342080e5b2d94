pub mod control;
pub mod ctx;
pub mod handler;
pub mod step;

pub use control::{Control, Outcome};
pub use ctx::Ctx;
pub use handler::Handler;
pub use step::{StepDef, StepPolicy};
