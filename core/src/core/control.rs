// core/src/core/control.rs

/// Signal returned by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  Continue,
  /// Halt the run. No further handlers or steps execute.
  Stop,
}

/// Result of a complete flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Completed,
  Stopped,
}
