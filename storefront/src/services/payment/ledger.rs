// storefront/src/services/payment/ledger.rs

//! Bookkeeping shared by the mock processors: what intents were opened, which
//! were captured, and which captures were refunded.

use super::ProcessorError;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(super) struct IntentRecord {
  pub order_id: Uuid,
  pub amount_cents: i64,
  pub currency: String,
  pub captured_as: Option<String>,
}

#[derive(Debug, Clone)]
struct CaptureRecord {
  amount_cents: i64,
  refunded_cents: i64,
}

#[derive(Default)]
pub(super) struct MockLedger {
  intents: Mutex<HashMap<String, IntentRecord>>,
  captures: Mutex<HashMap<String, CaptureRecord>>,
}

impl MockLedger {
  pub fn open_intent(&self, reference: &str, order_id: Uuid, amount_cents: i64, currency: &str) {
    self.intents.lock().insert(
      reference.to_string(),
      IntentRecord {
        order_id,
        amount_cents,
        currency: currency.to_string(),
        captured_as: None,
      },
    );
  }

  pub fn intent(&self, reference: &str) -> Result<IntentRecord, ProcessorError> {
    self
      .intents
      .lock()
      .get(reference)
      .cloned()
      .ok_or_else(|| ProcessorError::Rejected(format!("unknown payment reference '{}'", reference)))
  }

  /// Records the capture of `reference`. Capturing twice returns the first
  /// transaction id.
  pub fn capture(&self, reference: &str, transaction_id: String) -> Result<String, ProcessorError> {
    let mut intents = self.intents.lock();
    let intent = intents
      .get_mut(reference)
      .ok_or_else(|| ProcessorError::Rejected(format!("unknown payment reference '{}'", reference)))?;
    if let Some(existing) = &intent.captured_as {
      return Ok(existing.clone());
    }
    intent.captured_as = Some(transaction_id.clone());
    self.captures.lock().insert(
      transaction_id.clone(),
      CaptureRecord {
        amount_cents: intent.amount_cents,
        refunded_cents: 0,
      },
    );
    Ok(transaction_id)
  }

  pub fn refund(&self, transaction_id: &str, amount_cents: i64) -> Result<(), ProcessorError> {
    let mut captures = self.captures.lock();
    let capture = captures
      .get_mut(transaction_id)
      .ok_or_else(|| ProcessorError::Rejected(format!("unknown transaction '{}'", transaction_id)))?;
    if amount_cents <= 0 || capture.refunded_cents + amount_cents > capture.amount_cents {
      return Err(ProcessorError::Rejected(format!(
        "refund of {} exceeds refundable amount {}",
        amount_cents,
        capture.amount_cents - capture.refunded_cents
      )));
    }
    capture.refunded_cents += amount_cents;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capture_is_idempotent_per_intent() {
    let ledger = MockLedger::default();
    ledger.open_intent("pi_1", Uuid::new_v4(), 2500, "USD");
    assert_eq!(ledger.capture("pi_1", "ch_a".to_string()).unwrap(), "ch_a");
    assert_eq!(ledger.capture("pi_1", "ch_b".to_string()).unwrap(), "ch_a");
  }

  #[test]
  fn refunds_are_bounded_by_capture() {
    let ledger = MockLedger::default();
    ledger.open_intent("pi_1", Uuid::new_v4(), 2500, "USD");
    ledger.capture("pi_1", "ch_a".to_string()).unwrap();
    assert!(ledger.refund("ch_a", 2000).is_ok());
    assert!(ledger.refund("ch_a", 501).is_err());
    assert!(ledger.refund("ch_unknown", 1).is_err());
  }
}
