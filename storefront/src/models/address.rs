// storefront/src/models/address.rs

use serde::{Deserialize, Serialize};

/// Shipping address captured at checkout. Stored with the order as a JSON
/// snapshot; later changes to a customer's address book never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
  pub recipient: String,
  pub line1: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line2: Option<String>,
  pub city: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,
  pub postal_code: String,
  pub country: String,
}

impl ShippingAddress {
  /// Returns the first missing required field, if any.
  pub fn missing_field(&self) -> Option<&'static str> {
    let required = [
      ("recipient", &self.recipient),
      ("line1", &self.line1),
      ("city", &self.city),
      ("postalCode", &self.postal_code),
      ("country", &self.country),
    ];
    required
      .iter()
      .find(|(_, value)| value.trim().is_empty())
      .map(|(name, _)| *name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn address() -> ShippingAddress {
    ShippingAddress {
      recipient: "Ada Lovelace".to_string(),
      line1: "12 St James's Square".to_string(),
      line2: None,
      city: "London".to_string(),
      region: None,
      postal_code: "SW1Y 4JH".to_string(),
      country: "GB".to_string(),
    }
  }

  #[test]
  fn complete_address_has_no_missing_field() {
    assert_eq!(address().missing_field(), None);
  }

  #[test]
  fn blank_city_is_reported() {
    let mut addr = address();
    addr.city = "   ".to_string();
    assert_eq!(addr.missing_field(), Some("city"));
  }
}
