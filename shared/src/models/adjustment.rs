//! Manual stock adjustments and the idempotent posting contract

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an adjustment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    #[default]
    Manual,
    Correction,
}

impl AdjustmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentType::Manual => "manual",
            AdjustmentType::Correction => "correction",
        }
    }
}

impl std::str::FromStr for AdjustmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(AdjustmentType::Manual),
            "correction" => Ok(AdjustmentType::Correction),
            other => Err(format!("unknown adjustment type: {}", other)),
        }
    }
}

/// One signed quantity change in an adjustment request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdjustmentDetail {
    pub product_id: i64,
    pub quantity: i64,
}

/// Request to post one new adjustment record.
///
/// `client_request_id` identifies the user's intent; replaying the same id
/// must not apply the adjustment twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentRequest {
    pub client_request_id: String,
    pub adjustment_type: AdjustmentType,
    pub transaction_date: DateTime<Utc>,
    pub remarks: String,
    pub details: Vec<AdjustmentDetail>,
}

impl AdjustmentRequest {
    /// Sum of all detail quantities
    pub fn net_delta(&self) -> i64 {
        net_delta(&self.details)
    }
}

/// Sum of signed detail quantities
pub fn net_delta(details: &[AdjustmentDetail]) -> i64 {
    details.iter().map(|d| d.quantity).sum()
}

/// A posted adjustment header with its lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Adjustment {
    pub id: i64,
    pub client_request_id: String,
    pub adjustment_type: AdjustmentType,
    pub transaction_date: DateTime<Utc>,
    pub remarks: Option<String>,
    pub lines: Vec<AdjustmentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentLine {
    pub id: i64,
    pub adjustment_id: i64,
    pub product_id: Option<i64>,
    pub quantity: i64,
}

/// One user action that should result in at most one adjustment.
///
/// The request id is generated when the intent is created. Retrying the
/// same intent resends the same id; a new click must create a new intent.
#[derive(Debug, Clone)]
pub struct AdjustmentIntent {
    request: AdjustmentRequest,
}

impl AdjustmentIntent {
    /// Start a new intent with a freshly generated request id
    pub fn new(
        adjustment_type: AdjustmentType,
        remarks: impl Into<String>,
        details: Vec<AdjustmentDetail>,
    ) -> Self {
        Self::with_request_id(Uuid::new_v4().to_string(), adjustment_type, remarks, details)
    }

    /// Resume an intent whose id was generated by the client
    pub fn with_request_id(
        client_request_id: impl Into<String>,
        adjustment_type: AdjustmentType,
        remarks: impl Into<String>,
        details: Vec<AdjustmentDetail>,
    ) -> Self {
        Self {
            request: AdjustmentRequest {
                client_request_id: client_request_id.into(),
                adjustment_type,
                transaction_date: Utc::now(),
                remarks: remarks.into(),
                details,
            },
        }
    }

    /// Single-product intent for a net delta
    pub fn for_product(
        product_id: i64,
        net_delta: i64,
        adjustment_type: AdjustmentType,
        remarks: impl Into<String>,
    ) -> Self {
        Self::new(
            adjustment_type,
            remarks,
            vec![AdjustmentDetail {
                product_id,
                quantity: net_delta,
            }],
        )
    }

    pub fn client_request_id(&self) -> &str {
        &self.request.client_request_id
    }

    pub fn request(&self) -> &AdjustmentRequest {
        &self.request
    }
}

/// Result of posting an adjustment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PostOutcome {
    /// A new adjustment record was created
    Posted {
        adjustment: Adjustment,
        net_delta: i64,
    },
    /// The request id had already been applied; nothing new was written
    DuplicateIgnored { client_request_id: String },
}

impl PostOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PostOutcome::DuplicateIgnored { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_delta_sums_signed_quantities() {
        let details = vec![
            AdjustmentDetail { product_id: 1, quantity: 4 },
            AdjustmentDetail { product_id: 2, quantity: -6 },
        ];
        assert_eq!(net_delta(&details), -2);
    }

    #[test]
    fn test_intent_keeps_its_request_id() {
        let intent = AdjustmentIntent::for_product(3, 2, AdjustmentType::Correction, "recount");
        let first = intent.request().client_request_id.clone();
        let retry = intent.clone();
        assert_eq!(retry.client_request_id(), first);
    }

    #[test]
    fn test_distinct_intents_get_distinct_ids() {
        let a = AdjustmentIntent::for_product(3, 2, AdjustmentType::Manual, "a");
        let b = AdjustmentIntent::for_product(3, 2, AdjustmentType::Manual, "a");
        assert_ne!(a.client_request_id(), b.client_request_id());
    }

    #[test]
    fn test_adjustment_type_parse() {
        assert_eq!("correction".parse::<AdjustmentType>().unwrap(), AdjustmentType::Correction);
        assert!("bogus".parse::<AdjustmentType>().is_err());
    }

    #[test]
    fn test_post_outcome_serializes_with_tag() {
        let outcome = PostOutcome::DuplicateIgnored {
            client_request_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "duplicate_ignored");
        assert_eq!(json["client_request_id"], "abc");
    }
}
