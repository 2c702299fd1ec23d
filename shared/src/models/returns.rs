//! Return / replacement requests and their approval workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a return request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnStatus {
    #[serde(rename = "PEND")]
    Pending,
    #[serde(rename = "APPR")]
    Approved,
    #[serde(rename = "POST")]
    Posted,
    #[serde(rename = "REJ")]
    Rejected,
}

impl ReturnStatus {
    /// Status code as stored by the backend
    pub fn code(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "PEND",
            ReturnStatus::Approved => "APPR",
            ReturnStatus::Posted => "POST",
            ReturnStatus::Rejected => "REJ",
        }
    }

    /// Apply a workflow action, returning the next status.
    ///
    /// This is the only place return transitions are decided:
    ///
    /// | from | approve | post | reject |
    /// |------|---------|------|--------|
    /// | PEND | APPR    | -    | REJ    |
    /// | APPR | -       | POST | REJ    |
    /// | POST | -       | -    | -      |
    /// | REJ  | -       | -    | -      |
    pub fn apply(self, action: ReturnAction) -> Result<ReturnStatus, TransitionError> {
        use ReturnAction::*;
        use ReturnStatus::*;

        match (self, action) {
            (Pending, Approve) => Ok(Approved),
            (Approved, Post) => Ok(Posted),
            (Pending, Reject) | (Approved, Reject) => Ok(Rejected),
            (from, action) => Err(TransitionError { from, action }),
        }
    }

    /// Whether records in this state contribute stock movements
    pub fn affects_stock(&self) -> bool {
        matches!(self, ReturnStatus::Posted)
    }
}

impl std::str::FromStr for ReturnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PEND" => Ok(ReturnStatus::Pending),
            "APPR" => Ok(ReturnStatus::Approved),
            "POST" => Ok(ReturnStatus::Posted),
            "REJ" => Ok(ReturnStatus::Rejected),
            other => Err(format!("unknown return status: {}", other)),
        }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Workflow actions on a return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnAction {
    Approve,
    Post,
    Reject,
}

impl std::fmt::Display for ReturnAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnAction::Approve => write!(f, "approve"),
            ReturnAction::Post => write!(f, "post"),
            ReturnAction::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a return in status {from}")]
pub struct TransitionError {
    pub from: ReturnStatus,
    pub action: ReturnAction,
}

/// A return (optionally with replacement) against a sold line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnRecord {
    pub return_id: i64,
    pub sale_detail_id: i64,
    pub quantity: i64,
    pub replacement_product_id: Option<i64>,
    pub return_status: ReturnStatus,
    pub transaction_date: DateTime<Utc>,
    pub remarks: Option<String>,
    /// Idempotency key of the posting, set once the return is posted
    pub posting_key: Option<String>,
}

/// Input for creating a return request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReturn {
    pub sale_detail_id: i64,
    pub quantity: i64,
    pub replacement_product_id: Option<i64>,
    pub transaction_date: DateTime<Utc>,
    pub remarks: Option<String>,
}
