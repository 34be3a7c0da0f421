use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Active,
    Inactive,
    Blocked,
}

/// Customer credit line as reported by the credit service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditProfile {
    pub customer_id: String,
    pub status: CreditStatus,
    pub credit_limit: i64,
    pub available_credit: i64,
}

impl CreditProfile {
    pub fn is_active(&self) -> bool {
        self.status == CreditStatus::Active
    }

    pub fn covers(&self, amount: i64) -> bool {
        self.available_credit >= amount
    }
}

#[async_trait]
pub trait CreditProfileLookup: Send + Sync {
    /// Look up a customer's credit line; `Ok(None)` when the customer has none
    async fn find(&self, customer_id: &str) -> Result<Option<CreditProfile>, CoreError>;
}

/// In-memory credit table.
#[derive(Default)]
pub struct StaticCreditLookup {
    profiles: HashMap<String, CreditProfile>,
}

impl StaticCreditLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: CreditProfile) -> Self {
        self.profiles.insert(profile.customer_id.clone(), profile);
        self
    }
}

#[async_trait]
impl CreditProfileLookup for StaticCreditLookup {
    async fn find(&self, customer_id: &str) -> Result<Option<CreditProfile>, CoreError> {
        Ok(self.profiles.get(customer_id).cloned())
    }
}
