use crate::domains::discount::repository::DiscountRepository;
use crate::errors::DomainResult;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Counts of discounts moved by one expiry pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    pub expired: u64,
    pub activated: u64,
}

/// Periodic pass that ends finished discounts and starts scheduled ones
pub struct DiscountExpiryChecker {
    repo: Arc<dyn DiscountRepository>,
}

impl DiscountExpiryChecker {
    pub fn new(repo: Arc<dyn DiscountRepository>) -> Self {
        Self { repo }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> DomainResult<ExpiryReport> {
        let expired = self.repo.expire_due(now).await?;
        let activated = self.repo.activate_due(now).await?;

        if expired > 0 || activated > 0 {
            info!("Discount expiry pass: {} expired, {} activated", expired, activated);
        }

        Ok(ExpiryReport { expired, activated })
    }
}
