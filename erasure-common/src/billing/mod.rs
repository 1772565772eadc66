pub mod providers;

use async_trait::async_trait;
use std::fmt;

use crate::db::DaoError;

#[derive(Debug)]
pub enum BillingError {
    RequestFailed(String),
    Rejected { status: u16, message: String },
}

impl std::error::Error for BillingError {}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingError::RequestFailed(e) => {
                write!(f, "BillingError: Request to billing provider failed: {e}")
            }
            BillingError::Rejected { status, message } => {
                write!(
                    f,
                    "BillingError: Billing provider rejected request ({status}): {message}"
                )
            }
        }
    }
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cancels a subscription immediately. A subscription the provider no longer
    /// knows about counts as cancelled.
    async fn cancel_subscription(&self, provider_subscription_id: &str)
        -> Result<(), BillingError>;
}

/// Finds the billing provider reference for a user's live subscription.
#[async_trait]
pub trait EntitlementLookup: Send + Sync {
    async fn active_provider_subscription_id(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, DaoError>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum CancellationOutcome {
    Cancelled { provider_subscription_id: String },
    NotApplicable,
    Failed(String),
}

/// Best-effort cancellation of a user's billing entitlement. Failures are
/// reported in the outcome and logged, never returned as errors, so they cannot
/// hold up the erasure that follows.
pub struct EntitlementCanceller<'a, L: EntitlementLookup + ?Sized> {
    lookup: &'a L,
    provider: &'a dyn BillingProvider,
}

impl<'a, L: EntitlementLookup + ?Sized> EntitlementCanceller<'a, L> {
    pub fn new(lookup: &'a L, provider: &'a dyn BillingProvider) -> Self {
        Self { lookup, provider }
    }

    pub async fn cancel_for_user(&self, user_id: &str) -> CancellationOutcome {
        let provider_subscription_id =
            match self.lookup.active_provider_subscription_id(user_id).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    log::debug!("No active subscription to cancel for user {user_id}");
                    return CancellationOutcome::NotApplicable;
                }
                Err(e) => {
                    log::warn!("Failed to look up subscription for user {user_id}: {e}");
                    return CancellationOutcome::Failed(e.to_string());
                }
            };

        match self
            .provider
            .cancel_subscription(&provider_subscription_id)
            .await
        {
            Ok(()) => {
                log::info!(
                    "Cancelled {} subscription {} for user {}",
                    self.provider.name(),
                    provider_subscription_id,
                    user_id
                );
                CancellationOutcome::Cancelled {
                    provider_subscription_id,
                }
            }
            Err(e) => {
                log::warn!(
                    "Failed to cancel {} subscription {} for user {}: {}",
                    self.provider.name(),
                    provider_subscription_id,
                    user_id,
                    e
                );
                CancellationOutcome::Failed(e.to_string())
            }
        }
    }
}
