use async_trait::async_trait;
use std::sync::Mutex;

use crate::billing::{BillingError, BillingProvider};

/// Records cancellations instead of sending them. Used when billing is disabled
/// and in tests.
#[derive(Default)]
pub struct MockBillingProvider {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("Lock was poisoned").clone()
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<(), BillingError> {
        self.calls
            .lock()
            .expect("Lock was poisoned")
            .push(String::from(provider_subscription_id));

        if self.fail {
            return Err(BillingError::RequestFailed(String::from(
                "Mock provider configured to fail",
            )));
        }

        log::info!("Billing disabled; not cancelling subscription {provider_subscription_id}");
        Ok(())
    }
}
