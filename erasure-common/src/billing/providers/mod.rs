mod mock;
mod stripe;

pub use mock::MockBillingProvider;
pub use stripe::{StripeBillingProvider, STRIPE_API_BASE};
