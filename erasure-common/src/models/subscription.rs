use diesel::Queryable;
use serde::{Deserialize, Serialize};

use crate::schema::subscriptions;

/// Statuses under which the billing provider is still charging the customer.
pub const ACTIVE_SUBSCRIPTION_STATUSES: [&str; 4] = ["active", "trial", "trialing", "past_due"];

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: i32,
    pub user_id: String,
    pub user_email: Option<String>,
    pub status: String,
    pub plan_type: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        ACTIVE_SUBSCRIPTION_STATUSES.contains(&self.status.as_str())
    }
}
