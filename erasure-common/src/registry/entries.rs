use crate::registry::ClassificationEntry;

/// Bump whenever an entry is added, removed, or reclassified.
pub const REGISTRY_VERSION: u32 = 3;

pub const ROOT_ENTITY: &str = "user";

pub static ENTRIES: &[ClassificationEntry] = &[
    // Auth
    ClassificationEntry::hard_delete("user", &["id"]),
    ClassificationEntry::hard_delete("session", &["userId"]),
    ClassificationEntry::hard_delete("account", &["userId"]),
    ClassificationEntry::hard_delete("user_sessions", &["user_id"]),
    ClassificationEntry::hard_delete("api_keys", &["user_id"]),
    // Profile and billing
    ClassificationEntry::hard_delete("user_profiles", &["user_id"]),
    ClassificationEntry::hard_delete("subscriptions", &["user_id"]),
    ClassificationEntry::hard_delete("push_subscriptions", &["user_id"]),
    // Content the user created
    ClassificationEntry::hard_delete("tarot_readings", &["user_id"]),
    ClassificationEntry::hard_delete("user_notes", &["user_id"]),
    ClassificationEntry::hard_delete("journal_patterns", &["user_id"]),
    ClassificationEntry::hard_delete("user_streaks", &["user_id"]),
    ClassificationEntry::hard_delete("ai_threads", &["user_id"]),
    ClassificationEntry::hard_delete("ai_usage", &["user_id"]),
    ClassificationEntry::hard_delete("daily_thread_modules", &["user_id"]),
    ClassificationEntry::hard_delete("tour_progress", &["user_id"]),
    ClassificationEntry::hard_delete("email_events", &["user_id"]),
    ClassificationEntry::hard_delete("testimonial_feedback_events", &["user_id"]),
    // Relations between users
    ClassificationEntry::hard_delete("friend_connections", &["user_id", "friend_id"]),
    ClassificationEntry::hard_delete("referrals", &["referrer_user_id", "referred_user_id"]),
    // Kept for aggregate analytics and accounting
    ClassificationEntry::anonymize(
        "conversion_events",
        &["user_id"],
        &["user_id", "user_email"],
    ),
    ClassificationEntry::anonymize("shop_purchases", &["user_id"], &["user_id"]),
    ClassificationEntry::anonymize(
        "legacy_fallback_usage",
        &["user_id"],
        &["user_id", "user_email"],
    ),
    ClassificationEntry::anonymize("ritual_message_events", &["user_id"], &["user_id"]),
    // Legal retention
    ClassificationEntry::preserve("consent_log", &["user_id"]),
    ClassificationEntry::preserve("deletion_requests", &["user_id"]),
];
