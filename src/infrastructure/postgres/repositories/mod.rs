pub mod payment_attempts;
pub mod subscriptions;
