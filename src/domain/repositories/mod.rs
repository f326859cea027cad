pub mod payment_attempts;
pub mod proof_storage;
pub mod subscriptions;
