pub mod attempt_statuses;
pub mod decision_actions;
pub mod payment_rails;
pub mod subscription_statuses;
