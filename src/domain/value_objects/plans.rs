use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Limits and feature flags attached to a plan.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PlanFeatures {
    #[serde(default)]
    pub max_devices: Option<i32>,

    #[serde(default)]
    pub max_tracking_links: Option<i32>,

    #[serde(default)]
    pub priority_support: Option<bool>,

    #[serde(default)]
    pub analytics_access: Option<bool>,
}

impl PlanFeatures {
    pub fn max_devices_or_default(&self) -> i32 {
        self.max_devices.unwrap_or(1)
    }

    pub fn has_priority_support(&self) -> bool {
        self.priority_support.unwrap_or(false)
    }

    pub fn has_analytics_access(&self) -> bool {
        self.analytics_access.unwrap_or(false)
    }
}

/// One purchasable plan. Immutable at runtime; catalog changes ship as a new
/// catalog file deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: Uuid,
    pub display_name: String,
    pub price_minor: i32,
    pub currency: String,
    pub period_days: i32,
    #[serde(default)]
    pub features: PlanFeatures,
}

/// Static registry of purchasable plans, loaded once from configuration.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Result<Self> {
        if plans.is_empty() {
            bail!("plan catalog must contain at least one plan");
        }

        for plan in &plans {
            if plan.price_minor <= 0 {
                bail!("plan {} has a non-positive price", plan.id);
            }
            if plan.period_days <= 0 {
                bail!("plan {} has a non-positive period", plan.id);
            }
            if plan.currency.trim().is_empty() {
                bail!("plan {} is missing a currency", plan.id);
            }
        }

        let mut ids: Vec<Uuid> = plans.iter().map(|plan| plan.id).collect();
        ids.sort();
        ids.dedup();
        if ids.len() != plans.len() {
            bail!("plan catalog contains duplicate plan ids");
        }

        Ok(Self { plans })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let plans: Vec<Plan> = serde_json::from_str(raw)?;
        Self::new(plans)
    }

    pub fn find(&self, plan_id: Uuid) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == plan_id)
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }
}

#[derive(Debug, Serialize)]
pub struct PlanDto {
    pub id: Uuid,
    pub display_name: String,
    pub price_minor: i32,
    pub currency: String,
    pub period_days: i32,
    pub features: PlanFeatures,
}

impl From<&Plan> for PlanDto {
    fn from(value: &Plan) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name.clone(),
            price_minor: value.price_minor,
            currency: value.currency.clone(),
            period_days: value.period_days,
            features: value.features.clone(),
        }
    }
}
