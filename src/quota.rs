//! Subscription tiers and their resource envelopes.

use crate::model::QuotaEnvelope;
use crate::store::BuildStore;
use std::time::Duration;
use tracing::warn;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// Resolves a project's quota envelope from its active subscription plan.
/// Any lookup failure quietly degrades to the free tier.
#[derive(Clone)]
pub struct QuotaResolver {
    store: BuildStore,
}

impl QuotaResolver {
    pub fn new(store: BuildStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, project_id: &str) -> QuotaEnvelope {
        match self.store.plan_id(project_id).await {
            Ok(Some(plan)) => envelope_for_plan(&plan),
            Ok(None) => free_tier(),
            Err(e) => {
                warn!(project_id, error = %e, "quota lookup failed, applying free tier");
                free_tier()
            }
        }
    }
}

/// Maps a plan id onto its envelope. Unknown plans get the free tier.
pub fn envelope_for_plan(plan: &str) -> QuotaEnvelope {
    match plan {
        "starter" => QuotaEnvelope {
            plan: "starter".to_string(),
            max_concurrent_builds: 2,
            max_builds_per_hour: 10,
            max_builds_per_day: 40,
            max_build_duration: Duration::from_secs(15 * 60),
            max_build_size: GIB,
            max_services: 3,
            cpu_cores: 2,
            memory_gb: 4,
        },
        "pro" => QuotaEnvelope {
            plan: "pro".to_string(),
            max_concurrent_builds: 5,
            max_builds_per_hour: 30,
            max_builds_per_day: 150,
            max_build_duration: Duration::from_secs(30 * 60),
            max_build_size: 2 * GIB,
            max_services: 8,
            cpu_cores: 4,
            memory_gb: 8,
        },
        "enterprise" => QuotaEnvelope {
            plan: "enterprise".to_string(),
            max_concurrent_builds: 10,
            max_builds_per_hour: 100,
            max_builds_per_day: 500,
            max_build_duration: Duration::from_secs(60 * 60),
            max_build_size: 5 * GIB,
            max_services: 20,
            cpu_cores: 8,
            memory_gb: 16,
        },
        "free" => free_tier(),
        other => {
            warn!(plan = other, "unknown subscription plan, applying free tier");
            free_tier()
        }
    }
}

pub fn free_tier() -> QuotaEnvelope {
    QuotaEnvelope {
        plan: "free".to_string(),
        max_concurrent_builds: 1,
        max_builds_per_hour: 5,
        max_builds_per_day: 20,
        max_build_duration: Duration::from_secs(10 * 60),
        max_build_size: 500 * MIB,
        max_services: 2,
        cpu_cores: 1,
        memory_gb: 2,
    }
}
