//! Tenant onboarding metrics.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::category::{self, MACRO_CATEGORY_COUNT};

use super::model::{
    OnboardedTenantsCountByMacroCategoriesMetric, OnboardedTenantsCountMetric,
    OnboardedVersusTotal, SignupsTrend, TenantDistributionEntry, TenantDistributionMetric,
    TenantRole, TenantSignupsTrendMetric,
};
use super::timeseries::{bucketize, BucketizeError, Jump};
use super::variation::variation_percent;
use super::window::{months_before, within, Windowed};
use super::RegistryIndex;

/// Onboarded tenants, and how many of them onboarded last month.
pub fn onboarded_tenants_count(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
) -> OnboardedTenantsCountMetric {
    let last_month = months_before(now, 1);

    let mut total = 0u64;
    let mut last_month_count = 0u64;
    for (_, onboarded_at) in index.onboarded() {
        total += 1;
        if onboarded_at >= last_month {
            last_month_count += 1;
        }
    }

    OnboardedTenantsCountMetric {
        total_tenants_count: total,
        last_month_tenants_count: last_month_count,
        variation: variation_percent(last_month_count, total),
    }
}

/// Onboarded tenants by the role they play: consumer (holds an agreement),
/// producer (publishes an e-service), both, or neither.
pub fn tenant_distribution(index: &RegistryIndex<'_>) -> TenantDistributionMetric {
    let consumers: HashSet<&str> = index
        .agreements_since(None)
        .map(|agreement| agreement.consumer_id.as_str())
        .collect();
    let producers: HashSet<&str> = index
        .published()
        .map(|(eservice, _)| eservice.producer_id.as_str())
        .collect();

    let mut counts: HashMap<TenantRole, u64> = HashMap::with_capacity(TenantRole::ALL.len());
    for (tenant, _) in index.onboarded() {
        let role = TenantRole::from_activity(
            consumers.contains(tenant.id.as_str()),
            producers.contains(tenant.id.as_str()),
        );
        *counts.entry(role).or_insert(0) += 1;
    }

    TenantRole::ALL
        .iter()
        .map(|role| TenantDistributionEntry {
            label: *role,
            count: counts.get(role).copied().unwrap_or(0),
        })
        .collect()
}

/// Cumulative onboardings per macro-category, bucketized over each window.
///
/// Bounded windows start at their cutoff; the unbounded one starts at the
/// earliest onboarding in the registry, or at `now` if nobody onboarded.
pub fn tenant_signups_trend(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
    jumps: &Windowed<Jump>,
) -> Result<TenantSignupsTrendMetric, BucketizeError> {
    let mut onboardings: Vec<Vec<DateTime<Utc>>> = vec![Vec::new(); MACRO_CATEGORY_COUNT];
    let mut earliest: Option<DateTime<Utc>> = None;

    for (tenant, onboarded_at) in index.onboarded() {
        earliest = Some(earliest.map_or(onboarded_at, |at| at.min(onboarded_at)));
        if let Some(position) = index.category_position(&tenant.id) {
            onboardings[position].push(onboarded_at);
        }
    }

    Windowed::try_build(|window| {
        let oldest_date = window.cutoff(now).or(earliest).unwrap_or(now);
        let jump = *jumps.get(window);

        category::all()
            .iter()
            .zip(&onboardings)
            .map(|(category, events)| {
                let data = bucketize(now, oldest_date, jump, events)?;
                Ok(SignupsTrend {
                    id: category.id,
                    name: category.name,
                    data,
                    starting_date: oldest_date,
                })
            })
            .collect::<Result<Vec<_>, BucketizeError>>()
    })
}

/// Per macro-category, tenants onboarded inside each window against all
/// tenants of the category.
pub fn onboarded_tenants_count_by_macro_categories(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
) -> OnboardedTenantsCountByMacroCategoriesMetric {
    let mut totals = [0u64; MACRO_CATEGORY_COUNT];
    for tenant in index.tenants() {
        if let Some(position) = index.category_position(&tenant.id) {
            totals[position] += 1;
        }
    }

    Windowed::build(now, |cutoff| {
        let mut onboarded = [0u64; MACRO_CATEGORY_COUNT];
        for (tenant, onboarded_at) in index.onboarded() {
            if !within(onboarded_at, cutoff) {
                continue;
            }
            if let Some(position) = index.category_position(&tenant.id) {
                onboarded[position] += 1;
            }
        }

        category::all()
            .iter()
            .enumerate()
            .map(|(position, category)| OnboardedVersusTotal {
                id: category.id,
                name: category.name,
                onboarded_count: onboarded[position],
                total_count: totals[position],
            })
            .collect()
    })
}
