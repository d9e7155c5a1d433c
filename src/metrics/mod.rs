//! Windowed metrics aggregation.
//!
//! [`ReportBuilder`] runs every metric against one borrowed
//! [`RegistrySnapshot`], so all windows of a report observe the same records.

pub mod eservices;
pub mod model;
pub mod tenants;
pub mod timeseries;
pub mod variation;
pub mod window;

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::category;
use crate::clock::Clock;
use crate::source::{Agreement, EService, RegistrySnapshot, Tenant};

use self::model::MetricsOutput;
use self::timeseries::Jump;
use self::window::{within, Windowed};

/// Default number of entries kept by "top" rankings.
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// Tunables of a report run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    /// Entries kept by each "top" ranking.
    pub top_limit: usize,
    /// Bucket jump of the signup trend, per window.
    pub signup_jumps: Windowed<Jump>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            top_limit: DEFAULT_TOP_LIMIT,
            signup_jumps: Windowed {
                last_six_months: Jump::weeks(1),
                last_twelve_months: Jump::weeks(2),
                from_the_beginning: Jump::months(1),
            },
        }
    }
}

/// Lookup tables over a snapshot, shared by the metric functions.
pub struct RegistryIndex<'a> {
    snapshot: &'a RegistrySnapshot,
    tenants: HashMap<&'a str, &'a Tenant>,
    eservices: HashMap<&'a str, &'a EService>,
}

impl<'a> RegistryIndex<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot) -> Self {
        let tenants = snapshot
            .tenants
            .iter()
            .map(|tenant| (tenant.id.as_str(), tenant))
            .collect();
        let eservices = snapshot
            .eservices
            .iter()
            .map(|eservice| (eservice.id.as_str(), eservice))
            .collect();

        Self {
            snapshot,
            tenants,
            eservices,
        }
    }

    pub fn tenants(&self) -> &'a [Tenant] {
        &self.snapshot.tenants
    }

    /// Tenants holding an onboarding date.
    pub fn onboarded(&self) -> impl Iterator<Item = (&'a Tenant, DateTime<Utc>)> + 'a {
        self.snapshot
            .tenants
            .iter()
            .filter_map(|tenant| tenant.onboarded_at.map(|at| (tenant, at)))
    }

    /// Published e-services with their publication date.
    pub fn published(&self) -> impl Iterator<Item = (&'a EService, DateTime<Utc>)> + 'a {
        self.snapshot
            .eservices
            .iter()
            .filter_map(|eservice| eservice.published_at.map(|at| (eservice, at)))
    }

    /// Agreements activated inside the window starting at `cutoff`.
    pub fn agreements_since(
        &self,
        cutoff: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &'a Agreement> + 'a {
        self.snapshot
            .agreements
            .iter()
            .filter(move |agreement| within(agreement.activated_at, cutoff))
    }

    /// Position in the taxonomy of the tenant's macro-category.
    ///
    /// Unknown tenants and uncategorized codes both yield `None`.
    pub fn category_position(&self, tenant_id: &str) -> Option<usize> {
        self.tenants
            .get(tenant_id)
            .and_then(|tenant| tenant.category_code.as_deref())
            .and_then(category::position_of)
    }

    /// Display name of a tenant, falling back to its id.
    pub fn tenant_name(&self, tenant_id: &str) -> String {
        self.tenants
            .get(tenant_id)
            .map_or_else(|| tenant_id.to_string(), |tenant| tenant.name.clone())
    }

    pub fn eservice(&self, eservice_id: &str) -> Option<&'a EService> {
        self.eservices.get(eservice_id).copied()
    }
}

/// Sort by count descending, then name ascending, and keep `limit` entries
/// with a non-zero count.
pub(crate) fn rank<T, C, N>(items: &mut Vec<T>, limit: usize, count: C, name: N)
where
    C: Fn(&T) -> u64,
    N: Fn(&T) -> &str,
{
    items.retain(|item| count(item) > 0);
    items.sort_by(|a, b| count(b).cmp(&count(a)).then_with(|| name(a).cmp(name(b))));
    items.truncate(limit);
}

/// Computes every metric of a report against a single snapshot.
pub struct ReportBuilder<C> {
    settings: ReportSettings,
    clock: C,
}

impl<C: Clock> ReportBuilder<C> {
    pub fn new(settings: ReportSettings, clock: C) -> Self {
        Self { settings, clock }
    }

    /// Build the full report. Either every metric is produced or none is.
    pub fn build(&self, snapshot: &RegistrySnapshot) -> Result<MetricsOutput> {
        let started = Instant::now();
        let now = self.clock.now();
        let index = RegistryIndex::new(snapshot);
        let limit = self.settings.top_limit;

        info!(
            %now,
            tenants = snapshot.tenants.len(),
            eservices = snapshot.eservices.len(),
            agreements = snapshot.agreements.len(),
            "building metrics report",
        );

        let output = MetricsOutput {
            published_e_services: timed("publishedEServices", || {
                eservices::published_eservices(&index, now)
            }),
            eservices_by_macro_categories: timed("eservicesByMacroCategories", || {
                eservices::eservices_by_macro_categories(&index)
            }),
            most_subscribed_e_services: timed("mostSubscribedEServices", || {
                eservices::most_subscribed_eservices(&index, now, limit)
            }),
            top_producers_by_subscribers: timed("topProducersBySubscribers", || {
                eservices::top_producers_by_subscribers(&index, now, limit)
            }),
            onboarded_tenants_count: timed("onboardedTenantsCount", || {
                tenants::onboarded_tenants_count(&index, now)
            }),
            tenant_distribution: timed("tenantDistribution", || {
                tenants::tenant_distribution(&index)
            }),
            tenant_signups_trend: timed("tenantSignupsTrend", || {
                tenants::tenant_signups_trend(&index, now, &self.settings.signup_jumps)
            })
            .context("computing tenantSignupsTrend")?,
            onboarded_tenants_count_by_macro_categories: timed(
                "onboardedTenantsCountByMacroCategories",
                || tenants::onboarded_tenants_count_by_macro_categories(&index, now),
            ),
            top_producers: timed("topProducers", || {
                eservices::top_producers(&index, now, limit)
            }),
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "metrics report built",
        );

        Ok(output)
    }
}

fn timed<T>(metric: &'static str, compute: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let value = compute();
    debug!(
        metric,
        elapsed_us = started.elapsed().as_micros() as u64,
        "metric computed",
    );
    value
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::FixedClock;
    use crate::metrics::timeseries::BucketizeError;

    fn tenant(id: &str, code: Option<&str>) -> Tenant {
        Tenant {
            id: id.to_string(),
            name: format!("Tenant {id}"),
            category_code: code.map(str::to_string),
            attributes: Vec::new(),
            onboarded_at: None,
        }
    }

    #[test]
    fn test_category_position_resolution() {
        let snapshot = RegistrySnapshot {
            tenants: vec![
                tenant("a", Some("L6")),
                tenant("b", Some("ZZZ")),
                tenant("c", None),
            ],
            ..Default::default()
        };
        let index = RegistryIndex::new(&snapshot);

        assert_eq!(index.category_position("a"), Some(2));
        assert_eq!(index.category_position("b"), None);
        assert_eq!(index.category_position("c"), None);
        assert_eq!(index.category_position("missing"), None);
        assert_eq!(index.tenant_name("a"), "Tenant a");
        assert_eq!(index.tenant_name("missing"), "missing");
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let mut items: Vec<(&str, u64)> = vec![("b", 3), ("a", 3), ("c", 5), ("z", 0), ("d", 1)];
        rank(&mut items, 3, |item| item.1, |item| item.0);
        assert_eq!(items, vec![("c", 5), ("a", 3), ("b", 3)]);
    }

    #[test]
    fn test_build_on_empty_snapshot() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let builder = ReportBuilder::new(ReportSettings::default(), FixedClock::new(now));

        let output = builder.build(&RegistrySnapshot::default()).expect("report");

        assert_eq!(output.published_e_services.count, 0);
        assert_eq!(output.published_e_services.variation, 0.0);
        assert_eq!(output.eservices_by_macro_categories.len(), 10);
        assert_eq!(output.tenant_distribution.len(), 4);
        assert!(output.top_producers.from_the_beginning.is_empty());
        let trend = &output.tenant_signups_trend.from_the_beginning;
        assert_eq!(trend.len(), 10);
        assert_eq!(trend[0].data.len(), 1);
        assert_eq!(trend[0].starting_date, now);
    }

    #[test]
    fn test_build_rejects_zero_jump() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let mut settings = ReportSettings::default();
        settings.signup_jumps.last_twelve_months = Jump::days(0);
        let builder = ReportBuilder::new(settings, FixedClock::new(now));

        let err = builder.build(&RegistrySnapshot::default()).unwrap_err();
        assert!(err.to_string().contains("tenantSignupsTrend"));
        assert!(err.downcast_ref::<BucketizeError>().is_some());
    }
}
