use chrono::{DateTime, Utc};
use serde::Serialize;

use super::timeseries::TimeseriesPoint;
use super::window::Windowed;

/// Serializes timestamps as ISO-8601 UTC with millisecond precision
/// (`2024-01-31T00:00:00.000Z`).
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Published e-services with last-month growth.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedEServicesMetric {
    pub count: u64,
    pub last_month_count: u64,
    pub variation: f64,
}

/// Count of published e-services for one macro-category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroCategoryCount {
    pub id: &'static str,
    pub name: &'static str,
    pub count: u64,
}

pub type EServicesByMacroCategoriesMetric = Vec<MacroCategoryCount>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedEService {
    pub eservice_name: String,
    pub producer_name: String,
    pub subscribers_count: u64,
}

/// Most-subscribed e-services among the consumers of one macro-category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostSubscribedEServices {
    pub id: &'static str,
    pub name: &'static str,
    pub most_subscribed_e_services: Windowed<Vec<SubscribedEService>>,
}

pub type MostSubscribedEServicesMetric = Vec<MostSubscribedEServices>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroCategorySubscribers {
    pub id: &'static str,
    pub name: &'static str,
    pub subscribers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerSubscribers {
    pub producer_name: String,
    pub macro_categories: Vec<MacroCategorySubscribers>,
}

pub type TopProducersBySubscribersMetric = Windowed<Vec<ProducerSubscribers>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardedTenantsCountMetric {
    pub total_tenants_count: u64,
    pub last_month_tenants_count: u64,
    pub variation: f64,
}

/// Role of an onboarded tenant in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TenantRole {
    #[serde(rename = "Solo fruitore")]
    ConsumerOnly,
    #[serde(rename = "Solo erogatore")]
    ProducerOnly,
    #[serde(rename = "Sia fruitore che erogatore")]
    ConsumerAndProducer,
    #[serde(rename = "Solo primo accesso")]
    FirstAccessOnly,
}

impl TenantRole {
    pub const ALL: [TenantRole; 4] = [
        TenantRole::ConsumerOnly,
        TenantRole::ProducerOnly,
        TenantRole::ConsumerAndProducer,
        TenantRole::FirstAccessOnly,
    ];

    pub fn from_activity(is_consumer: bool, is_producer: bool) -> Self {
        match (is_consumer, is_producer) {
            (true, false) => Self::ConsumerOnly,
            (false, true) => Self::ProducerOnly,
            (true, true) => Self::ConsumerAndProducer,
            (false, false) => Self::FirstAccessOnly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantDistributionEntry {
    pub label: TenantRole,
    pub count: u64,
}

pub type TenantDistributionMetric = Vec<TenantDistributionEntry>;

/// Cumulative onboarding series for one macro-category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupsTrend {
    pub id: &'static str,
    pub name: &'static str,
    pub data: Vec<TimeseriesPoint>,
    #[serde(with = "iso_millis")]
    pub starting_date: DateTime<Utc>,
}

pub type TenantSignupsTrendMetric = Windowed<Vec<SignupsTrend>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardedVersusTotal {
    pub id: &'static str,
    pub name: &'static str,
    pub onboarded_count: u64,
    pub total_count: u64,
}

pub type OnboardedTenantsCountByMacroCategoriesMetric = Windowed<Vec<OnboardedVersusTotal>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProducer {
    pub producer_name: String,
    pub count: u64,
}

pub type TopProducersMetric = Windowed<Vec<TopProducer>>;

/// Every metric of one report run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOutput {
    pub published_e_services: PublishedEServicesMetric,
    pub eservices_by_macro_categories: EServicesByMacroCategoriesMetric,
    pub most_subscribed_e_services: MostSubscribedEServicesMetric,
    pub top_producers_by_subscribers: TopProducersBySubscribersMetric,
    pub onboarded_tenants_count: OnboardedTenantsCountMetric,
    pub tenant_distribution: TenantDistributionMetric,
    pub tenant_signups_trend: TenantSignupsTrendMetric,
    pub onboarded_tenants_count_by_macro_categories: OnboardedTenantsCountByMacroCategoriesMetric,
    pub top_producers: TopProducersMetric,
}

/// Camel-case names of the metrics, in [`MetricsOutput`] field order.
pub const METRIC_NAMES: [&str; 9] = [
    "publishedEServices",
    "eservicesByMacroCategories",
    "mostSubscribedEServices",
    "topProducersBySubscribers",
    "onboardedTenantsCount",
    "tenantDistribution",
    "tenantSignupsTrend",
    "onboardedTenantsCountByMacroCategories",
    "topProducers",
];

impl MetricsOutput {
    /// Each metric as a standalone JSON value, paired with its name.
    pub fn named_values(&self) -> serde_json::Result<Vec<(&'static str, serde_json::Value)>> {
        Ok(vec![
            (METRIC_NAMES[0], serde_json::to_value(&self.published_e_services)?),
            (METRIC_NAMES[1], serde_json::to_value(&self.eservices_by_macro_categories)?),
            (METRIC_NAMES[2], serde_json::to_value(&self.most_subscribed_e_services)?),
            (METRIC_NAMES[3], serde_json::to_value(&self.top_producers_by_subscribers)?),
            (METRIC_NAMES[4], serde_json::to_value(&self.onboarded_tenants_count)?),
            (METRIC_NAMES[5], serde_json::to_value(&self.tenant_distribution)?),
            (METRIC_NAMES[6], serde_json::to_value(&self.tenant_signups_trend)?),
            (
                METRIC_NAMES[7],
                serde_json::to_value(&self.onboarded_tenants_count_by_macro_categories)?,
            ),
            (METRIC_NAMES[8], serde_json::to_value(&self.top_producers)?),
        ])
    }
}
