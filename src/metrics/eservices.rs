//! E-service and subscription metrics.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::category::{self, MACRO_CATEGORY_COUNT};

use super::model::{
    EServicesByMacroCategoriesMetric, MacroCategoryCount, MacroCategorySubscribers,
    MostSubscribedEServices, MostSubscribedEServicesMetric, ProducerSubscribers,
    PublishedEServicesMetric, SubscribedEService, TopProducer, TopProducersBySubscribersMetric,
    TopProducersMetric,
};
use super::variation::variation_percent;
use super::window::{months_before, within, Windowed};
use super::{rank, RegistryIndex};

/// Published e-services, and how many of them were published last month.
pub fn published_eservices(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
) -> PublishedEServicesMetric {
    let last_month = months_before(now, 1);

    let mut count = 0u64;
    let mut last_month_count = 0u64;
    for (_, published_at) in index.published() {
        count += 1;
        if published_at >= last_month {
            last_month_count += 1;
        }
    }

    PublishedEServicesMetric {
        count,
        last_month_count,
        variation: variation_percent(last_month_count, count),
    }
}

/// Published e-services per producer macro-category, in taxonomy order.
pub fn eservices_by_macro_categories(
    index: &RegistryIndex<'_>,
) -> EServicesByMacroCategoriesMetric {
    let mut counts = [0u64; MACRO_CATEGORY_COUNT];
    for (eservice, _) in index.published() {
        if let Some(position) = index.category_position(&eservice.producer_id) {
            counts[position] += 1;
        }
    }

    category::all()
        .iter()
        .zip(counts)
        .map(|(category, count)| MacroCategoryCount {
            id: category.id,
            name: category.name,
            count,
        })
        .collect()
}

/// For each consumer macro-category, the e-services with the most distinct
/// subscribers of that category.
pub fn most_subscribed_eservices(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
    limit: usize,
) -> MostSubscribedEServicesMetric {
    let per_window = Windowed::build(now, |cutoff| {
        let mut subscribers: Vec<HashMap<&str, HashSet<&str>>> =
            (0..MACRO_CATEGORY_COUNT).map(|_| HashMap::new()).collect();

        for agreement in index.agreements_since(cutoff) {
            if let Some(position) = index.category_position(&agreement.consumer_id) {
                subscribers[position]
                    .entry(agreement.eservice_id.as_str())
                    .or_default()
                    .insert(agreement.consumer_id.as_str());
            }
        }

        subscribers
            .into_iter()
            .map(|by_eservice| {
                let mut ranked: Vec<SubscribedEService> = by_eservice
                    .into_iter()
                    .map(|(eservice_id, consumers)| {
                        let (eservice_name, producer_name) = match index.eservice(eservice_id) {
                            Some(eservice) => (
                                eservice.name.clone(),
                                index.tenant_name(&eservice.producer_id),
                            ),
                            None => (eservice_id.to_string(), String::new()),
                        };
                        SubscribedEService {
                            eservice_name,
                            producer_name,
                            subscribers_count: consumers.len() as u64,
                        }
                    })
                    .collect();
                rank(
                    &mut ranked,
                    limit,
                    |entry| entry.subscribers_count,
                    |entry| entry.eservice_name.as_str(),
                );
                ranked
            })
            .collect::<Vec<_>>()
    });

    category::all()
        .iter()
        .enumerate()
        .map(|(position, category)| MostSubscribedEServices {
            id: category.id,
            name: category.name,
            most_subscribed_e_services: Windowed {
                last_six_months: per_window.last_six_months[position].clone(),
                last_twelve_months: per_window.last_twelve_months[position].clone(),
                from_the_beginning: per_window.from_the_beginning[position].clone(),
            },
        })
        .collect()
}

#[derive(Default)]
struct ProducerReach<'a> {
    consumers: HashSet<&'a str>,
    by_category: [HashSet<&'a str>; MACRO_CATEGORY_COUNT],
}

/// Producers with the most distinct subscribers, broken down by the
/// subscribers' macro-category.
///
/// Uncategorized consumers count toward the ranking but appear in no
/// category row.
pub fn top_producers_by_subscribers(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
    limit: usize,
) -> TopProducersBySubscribersMetric {
    Windowed::build(now, |cutoff| {
        let mut reach: HashMap<&str, ProducerReach<'_>> = HashMap::new();

        for agreement in index.agreements_since(cutoff) {
            let producer = reach.entry(agreement.producer_id.as_str()).or_default();
            producer.consumers.insert(agreement.consumer_id.as_str());
            if let Some(position) = index.category_position(&agreement.consumer_id) {
                producer.by_category[position].insert(agreement.consumer_id.as_str());
            }
        }

        let mut ranked: Vec<(String, ProducerReach<'_>)> = reach
            .into_iter()
            .map(|(producer_id, reach)| (index.tenant_name(producer_id), reach))
            .collect();
        rank(
            &mut ranked,
            limit,
            |(_, reach)| reach.consumers.len() as u64,
            |(name, _)| name.as_str(),
        );

        ranked
            .into_iter()
            .map(|(producer_name, reach)| ProducerSubscribers {
                producer_name,
                macro_categories: category::all()
                    .iter()
                    .zip(reach.by_category.iter())
                    .map(|(category, consumers)| MacroCategorySubscribers {
                        id: category.id,
                        name: category.name,
                        subscribers_count: consumers.len() as u64,
                    })
                    .collect(),
            })
            .collect()
    })
}

/// Producers with the most e-services published inside each window.
pub fn top_producers(
    index: &RegistryIndex<'_>,
    now: DateTime<Utc>,
    limit: usize,
) -> TopProducersMetric {
    Windowed::build(now, |cutoff| {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for (eservice, published_at) in index.published() {
            if within(published_at, cutoff) {
                *counts.entry(eservice.producer_id.as_str()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<TopProducer> = counts
            .into_iter()
            .map(|(producer_id, count)| TopProducer {
                producer_name: index.tenant_name(producer_id),
                count,
            })
            .collect();
        rank(
            &mut ranked,
            limit,
            |entry| entry.count,
            |entry| entry.producer_name.as_str(),
        );
        ranked
    })
}
