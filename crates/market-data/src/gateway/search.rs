//! Merging of per-provider search results.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::cache::StoredResponse;
use crate::models::{NormalizedResponse, SearchHit, SearchResults};
use crate::registry::RoutedResponse;
use crate::resolver::exchange_registry::search_priority;

fn exchange_weight(hit: &SearchHit) -> u8 {
    hit.exchange.as_deref().map(search_priority).unwrap_or(0)
}

fn score(hit: &SearchHit) -> f64 {
    hit.score.unwrap_or(0.0)
}

/// Whether `candidate` should replace `current` for the same instrument.
fn outranks(candidate: &SearchHit, current: &SearchHit) -> bool {
    match exchange_weight(candidate).cmp(&exchange_weight(current)) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => score(candidate) > score(current),
    }
}

/// Merge provider results into one list.
///
/// A stock listed on several exchanges, or returned by several providers,
/// appears once per (code, country): the listing on the higher-priority
/// exchange wins, then the higher relevance score. Results are ordered by
/// score, ties keeping provider priority order, and cut to `limit`.
pub fn merge_results(query: &str, limit: usize, routed: Vec<RoutedResponse>) -> StoredResponse {
    let providers: Vec<String> = routed.iter().map(|r| r.provider.clone()).collect();

    let mut merged: Vec<SearchHit> = Vec::new();
    let mut seen: HashMap<(String, Option<String>), usize> = HashMap::new();

    for response in routed {
        let NormalizedResponse::Search(results) = response.response else {
            continue;
        };
        for hit in results.hits {
            let identity = (hit.code.to_uppercase(), hit.country.clone());
            match seen.get(&identity) {
                Some(&index) => {
                    if outranks(&hit, &merged[index]) {
                        merged[index] = hit;
                    }
                }
                None => {
                    seen.insert(identity, merged.len());
                    merged.push(hit);
                }
            }
        }
    }

    merged.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
    merged.truncate(limit);

    StoredResponse::new(
        providers.join(","),
        NormalizedResponse::Search(SearchResults {
            query: query.to_string(),
            hits: merged,
        }),
    )
}
