//! Best-effort location suggestions merged from several providers

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::geocoding::{GeocodingProvider, ProviderResult};
use crate::models::Suggestion;

/// Shortest trimmed query that is worth sending upstream
pub const MIN_QUERY_CHARS: usize = 2;

pub struct AutocompleteAggregator {
    providers: Vec<Box<dyn GeocodingProvider>>,
    limit: usize,
    timeout: Duration,
}

impl AutocompleteAggregator {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn GeocodingProvider>>, limit: usize, timeout: Duration) -> Self {
        Self {
            providers,
            limit,
            timeout,
        }
    }

    /// Suggestions in provider priority order, deduplicated by rounded coordinates.
    /// Never fails: provider errors and timeouts only shrink the list.
    pub async fn suggest(&self, partial: &str) -> Vec<Suggestion> {
        let query = partial.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut suggestions = Vec::with_capacity(self.limit);

        for provider in &self.providers {
            if suggestions.len() >= self.limit {
                break;
            }

            let outcome = tokio::time::timeout(self.timeout, provider.suggest(query, self.limit)).await;
            let found = match outcome {
                Ok(ProviderResult::Found(found)) => found,
                Ok(ProviderResult::NotFound) => {
                    debug!("{} had no suggestions for '{}'", provider.name(), query);
                    continue;
                }
                Ok(ProviderResult::Unavailable(reason)) => {
                    warn!("{} autocomplete unavailable: {}", provider.name(), reason);
                    continue;
                }
                Err(_) => {
                    warn!(
                        "{} autocomplete timed out after {:.1}s",
                        provider.name(),
                        self.timeout.as_secs_f64()
                    );
                    continue;
                }
            };

            for suggestion in found {
                if suggestions.len() >= self.limit {
                    break;
                }
                if seen.insert(suggestion.dedup_key()) {
                    suggestions.push(suggestion);
                }
            }
        }

        debug!("{} suggestions for '{}'", suggestions.len(), query);
        suggestions
    }
}
