//! Aggregation and text rendering of batch results.

use std::collections::HashMap;
use std::time::Duration;

use crate::batch::types::{OperationResult, Outcome, WorkItem};
use crate::market::listing::listing_id;

/// Shown instead of a URL when a created listing's id is missing from the response.
pub const UNKNOWN_LISTING: &str = "created, identifier unknown";

/// Everything one `run_batch` call produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub items: Vec<WorkItem>,
    pub results: Vec<OperationResult>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn new(items: Vec<WorkItem>, results: Vec<OperationResult>, elapsed: Duration) -> Self {
        Self {
            items,
            results,
            elapsed,
        }
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    /// Items per second over the whole batch, counting every outcome.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.results.len() as f64 / secs
        } else {
            0.0
        }
    }

    fn items_by_index(&self) -> HashMap<usize, &WorkItem> {
        self.items.iter().map(|item| (item.index, item)).collect()
    }

    /// Failed items with their original numbering. Skipped items are not included.
    pub fn failed_items(&self) -> Vec<WorkItem> {
        let items = self.items_by_index();
        self.results
            .iter()
            .filter(|r| r.is_failure())
            .filter_map(|r| items.get(&r.index).map(|item| (*item).clone()))
            .collect()
    }

    /// One line per created listing: its public URL, or the unknown-id marker.
    pub fn created_listing_lines(&self, listing_base: &str) -> Vec<String> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Success { response_data } => Some(
                    listing_id(response_data)
                        .map(|id| listing_url(listing_base, &id))
                        .unwrap_or_else(|| UNKNOWN_LISTING.to_string()),
                ),
                _ => None,
            })
            .collect()
    }

    /// URLs of listings that were removed; the work item payload is the listing id.
    pub fn removed_listing_lines(&self, listing_base: &str) -> Vec<String> {
        let items = self.items_by_index();
        self.results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| listing_url(listing_base, subject(&items, r.index)))
            .collect()
    }

    pub fn upload_failure_lines(&self) -> Vec<String> {
        let items = self.items_by_index();
        self.results
            .iter()
            .filter_map(|r| {
                let message = r.error_message()?;
                let login = r
                    .login
                    .as_deref()
                    .unwrap_or_else(|| subject(&items, r.index));
                Some(format!("Item {} ({}) - {}", r.index, login, message))
            })
            .collect()
    }

    pub fn remove_failure_lines(&self, listing_base: &str) -> Vec<String> {
        let items = self.items_by_index();
        self.results
            .iter()
            .filter_map(|r| {
                let message = r.error_message()?;
                Some(format!(
                    "{} | {}",
                    listing_url(listing_base, subject(&items, r.index)),
                    message
                ))
            })
            .collect()
    }

    pub fn upload_summary(&self) -> String {
        let mut summary = format!(
            "Upload finished in {:.2}s\nSucceeded: {}\nFailed: {}\n",
            self.elapsed.as_secs_f64(),
            self.success_count(),
            self.failure_count()
        );
        if self.skipped_count() > 0 {
            summary.push_str(&format!("Skipped (already listed): {}\n", self.skipped_count()));
        }
        summary.push_str(&format!("Throughput: {:.2} items/s", self.throughput()));
        summary
    }

    pub fn remove_summary(&self) -> String {
        format!(
            "Removal finished in {:.2}s\nRemoved: {}\nFailed: {}",
            self.elapsed.as_secs_f64(),
            self.success_count(),
            self.failure_count()
        )
    }
}

fn subject<'a>(items: &HashMap<usize, &'a WorkItem>, index: usize) -> &'a str {
    items
        .get(&index)
        .map(|item| item.payload.as_str())
        .unwrap_or_default()
}

pub fn listing_url(listing_base: &str, item_id: &str) -> String {
    format!("{}/{}/", listing_base.trim_end_matches('/'), item_id)
}

/// Group lines into pages of at most `per_page` lines each.
pub fn paginate(lines: &[String], per_page: usize, separator: &str) -> Vec<String> {
    lines
        .chunks(per_page.max(1))
        .map(|page| page.join(separator))
        .collect()
}

/// Split text into parts of at most `max_chars` characters, never inside a character.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    chars
        .chunks(max_chars)
        .map(|part| part.iter().collect())
        .collect()
}
