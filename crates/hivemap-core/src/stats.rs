//! Per-apiary and overall queen status counts.

use serde::Serialize;

use crate::error::Result;
use crate::repository::Repository;
use crate::schema::LayoutDocument;
use crate::store::KeyValueStore;

const QUERY_MARKER: &str = "query";

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub non_query: usize,
    pub query: usize,
}

impl StatusCounts {
    /// Count one status: text containing "query" in any case is a query, any other
    /// non-empty text is not, and an empty status is ignored.
    pub fn record(&mut self, status: &str) {
        if status.to_lowercase().contains(QUERY_MARKER) {
            self.query += 1;
        } else if !status.is_empty() {
            self.non_query += 1;
        }
    }

    fn absorb(&mut self, other: Self) {
        self.non_query += other.non_query;
        self.query += other.query;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApiaryStats {
    pub apiary: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HiveStats {
    pub apiaries: Vec<ApiaryStats>,
    pub total: StatusCounts,
}

impl HiveStats {
    /// Counts for one apiary; zero when the apiary was not scanned.
    #[must_use]
    pub fn for_apiary(&self, apiary: &str) -> StatusCounts {
        self.apiaries
            .iter()
            .find(|entry| entry.apiary == apiary)
            .map(|entry| entry.counts)
            .unwrap_or_default()
    }
}

/// Archived hives are counted like any other.
#[must_use]
pub fn count_layout(layout: &LayoutDocument) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for hive in layout.hives() {
        counts.record(hive.effective_queen_status());
    }
    counts
}

/// # Errors
/// Returns an error only when the apiary list itself cannot be read. Undecodable layout
/// objects, and layouts that are not JSON objects, are logged and skipped.
pub fn hive_stats<S: KeyValueStore>(repo: &Repository<S>) -> Result<HiveStats> {
    let mut stats = HiveStats::default();
    for apiary in repo.apiaries()? {
        let counts = match repo.scan_layout(&apiary) {
            Ok(layout) => layout.as_ref().map(count_layout).unwrap_or_default(),
            Err(err) => {
                tracing::warn!(apiary = %apiary, error = %err, "skipping apiary in stats");
                continue;
            }
        };
        stats.total.absorb(counts);
        stats.apiaries.push(ApiaryStats { apiary, counts });
    }
    Ok(stats)
}
