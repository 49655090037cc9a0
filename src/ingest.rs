use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::SourceConfig;
use crate::db::{Database, NewArticle};
use crate::fetcher::Fetcher;
use crate::parser::{self, Entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Failed,
}

/// Outcome of one source's refresh. A failed fetch marks the source
/// `failed`; store rejections of individual entries only bump `failed`
/// while the rest of the feed keeps ingesting.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub status: SourceStatus,
    pub inserted: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    fn failed(error: String) -> Self {
        Self {
            status: SourceStatus::Failed,
            inserted: 0,
            failed: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub inserted: usize,
    pub by_source: BTreeMap<String, SourceReport>,
}

/// Walks the configured sources: fetch, parse, dedup by link, persist.
/// No failure of a single entry or source aborts the batch.
pub struct Ingestor {
    db: Arc<Database>,
    fetcher: Fetcher,
    sources: Vec<SourceConfig>,
}

impl Ingestor {
    pub fn new(db: Arc<Database>, fetcher: Fetcher, sources: Vec<SourceConfig>) -> Self {
        Self {
            db,
            fetcher,
            sources,
        }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub async fn refresh_all(&self) -> RefreshReport {
        info!("Refreshing {} sources", self.sources.len());

        let mut report = RefreshReport::default();
        for source in &self.sources {
            let outcome = self.refresh_source(source).await;
            match outcome.status {
                SourceStatus::Ok => info!(
                    "Source '{}': {} new articles, {} failed entries",
                    source.slug, outcome.inserted, outcome.failed
                ),
                SourceStatus::Failed => error!(
                    "Failed to refresh source '{}': {}",
                    source.slug,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
            }
            report.inserted += outcome.inserted;
            report.by_source.insert(source.slug.clone(), outcome);
        }

        info!("Refresh complete: {} new articles", report.inserted);
        report
    }

    async fn refresh_source(&self, source: &SourceConfig) -> SourceReport {
        let bytes = match self.fetcher.fetch(&source.feed_url).await {
            Ok(bytes) => bytes,
            Err(e) => return SourceReport::failed(e.to_string()),
        };

        let entries = parser::parse_feed(&bytes);

        let mut inserted = 0;
        let mut failed = 0;
        for entry in entries {
            match self.ingest_entry(source, entry).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to store entry for '{}': {}", source.slug, e);
                    failed += 1;
                }
            }
        }

        SourceReport {
            status: SourceStatus::Ok,
            inserted,
            failed,
            error: None,
        }
    }

    /// Returns whether a new article was written. An entry whose link is
    /// already stored is not an error, just nothing to do.
    async fn ingest_entry(&self, source: &SourceConfig, entry: Entry) -> anyhow::Result<bool> {
        if self.db.exists_by_link(&entry.link).await? {
            return Ok(false);
        }

        let now = Utc::now();
        let article = NewArticle {
            source_slug: source.slug.clone(),
            source_name: source.name.clone(),
            title: entry.title,
            summary: entry.summary,
            link: entry.link,
            image_url: entry.image_url,
            published_at: entry.published_at,
            categories: entry.categories,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_article(&article).await
    }
}
