//! The quote collection and its persistence.
//!
//! [`QuoteStore`] owns the ordered list of quotes. Every mutation writes the
//! full collection back to durable storage as one JSON document; a failed
//! write is reported to the caller but the in-memory change stands. Callers
//! that render the collection can [`subscribe`](QuoteStore::subscribe) to a
//! revision counter that moves on every mutation.

use std::{collections::HashSet, sync::Arc};

use rand::seq::SliceRandom;
use serde_json::Value;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};
use tokio::sync::watch;

use crate::{
    constants::{
        defaults::default_quotes, ALL_CATEGORIES, LAST_VIEWED_KEY, QUOTES_KEY,
        SELECTED_CATEGORY_KEY,
    },
    error::{QuoteError, Result, StorageError},
    models::quotes::Quote,
    storage::Storage,
};

const EXPORT_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

pub struct QuoteStore {
    quotes: Vec<Quote>,
    selected_category: Option<String>,
    durable: Arc<dyn Storage>,
    session: Arc<dyn Storage>,
    revision: watch::Sender<u64>,
}

impl QuoteStore {
    /// Loads the persisted collection, falling back to the default dataset
    /// when nothing usable is stored. A snapshot that needed cleaning up is
    /// written back so storage matches memory. Never fails.
    #[tracing::instrument(skip_all)]
    pub async fn load(durable: Arc<dyn Storage>, session: Arc<dyn Storage>) -> Self {
        let stored = match durable.get(QUOTES_KEY).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(err = ?e, "could not read stored quotes, using defaults");
                None
            }
        };

        let loaded = stored
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| match serde_json::from_str::<Vec<Value>>(&raw) {
                Ok(values) => Some(values),
                Err(e) => {
                    tracing::warn!(err = ?e, "stored quotes are corrupt, using defaults");
                    None
                }
            });

        let selected_category = durable
            .get(SELECTED_CATEGORY_KEY)
            .await
            .inspect_err(|e| tracing::warn!(err = ?e, "could not read selected category"))
            .ok()
            .flatten();

        let (revision, _) = watch::channel(0);
        let mut store = QuoteStore {
            quotes: vec![],
            selected_category,
            durable,
            session,
            revision,
        };

        match loaded {
            Some(values) => {
                let total = values.len();
                let stored = Value::Array(values.clone());
                store.append_valid(values);

                if store.quotes.len() < total {
                    tracing::warn!(
                        dropped = total - store.quotes.len(),
                        "dropped invalid entries from stored quotes"
                    );
                }

                // dropped entries, trimmed text or merged category casing
                if serde_json::to_value(&store.quotes).ok().as_ref() != Some(&stored) {
                    tracing::info!("persisting normalized stored quotes");

                    if let Err(e) = store.save().await {
                        tracing::warn!(err = ?e, "could not persist normalized quotes");
                    }
                }
            }
            None => {
                store.quotes = default_quotes();

                if let Err(e) = store.save().await {
                    tracing::warn!(err = ?e, "could not persist default quotes");
                }
            }
        }

        tracing::info!(count = store.quotes.len(), "loaded quotes");
        store
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Writes the whole collection to durable storage.
    #[tracing::instrument(skip_all)]
    pub async fn save(&self) -> std::result::Result<(), StorageError> {
        let snapshot = serde_json::to_string(&self.quotes)?;

        self.durable
            .set(QUOTES_KEY, &snapshot)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when saving quotes"))
    }

    /// Appends a new quote. On a storage error the quote has still been added.
    #[tracing::instrument(skip(self))]
    pub async fn add(&mut self, text: &str, category: &str) -> Result<Quote> {
        let text = text.trim();
        let category = category.trim();

        if text.is_empty() {
            return Err(QuoteError::validation("quote text cannot be empty"));
        }

        if category.is_empty() {
            return Err(QuoteError::validation("quote category cannot be empty"));
        }

        let quote = Quote::new(text, self.canonical_category(category));
        self.quotes.push(quote.clone());
        self.changed();

        self.save().await?;

        Ok(quote)
    }

    /// Appends every valid entry of `records`; invalid entries are skipped.
    #[tracing::instrument(skip_all, fields(candidates = records.len()))]
    pub async fn import_batch(&mut self, records: Vec<Value>) -> Result<ImportSummary> {
        let summary = self.append_valid(records);

        if summary.imported > 0 {
            self.changed();
            self.save().await?;
        }

        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "finished importing quotes"
        );

        Ok(summary)
    }

    /// Parses an import file. Anything but a JSON array aborts the import
    /// without touching the collection.
    pub async fn import_json(&mut self, document: &str) -> Result<ImportSummary> {
        let value: Value = serde_json::from_str(document)
            .inspect_err(|e| tracing::warn!(err = ?e, "import file is not valid json"))
            .map_err(|e| QuoteError::parse(e.to_string()))?;

        let Value::Array(records) = value else {
            return Err(QuoteError::parse("expected a JSON array of quotes"));
        };

        self.import_batch(records).await
    }

    /// The full collection as a pretty-printed JSON array.
    pub fn export_snapshot(&self) -> std::result::Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(&self.quotes)?)
    }

    pub fn export_file_name(now: OffsetDateTime) -> String {
        let stamp = now
            .to_offset(time::UtcOffset::UTC)
            .format(EXPORT_TIMESTAMP)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());

        format!("quotes-{stamp}.json")
    }

    /// Empties the collection and deletes the stored snapshot.
    #[tracing::instrument(skip_all)]
    pub async fn clear_all(&mut self) -> std::result::Result<(), StorageError> {
        self.quotes.clear();
        self.changed();

        self.durable
            .remove(QUOTES_KEY)
            .await
            .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when clearing quotes"))
    }

    /// Picks a random quote, optionally within one category, and remembers it
    /// as the last viewed quote of this session.
    pub async fn random(&self, category: Option<&str>) -> Option<Quote> {
        let picked = self
            .filter(category.unwrap_or(ALL_CATEGORIES))
            .choose(&mut rand::thread_rng())
            .map(|quote| (*quote).clone())?;

        match serde_json::to_string(&picked) {
            Ok(marker) => {
                if let Err(e) = self.session.set(LAST_VIEWED_KEY, &marker).await {
                    tracing::warn!(err = ?e, "could not remember last viewed quote");
                }
            }
            Err(e) => tracing::warn!(err = ?e, "could not serialize last viewed quote"),
        }

        Some(picked)
    }

    pub async fn last_viewed(&self) -> Option<Quote> {
        let raw = self.session.get(LAST_VIEWED_KEY).await.ok().flatten()?;

        serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(err = ?e, "ignoring unreadable last viewed quote"))
            .ok()
    }

    pub fn filter(&self, category: &str) -> Vec<&Quote> {
        if category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            return self.quotes.iter().collect();
        }

        self.quotes
            .iter()
            .filter(|quote| quote.category.to_lowercase() == category.to_lowercase())
            .collect()
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .quotes
            .iter()
            .map(|quote| quote.category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        categories.sort_by_key(|c| c.to_lowercase());
        categories
    }

    pub fn selected_category(&self) -> Option<&str> {
        self.selected_category.as_deref()
    }

    pub async fn select_category(
        &mut self,
        category: &str,
    ) -> std::result::Result<(), StorageError> {
        let category = category.trim();
        self.selected_category = Some(category.to_string());

        self.durable.set(SELECTED_CATEGORY_KEY, category).await
    }

    /// Swaps in a reconciled collection and persists it.
    pub(crate) async fn replace_all(
        &mut self,
        quotes: Vec<Quote>,
    ) -> std::result::Result<(), StorageError> {
        self.quotes = quotes;
        self.changed();

        self.save().await
    }

    fn append_valid(&mut self, records: Vec<Value>) -> ImportSummary {
        let mut ids: HashSet<String> = self.quotes.iter().filter_map(|q| q.id.clone()).collect();
        let mut summary = ImportSummary::default();

        for record in records {
            let mut quote = match Quote::from_candidate(record) {
                Ok(quote) => quote,
                Err(e) => {
                    tracing::debug!(err = %e, "skipping invalid quote");
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Some(id) = &quote.id {
                if !ids.insert(id.clone()) {
                    tracing::debug!(id = %id, "skipping quote with duplicate id");
                    summary.skipped += 1;
                    continue;
                }
            }

            quote.category = self.canonical_category(&quote.category);
            self.quotes.push(quote);
            summary.imported += 1;
        }

        summary
    }

    /// Reuses the casing of an existing category that matches case-insensitively.
    fn canonical_category(&self, category: &str) -> String {
        let wanted = category.to_lowercase();

        self.quotes
            .iter()
            .find(|quote| quote.category.to_lowercase() == wanted)
            .map(|quote| quote.category.clone())
            .unwrap_or_else(|| category.to_string())
    }

    fn changed(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
