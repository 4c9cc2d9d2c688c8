use std::path::Path;

use anyhow::Context as _;
use time::OffsetDateTime;

use crate::{store::QuoteStore, Data};

#[tracing::instrument(skip(data))]
pub async fn import(data: &Data, path: &Path) -> anyhow::Result<()> {
    let document = tokio::fs::read_to_string(path)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when reading import file"))
        .with_context(|| format!("could not read {}", path.display()))?;

    let summary = data.store.lock().await.import_json(&document).await?;

    if summary.skipped > 0 {
        println!(
            "imported {} quote(s), skipped {} invalid entr{}.",
            summary.imported,
            summary.skipped,
            if summary.skipped == 1 { "y" } else { "ies" }
        );
    } else {
        println!("imported {} quote(s).", summary.imported);
    }

    Ok(())
}

#[tracing::instrument(skip(data))]
pub async fn export(data: &Data, dir: &Path) -> anyhow::Result<()> {
    let snapshot = data.store.lock().await.export_snapshot()?;
    let path = dir.join(QuoteStore::export_file_name(OffsetDateTime::now_utc()));

    tokio::fs::write(&path, snapshot)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, "an error occurred when writing export file"))
        .with_context(|| format!("could not write {}", path.display()))?;

    println!("exported quotes to {}.", path.display());

    Ok(())
}
