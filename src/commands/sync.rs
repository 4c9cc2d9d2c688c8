use crate::{
    commands::format_quote,
    models::sync::{Resolution, SyncStatus},
    Data,
};

/// runs one cycle; held conflicts are settled right away when `resolve` is given.
#[tracing::instrument(skip(data))]
pub async fn sync(data: &Data, resolve: Option<Resolution>) -> anyhow::Result<()> {
    println!("syncing...");
    let report = data.reconciler.sync_once(&data.store).await;
    println!("{report}");

    if report.status != SyncStatus::Conflicts {
        return Ok(());
    }

    match resolve {
        Some(resolution) => self::resolve(data, resolution).await,
        None => conflicts(data).await,
    }
}

#[tracing::instrument(skip_all)]
pub async fn conflicts(data: &Data) -> anyhow::Result<()> {
    let conflicts = data.reconciler.pending_conflicts().await;

    if conflicts.is_empty() {
        println!("no pending conflicts.");
        return Ok(());
    }

    for conflict in &conflicts {
        println!("id: {}", conflict.id);
        println!("  local:  {}", format_quote(&conflict.local));
        println!("  server: {}", format_quote(&conflict.server));
    }

    println!("settle them with `accept` (server versions) or `keep` (local versions).");

    Ok(())
}

#[tracing::instrument(skip(data))]
pub async fn resolve(data: &Data, resolution: Resolution) -> anyhow::Result<()> {
    let report = data.reconciler.resolve(&data.store, resolution).await;

    match (report.status, resolution) {
        (SyncStatus::Ok, Resolution::AcceptRemote) => println!("server versions accepted. {report}"),
        (SyncStatus::Ok, Resolution::KeepLocal) => println!("kept local versions. {report}"),
        _ => println!("{report}"),
    }

    Ok(())
}
