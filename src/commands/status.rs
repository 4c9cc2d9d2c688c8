use crate::{
    commands::format_quote,
    constants::{version::get_version, STARTUP_TIME},
    Data,
};

/// get the app's status.
#[tracing::instrument(skip_all)]
pub async fn status(data: &Data) -> anyhow::Result<()> {
    let store = data.store.lock().await;
    let config = &data.config;

    println!("quotesync {}", get_version());
    println!("rust: {}", rustc_version_runtime::version());
    println!("quotes: {}", store.len());
    println!("categories: {}", store.categories().len());
    println!(
        "selected category: {}",
        store.selected_category().unwrap_or("all")
    );
    println!("database: {}", config.database_url);
    println!(
        "server: {}/{}",
        config.server_url.trim_end_matches('/'),
        config.server_resource.trim_start_matches('/')
    );
    println!(
        "sync: every {}s, {} policy, currently {}",
        config.sync_interval.as_secs(),
        data.reconciler.policy(),
        data.reconciler.phase()
    );

    if let Some(quote) = store.last_viewed().await {
        println!("last viewed: {}", format_quote(&quote));
    }

    println!(
        "uptime: {}s",
        STARTUP_TIME.elapsed().map(|d| d.as_secs()).unwrap_or_default()
    );

    Ok(())
}
