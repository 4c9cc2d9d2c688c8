use crate::{commands::format_quote, constants::ALL_CATEGORIES, error::QuoteError, Data};

#[tracing::instrument(skip(data))]
pub async fn show(data: &Data, category: Option<String>) -> anyhow::Result<()> {
    let store = data.store.lock().await;
    let category = category.or_else(|| store.selected_category().map(str::to_string));

    match store.random(category.as_deref()).await {
        Some(quote) => println!("{}", format_quote(&quote)),
        None => match category {
            Some(category) if category != ALL_CATEGORIES => {
                println!("no quotes found in category \"{category}\".")
            }
            _ => println!("no quotes yet! add one with `add`."),
        },
    }

    Ok(())
}

#[tracing::instrument(skip(data))]
pub async fn add(data: &Data, text: &str, category: &str) -> anyhow::Result<()> {
    let mut store = data.store.lock().await;

    match store.add(text, category).await {
        Ok(quote) => {
            println!("added quote {}.", format_quote(&quote));
            Ok(())
        }
        Err(QuoteError::Storage(e)) => {
            println!("added quote, but it could not be saved: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[tracing::instrument(skip(data))]
pub async fn list(data: &Data, category: Option<String>) -> anyhow::Result<()> {
    let store = data.store.lock().await;
    let category = category
        .or_else(|| store.selected_category().map(str::to_string))
        .unwrap_or_else(|| ALL_CATEGORIES.to_string());

    let quotes = store.filter(&category);

    if quotes.is_empty() {
        println!("no quotes found!");
        return Ok(());
    }

    for (idx, quote) in quotes.iter().enumerate() {
        println!("{}. {}", idx + 1, format_quote(quote));
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub async fn categories(data: &Data) -> anyhow::Result<()> {
    let store = data.store.lock().await;
    let selected = store.selected_category();

    for category in store.categories() {
        let marker = if selected == Some(category.as_str()) { "*" } else { " " };
        println!("{marker} {category} ({})", store.filter(&category).len());
    }

    Ok(())
}

#[tracing::instrument(skip(data))]
pub async fn filter(data: &Data, category: &str) -> anyhow::Result<()> {
    let mut store = data.store.lock().await;

    store.select_category(category).await?;
    println!(
        "showing {} quote(s) from \"{category}\".",
        store.filter(category).len()
    );

    Ok(())
}

#[tracing::instrument(skip(data))]
pub async fn clear(data: &Data, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!("this deletes every quote and cannot be undone. pass --yes to confirm.");
        return Ok(());
    }

    let mut store = data.store.lock().await;
    let count = store.len();

    store.clear_all().await?;
    println!("deleted {count} quote(s).");

    Ok(())
}
