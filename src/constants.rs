use std::sync::LazyLock;

pub mod defaults;
pub mod version;

pub static STARTUP_TIME: LazyLock<std::time::SystemTime> =
    LazyLock::new(std::time::SystemTime::now);

// storage keys
pub const QUOTES_KEY: &str = "quotes";
pub const SELECTED_CATEGORY_KEY: &str = "selectedCategory";
pub const LAST_VIEWED_KEY: &str = "lastViewedQuote";

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const SERVER_CATEGORY: &str = "server";
/// Filter value that matches every category.
pub const ALL_CATEGORIES: &str = "all";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://quotes.db";
pub const DEFAULT_SERVER_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_SERVER_RESOURCE: &str = "/posts";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
pub const REMOTE_FETCH_LIMIT: usize = 50;
pub const HTTP_TIMEOUT_SECS: u64 = 15;
