use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT},
    StatusCode,
};

use crate::{
    constants::{HTTP_TIMEOUT_SECS, REMOTE_FETCH_LIMIT},
    error::FetchError,
    models::{
        quotes::Quote,
        remote::{NewRemotePost, RemotePost},
    },
};

/// Where remote quotes come from.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quotes(&self) -> Result<Vec<Quote>, FetchError>;

    /// Best-effort upload of a single local quote.
    async fn push_quote(&self, quote: &Quote) -> Result<(), FetchError>;
}

#[derive(Clone, Debug)]
pub struct HttpQuoteSource {
    client: reqwest::Client,
    url: String,
}

impl HttpQuoteSource {
    pub fn new(base_url: &str, resource: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("quotesync/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(HttpQuoteSource {
            client,
            url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                resource.trim_start_matches('/')
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Maps a response of the posts endpoint into quotes.
pub fn parse_posts(status: StatusCode, body: &str) -> Result<Vec<Quote>, FetchError> {
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let posts: Vec<RemotePost> = serde_json::from_str(body)?;

    Ok(posts
        .into_iter()
        .take(REMOTE_FETCH_LIMIT)
        .map(RemotePost::into_quote)
        .collect())
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    #[tracing::instrument(skip_all, fields(url = %self.url))]
    async fn fetch_quotes(&self) -> Result<Vec<Quote>, FetchError> {
        let resp = self.client.get(&self.url).send().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when fetching quotes from server"),
        )?;

        let status = resp.status();
        let text = resp.text().await.inspect_err(
            |e| tracing::error!(err = ?e, "an error occurred when receiving response text"),
        )?;

        parse_posts(status, &text).inspect_err(
            |e| tracing::error!(err = ?e, status = %status, "an error occurred when parsing server quotes"),
        )
    }

    #[tracing::instrument(skip_all, fields(url = %self.url, id = ?quote.id))]
    async fn push_quote(&self, quote: &Quote) -> Result<(), FetchError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&NewRemotePost::from(quote))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }

        Ok(())
    }
}
