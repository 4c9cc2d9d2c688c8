use serde::{Deserialize, Serialize};

use super::quotes::{deserialize_id, Quote};
use crate::constants::SERVER_CATEGORY;

/// A post as served by the mock REST endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct RemotePost {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl RemotePost {
    pub fn into_quote(self) -> Quote {
        let text = [self.title, self.body]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("Server quote {}", self.id.as_deref().unwrap_or("?")));

        Quote {
            id: self.id,
            text,
            category: SERVER_CATEGORY.to_string(),
            last_modified: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemotePost<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub user_id: i64,
}

impl<'a> From<&'a Quote> for NewRemotePost<'a> {
    fn from(quote: &'a Quote) -> Self {
        NewRemotePost {
            title: &quote.text,
            body: &quote.text,
            user_id: 1,
        }
    }
}
