use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{field, instrument};

use crate::error::ServiceError;
use crate::hub::Hub;
use crate::util::http::{Headers, Method};

const MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
const CONTINUATION: &str = "x-ms-continuation";

/// A result set that is fetched one page at a time
#[async_trait]
pub trait DevicePages: Send {
    /// Whether another page may be requested
    fn has_more_results(&self) -> bool;

    /// Fetch the next page of device documents
    async fn next_page(&mut self) -> Result<Vec<Value>, ServiceError>;
}

/// A device query against the registry.
///
/// The hub hands back a continuation token with every page that has
/// more results behind it; the query is exhausted once a page comes back
/// without one.
#[derive(Debug)]
pub struct Query {
    hub: Hub,
    query: String,
    page_size: u32,
    continuation: Option<String>,
    done: bool,
}

impl Query {
    pub(crate) fn new(hub: Hub, query: String, page_size: u32) -> Self {
        Self {
            hub,
            query,
            page_size,
            continuation: None,
            done: false,
        }
    }
}

#[async_trait]
impl DevicePages for Query {
    fn has_more_results(&self) -> bool {
        !self.done
    }

    #[instrument(skip_all, fields(status = field::Empty), err)]
    async fn next_page(&mut self) -> Result<Vec<Value>, ServiceError> {
        let mut headers = Headers::from([(MAX_ITEM_COUNT.to_owned(), self.page_size.to_string())]);
        if let Some(token) = &self.continuation {
            headers.insert(CONTINUATION.to_owned(), token.clone());
        }

        let body = json!({ "query": self.query });
        let response = self
            .hub
            .send(Method::POST, "/devices/query", headers, Some(&body))
            .await?
            .error_for_status()
            .await?;

        self.continuation = response.header(CONTINUATION).filter(|t| !t.is_empty());
        self.done = self.continuation.is_none();

        Ok(response.json().await?)
    }
}
