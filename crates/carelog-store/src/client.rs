//! Remote list-store client capability
//!
//! The remote adapter only consumes this trait; connection handling, auth and
//! paging live behind it.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// One list item as returned by the store: field name to JSON value
pub type ListItem = Map<String, Value>;

/// Errors from the list-store client
#[derive(Debug, Clone, Error)]
pub enum ListError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ListError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, when the store answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ListError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 400/422: the store rejected the request shape
    pub fn is_validation(&self) -> bool {
        matches!(self.status(), Some(400 | 422))
    }
}

impl From<reqwest::Error> for ListError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ListError::http(status.as_u16(), e.to_string()),
            None if e.is_decode() => ListError::Decode(e.to_string()),
            None => ListError::Transport(e.to_string()),
        }
    }
}

pub type ListResult<T> = Result<T, ListError>;

/// Filtered item query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Fields to return
    pub select: Vec<&'static str>,
    /// OData filter expression
    pub filter: String,
    /// OData order-by expression
    pub order_by: Option<String>,
    /// Page size
    pub top: Option<u32>,
    /// Stop following next-page links after this many pages (None = one page)
    pub max_pages: Option<u32>,
}

impl ListQuery {
    pub fn new(select: &[&'static str], filter: impl Into<String>) -> Self {
        Self {
            select: select.to_vec(),
            filter: filter.into(),
            ..Default::default()
        }
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Largest number of items this query can return
    pub fn ceiling(&self) -> Option<usize> {
        self.top
            .map(|top| top as usize * self.max_pages.unwrap_or(1).max(1) as usize)
    }
}

/// An item together with its current entity tag
#[derive(Debug, Clone, PartialEq)]
pub struct ItemWithEtag {
    pub item: ListItem,
    pub etag: Option<String>,
}

/// Remote list-store operations used by the attendance adapter
#[async_trait]
pub trait ListClient: Send + Sync {
    /// Query items matching a filter, following pages up to `query.max_pages`
    async fn get_items_by_filter(&self, list: &str, query: &ListQuery) -> ListResult<Vec<ListItem>>;

    /// Fetch one item with its entity tag; `Ok(None)` if it no longer exists
    async fn get_item_with_etag(&self, list: &str, id: i64) -> ListResult<Option<ItemWithEtag>>;

    /// Conditional merge-update; a stale `if_match` yields HTTP 412
    async fn update_item(&self, list: &str, id: i64, payload: &ListItem, if_match: &str) -> ListResult<()>;

    /// Create an item, returning it as stored
    async fn add_item(&self, list: &str, payload: &ListItem) -> ListResult<ListItem>;

    /// Conditional delete
    async fn delete_item(&self, list: &str, id: i64, if_match: &str) -> ListResult<()>;
}

/// Supplies bearer tokens for the remote store
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` to send the request unauthenticated
    async fn token(&self) -> Option<String>;
}

/// Token provider with a fixed value
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}
