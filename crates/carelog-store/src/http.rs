//! HTTP list client for SharePoint-style list REST endpoints

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, HeaderMap, IF_MATCH};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{ItemWithEtag, ListClient, ListError, ListItem, ListQuery, ListResult, TokenProvider};

const JSON_LIGHT: &str = "application/json;odata=nometadata";
const X_HTTP_METHOD: &str = "X-HTTP-Method";

/// `ListClient` over HTTP. The bearer token is fetched from the provider on
/// every request, so rotated tokens are picked up without rebuilding.
pub struct HttpListClient {
    site_url: String,
    http: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpListClient {
    pub fn new(
        site_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> ListResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ListError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
            http,
            tokens,
        })
    }

    fn items_url(&self, list: &str) -> String {
        items_url(&self.site_url, list)
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, JSON_LIGHT);
        match self.tokens.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and turn non-success statuses into `ListError::Http`
    async fn send(&self, op: &'static str, request: RequestBuilder) -> ListResult<Response> {
        let started = Instant::now();
        let response = self.authorize(request).await.send().await?;
        let status = response.status();
        let elapsed_ms = started.elapsed().as_millis();

        if status.is_success() {
            debug!(op, status = status.as_u16(), elapsed_ms, "List request succeeded");
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        warn!(op, status = status.as_u16(), elapsed_ms, message = %message, "List request failed");
        Err(ListError::http(status.as_u16(), message))
    }

    async fn read_json(response: Response) -> ListResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| ListError::Decode(e.to_string()))
    }
}

/// Items endpoint of a list
pub fn items_url(site_url: &str, list: &str) -> String {
    format!(
        "{}/_api/web/lists/getbytitle('{}')/items",
        site_url,
        list.replace('\'', "''")
    )
}

/// Query-string pairs for a filtered item query
pub fn query_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if !query.select.is_empty() {
        params.push(("$select", query.select.join(",")));
    }
    if !query.filter.is_empty() {
        params.push(("$filter", query.filter.clone()));
    }
    if let Some(order_by) = &query.order_by {
        params.push(("$orderby", order_by.clone()));
    }
    if let Some(top) = query.top {
        params.push(("$top", top.to_string()));
    }
    params
}

/// Next-page link of a collection response, in either OData dialect
pub fn next_link(body: &Value) -> Option<String> {
    ["odata.nextLink", "@odata.nextLink", "__next"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| body.pointer("/d/__next").and_then(Value::as_str))
        .map(str::to_string)
}

/// Items of a collection response (`value` or verbose `d.results`)
pub fn collection_items(body: &Value) -> ListResult<Vec<ListItem>> {
    let array = body
        .get("value")
        .or_else(|| body.pointer("/d/results"))
        .and_then(Value::as_array)
        .ok_or_else(|| ListError::Decode("response has no item collection".into()))?;

    Ok(array
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect())
}

/// Entity tag from the `ETag` header or the item body
pub fn extract_etag(headers: &HeaderMap, body: &Value) -> Option<String> {
    headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            ["odata.etag", "@odata.etag"]
                .iter()
                .find_map(|key| body.get(*key).and_then(Value::as_str))
                .or_else(|| body.pointer("/__metadata/etag").and_then(Value::as_str))
                .map(str::to_string)
        })
}

/// Human-readable message from an error body
fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.pointer("/odata.error/message/value")
        .or_else(|| json.pointer("/error/message/value"))
        .or_else(|| json.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ListClient for HttpListClient {
    async fn get_items_by_filter(&self, list: &str, query: &ListQuery) -> ListResult<Vec<ListItem>> {
        let max_pages = query.max_pages.unwrap_or(1).max(1);
        let first = self
            .http
            .get(self.items_url(list))
            .query(&query_params(query));

        let mut items = Vec::new();
        let mut request = Some(first);
        let mut pages = 0;

        while let Some(current) = request.take() {
            let response = self.send("get_items_by_filter", current).await?;
            let body = Self::read_json(response).await?;
            items.extend(collection_items(&body)?);
            pages += 1;

            if pages >= max_pages {
                break;
            }
            request = next_link(&body).map(|url| self.http.get(url));
        }

        debug!(list, pages, count = items.len(), "Fetched list items");
        Ok(items)
    }

    async fn get_item_with_etag(&self, list: &str, id: i64) -> ListResult<Option<ItemWithEtag>> {
        let url = format!("{}({})", self.items_url(list), id);
        let response = match self.send("get_item_with_etag", self.http.get(url)).await {
            Ok(response) => response,
            Err(ListError::Http { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let headers = response.headers().clone();
        let body = Self::read_json(response).await?;
        let etag = extract_etag(&headers, &body);
        let item = body
            .as_object()
            .cloned()
            .ok_or_else(|| ListError::Decode(format!("item {} is not an object", id)))?;

        Ok(Some(ItemWithEtag { item, etag }))
    }

    async fn update_item(&self, list: &str, id: i64, payload: &ListItem, if_match: &str) -> ListResult<()> {
        let url = format!("{}({})", self.items_url(list), id);
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, JSON_LIGHT)
            .header(IF_MATCH, if_match)
            .header(X_HTTP_METHOD, "MERGE")
            .json(payload);

        self.send("update_item", request).await?;
        Ok(())
    }

    async fn add_item(&self, list: &str, payload: &ListItem) -> ListResult<ListItem> {
        let request = self
            .http
            .post(self.items_url(list))
            .header(CONTENT_TYPE, JSON_LIGHT)
            .json(payload);

        let response = self.send("add_item", request).await?;
        let body = Self::read_json(response).await?;
        body.as_object()
            .cloned()
            .ok_or_else(|| ListError::Decode("created item is not an object".into()))
    }

    async fn delete_item(&self, list: &str, id: i64, if_match: &str) -> ListResult<()> {
        let url = format!("{}({})", self.items_url(list), id);
        let request = self
            .http
            .post(url)
            .header(IF_MATCH, if_match)
            .header(X_HTTP_METHOD, "DELETE");

        self.send("delete_item", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn builds_items_url() {
        assert_eq!(
            items_url("https://example.com/sites/care", "Staff_Attendance"),
            "https://example.com/sites/care/_api/web/lists/getbytitle('Staff_Attendance')/items"
        );
        assert_eq!(
            items_url("https://example.com", "Team's list"),
            "https://example.com/_api/web/lists/getbytitle('Team''s list')/items"
        );
    }

    #[test]
    fn builds_query_params() {
        let query = ListQuery::new(&["Id", "Title"], "Title eq 'x'")
            .order_by("Title asc")
            .top(200);
        let params = query_params(&query);
        assert_eq!(
            params,
            vec![
                ("$select", "Id,Title".to_string()),
                ("$filter", "Title eq 'x'".to_string()),
                ("$orderby", "Title asc".to_string()),
                ("$top", "200".to_string()),
            ]
        );
    }

    #[test]
    fn reads_collections_and_links() {
        let light = json!({
            "value": [{"Id": 1}, {"Id": 2}],
            "odata.nextLink": "https://example.com/next"
        });
        assert_eq!(collection_items(&light).unwrap().len(), 2);
        assert_eq!(next_link(&light).as_deref(), Some("https://example.com/next"));

        let verbose = json!({ "d": { "results": [{"Id": 1}], "__next": "https://example.com/p2" } });
        assert_eq!(collection_items(&verbose).unwrap().len(), 1);
        assert_eq!(next_link(&verbose).as_deref(), Some("https://example.com/p2"));

        let last = json!({ "value": [] });
        assert!(next_link(&last).is_none());
        assert!(collection_items(&json!({"oops": true})).is_err());
    }

    #[test]
    fn etag_prefers_header() {
        let mut headers = HeaderMap::new();
        let body = json!({ "odata.etag": "\"4\"" });
        assert_eq!(extract_etag(&headers, &body).as_deref(), Some("\"4\""));

        headers.insert(ETAG, HeaderValue::from_static("\"5\""));
        assert_eq!(extract_etag(&headers, &body).as_deref(), Some("\"5\""));

        assert!(extract_etag(&HeaderMap::new(), &json!({})).is_none());
    }

    #[test]
    fn parses_error_bodies() {
        let body = r#"{"odata.error":{"code":"-1","message":{"lang":"en-US","value":"Column 'FinalizedAt' does not exist."}}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("Column 'FinalizedAt' does not exist.")
        );
        assert!(error_message("<html>").is_none());
    }
}
