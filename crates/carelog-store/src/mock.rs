//! Mock list client for testing

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::fields::{AUDIT_FIELDS, FIELD_ID};
use crate::{ItemWithEtag, ListClient, ListError, ListItem, ListQuery, ListResult};

/// Operations the mock can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Query,
    GetEtag,
    Update,
    Add,
    Delete,
}

#[derive(Debug, Clone)]
struct MockItem {
    fields: ListItem,
    version: u64,
}

impl MockItem {
    fn etag(&self) -> String {
        format!("\"{}\"", self.version)
    }
}

#[derive(Default)]
struct MockState {
    items: BTreeMap<i64, MockItem>,
    next_id: i64,
    legacy_schema: bool,
    scripted: VecDeque<(MockOp, ListError)>,
    calls: HashMap<MockOp, usize>,
    queries: Vec<ListQuery>,
    if_matches: Vec<(MockOp, String)>,
    omit_etags: bool,
    race_next_etag_read: bool,
}

/// In-memory list store speaking the `ListClient` protocol.
///
/// Understands the filters the remote adapter generates (`eq`/`ge`/`le`
/// clauses joined by `and`), keeps a version-based etag per item, and can
/// pretend to be a list without the audit columns.
#[derive(Default)]
pub struct MockListClient {
    state: Mutex<MockState>,
}

impl MockListClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list created before the audit migration: any select or payload
    /// naming an audit column is rejected with HTTP 400.
    pub fn legacy() -> Self {
        let client = Self::new();
        client.set_legacy_schema(true);
        client
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_legacy_schema(&self, legacy: bool) {
        self.state().legacy_schema = legacy;
    }

    /// Fail the next call of `op` with `error`
    pub fn fail_next(&self, op: MockOp, error: ListError) {
        self.state().scripted.push_back((op, error));
    }

    pub fn call_count(&self, op: MockOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Stop returning entity tags, like a list behind a proxy that strips them
    pub fn set_omit_etags(&self, omit: bool) {
        self.state().omit_etags = omit;
    }

    /// Let another writer modify the item right after the next etag read
    pub fn race_next_etag_read(&self) {
        self.state().race_next_etag_read = true;
    }

    /// `If-Match` values received by update and delete, in order
    pub fn if_matches(&self) -> Vec<(MockOp, String)> {
        self.state().if_matches.clone()
    }

    /// Queries seen so far, in order
    pub fn queries(&self) -> Vec<ListQuery> {
        self.state().queries.clone()
    }

    /// Insert an item directly, returning its id
    pub fn insert_raw(&self, mut fields: ListItem) -> i64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        fields.insert(FIELD_ID.into(), Value::from(id));
        state.items.insert(id, MockItem { fields, version: 1 });
        id
    }

    /// Bump an item's version, as a concurrent writer would
    pub fn touch(&self, id: i64) {
        if let Some(item) = self.state().items.get_mut(&id) {
            item.version += 1;
        }
    }

    /// Current stored fields of every item, by id
    pub fn items(&self) -> Vec<ListItem> {
        self.state().items.values().map(|i| i.fields.clone()).collect()
    }

    fn begin(&self, state: &mut MockState, op: MockOp) -> ListResult<()> {
        *state.calls.entry(op).or_default() += 1;
        if let Some(pos) = state.scripted.iter().position(|(o, _)| *o == op)
            && let Some((_, error)) = state.scripted.remove(pos)
        {
            return Err(error);
        }
        Ok(())
    }
}

fn unknown_column(field: &str) -> ListError {
    ListError::http(
        400,
        format!("Column '{}' does not exist. It may have been deleted by another user.", field),
    )
}

fn check_schema(legacy: bool, fields: impl IntoIterator<Item = impl AsRef<str>>) -> ListResult<()> {
    if !legacy {
        return Ok(());
    }
    for field in fields {
        if AUDIT_FIELDS.contains(&field.as_ref()) {
            return Err(unknown_column(field.as_ref()));
        }
    }
    Ok(())
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Evaluate `Field op 'literal' [and ...]` against an item
fn matches_filter(item: &ListItem, filter: &str) -> ListResult<bool> {
    if filter.trim().is_empty() {
        return Ok(true);
    }
    for clause in filter.split(" and ") {
        let mut parts = clause.trim().splitn(3, ' ');
        let (Some(field), Some(op), Some(literal)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ListError::http(400, format!("Unsupported filter clause: {}", clause)));
        };
        let literal = literal
            .strip_prefix('\'')
            .and_then(|l| l.strip_suffix('\''))
            .ok_or_else(|| ListError::http(400, format!("Unquoted literal: {}", literal)))?
            .replace("''", "'");
        let actual = value_text(item.get(field));

        let ok = match op {
            "eq" => actual == literal,
            "ge" => actual.as_str() >= literal.as_str(),
            "le" => actual.as_str() <= literal.as_str(),
            other => return Err(ListError::http(400, format!("Unsupported operator: {}", other))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn compare_by(order_by: &str, a: &ListItem, b: &ListItem) -> CmpOrdering {
    for term in order_by.split(',') {
        let mut parts = term.split_whitespace();
        let Some(field) = parts.next() else { continue };
        let descending = parts.next() == Some("desc");
        let ordering = value_text(a.get(field)).cmp(&value_text(b.get(field)));
        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != CmpOrdering::Equal {
            return ordering;
        }
    }
    CmpOrdering::Equal
}

fn project(item: &ListItem, select: &[&'static str]) -> ListItem {
    if select.is_empty() {
        return item.clone();
    }
    select
        .iter()
        .filter_map(|field| item.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect()
}

#[async_trait]
impl ListClient for MockListClient {
    async fn get_items_by_filter(&self, _list: &str, query: &ListQuery) -> ListResult<Vec<ListItem>> {
        let mut state = self.state();
        state.queries.push(query.clone());
        self.begin(&mut state, MockOp::Query)?;
        check_schema(state.legacy_schema, query.select.iter())?;

        let mut matched = Vec::new();
        for item in state.items.values() {
            if matches_filter(&item.fields, &query.filter)? {
                matched.push(&item.fields);
            }
        }
        if let Some(order_by) = &query.order_by {
            matched.sort_by(|a, b| compare_by(order_by, a, b));
        }

        let limit = query.ceiling().unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|item| project(item, &query.select))
            .collect())
    }

    async fn get_item_with_etag(&self, _list: &str, id: i64) -> ListResult<Option<ItemWithEtag>> {
        let mut state = self.state();
        self.begin(&mut state, MockOp::GetEtag)?;

        let omit_etags = state.omit_etags;
        let race = std::mem::take(&mut state.race_next_etag_read);
        let Some(item) = state.items.get_mut(&id) else {
            return Ok(None);
        };
        let fetched = ItemWithEtag {
            item: item.fields.clone(),
            etag: (!omit_etags).then(|| item.etag()),
        };
        if race {
            item.version += 1;
        }
        Ok(Some(fetched))
    }

    async fn update_item(&self, _list: &str, id: i64, payload: &ListItem, if_match: &str) -> ListResult<()> {
        let mut state = self.state();
        self.begin(&mut state, MockOp::Update)?;
        state.if_matches.push((MockOp::Update, if_match.to_string()));
        check_schema(state.legacy_schema, payload.keys())?;

        let item = state
            .items
            .get_mut(&id)
            .ok_or_else(|| ListError::http(404, format!("Item {} does not exist", id)))?;
        if if_match != "*" && if_match != item.etag() {
            return Err(ListError::http(
                412,
                format!("The version of item {} has changed (expected {})", id, item.etag()),
            ));
        }
        for (field, value) in payload {
            item.fields.insert(field.clone(), value.clone());
        }
        item.version += 1;
        Ok(())
    }

    async fn add_item(&self, _list: &str, payload: &ListItem) -> ListResult<ListItem> {
        let mut state = self.state();
        self.begin(&mut state, MockOp::Add)?;
        check_schema(state.legacy_schema, payload.keys())?;

        state.next_id += 1;
        let id = state.next_id;
        let mut fields = payload.clone();
        fields.insert(FIELD_ID.into(), Value::from(id));
        state.items.insert(
            id,
            MockItem {
                fields: fields.clone(),
                version: 1,
            },
        );
        Ok(fields)
    }

    async fn delete_item(&self, _list: &str, id: i64, if_match: &str) -> ListResult<()> {
        let mut state = self.state();
        self.begin(&mut state, MockOp::Delete)?;
        state.if_matches.push((MockOp::Delete, if_match.to_string()));

        let item = state
            .items
            .get(&id)
            .ok_or_else(|| ListError::http(404, format!("Item {} does not exist", id)))?;
        if if_match != "*" && if_match != item.etag() {
            return Err(ListError::http(412, format!("The version of item {} has changed", id)));
        }
        state.items.remove(&id);
        Ok(())
    }
}
