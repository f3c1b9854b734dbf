//! Query and Pagination
//!
//! Turns a list request (page, sort spec, name search, id restriction) into
//! a deterministic page of records plus the total match count.

use std::cmp::Ordering;
use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult, RecordId};
use super::collection::{Collection, Document, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One sort key: a field name and a direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortBy {
    pub prop: String,
    #[serde(default, deserialize_with = "order_or_default")]
    pub order: SortOrder,
}

impl SortBy {
    pub fn asc(prop: &str) -> Self {
        Self {
            prop: prop.to_string(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(prop: &str) -> Self {
        Self {
            prop: prop.to_string(),
            order: SortOrder::Descending,
        }
    }
}

// table widgets send `"order": null` when sorting is cleared
fn order_or_default<'de, D>(deserializer: D) -> Result<SortOrder, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<SortOrder>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single sort key or a compound one (earlier keys take precedence)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    Many(Vec<SortBy>),
    One(SortBy),
}

impl SortSpec {
    /// Resolved keys, or `default` when the spec is empty
    pub fn keys_or(spec: Option<&SortSpec>, default: &[SortBy]) -> Vec<SortBy> {
        match spec {
            Some(SortSpec::One(key)) => vec![key.clone()],
            Some(SortSpec::Many(keys)) if !keys.is_empty() => keys.clone(),
            _ => default.to_vec(),
        }
    }
}

/// 1-based page position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub current_page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(current_page: usize, page_size: usize) -> Self {
        Self {
            current_page,
            page_size,
        }
    }

    pub fn offset(&self) -> DomainResult<usize> {
        if self.current_page == 0 || self.page_size == 0 {
            return Err(DomainError::InvalidInput(format!(
                "page and page size must be positive (page {}, size {})",
                self.current_page, self.page_size
            )));
        }
        Ok((self.current_page - 1).saturating_mul(self.page_size))
    }
}

/// Result page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            list: Vec::new(),
            total: 0,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Case-insensitive name match
///
/// The search text is tried as a regular expression first and matched
/// literally when it does not compile.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: Regex,
}

impl NameFilter {
    /// `None` for a missing or blank search
    pub fn new(search: Option<&str>) -> Option<Self> {
        let search = search?.trim();
        if search.is_empty() {
            return None;
        }
        let pattern = RegexBuilder::new(search)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(search))
                    .case_insensitive(true)
                    .build()
            })
            .ok()?;
        Some(Self { pattern })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// Filter, sort and page spec over one collection
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: PageRequest,
    pub sort: Vec<SortBy>,
    pub name: Option<NameFilter>,
    pub ids: Option<HashSet<RecordId>>,
}

impl ListQuery {
    pub fn new(page: PageRequest, sort: Vec<SortBy>) -> Self {
        Self {
            page,
            sort,
            name: None,
            ids: None,
        }
    }

    pub fn with_name(mut self, search: Option<&str>) -> Self {
        self.name = NameFilter::new(search);
        self
    }

    pub fn with_ids(mut self, ids: HashSet<RecordId>) -> Self {
        self.ids = Some(ids);
        self
    }

    fn accepts<T: Document>(&self, record: &T) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&record.id()) {
                return false;
            }
        }
        match &self.name {
            Some(filter) => match record.field("name") {
                FieldValue::Text(name) => filter.matches(&name),
                _ => false,
            },
            None => true,
        }
    }
}

/// Compare two records by compound sort keys, ties broken by id descending
pub fn compare_by<T: Document>(a: &T, b: &T, keys: &[SortBy]) -> Ordering {
    for key in keys {
        let ordering = a.field(&key.prop).cmp(&b.field(&key.prop));
        let ordering = match key.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    b.id().cmp(&a.id())
}

/// Run `query` against `collection`
pub fn paginate<T: Document>(collection: &Collection<T>, query: &ListQuery) -> DomainResult<Page<T>> {
    let offset = query.page.offset()?;

    let mut matched: Vec<&T> = collection.iter().filter(|r| query.accepts(*r)).collect();
    let total = matched.len();

    matched.sort_by(|a, b| compare_by(*a, *b, &query.sort));

    let list = matched
        .into_iter()
        .skip(offset)
        .take(query.page.page_size)
        .cloned()
        .collect();

    Ok(Page { list, total })
}
