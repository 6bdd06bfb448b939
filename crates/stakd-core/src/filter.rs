//! List filters and their query-string encoding.
//!
//! Filters serialize two ways: as JSON (the query-cache key) and as query
//! pairs for `GET /{entity}`. Array parameters use the bracket convention
//! (`status[]=active&status[]=archived`).

use serde::{Deserialize, Serialize};

/// Encodes a parameter set as URL query pairs.
pub trait ToQuery {
    /// Query pairs in a stable order.
    fn query_pairs(&self) -> Vec<(String, String)>;
}

/// Records that a [`FilterParams`] can be evaluated against.
pub trait Searchable {
    /// Text fields the `search` term is matched against.
    fn search_fields(&self) -> Vec<&str>;

    /// Status value, if the record has one.
    fn status(&self) -> Option<&str> {
        None
    }

    /// Tags, if the record has any.
    fn tags(&self) -> &[String] {
        &[]
    }

    /// ISO-8601 date used for `dateRange`, if any.
    fn date(&self) -> Option<&str> {
        None
    }
}

/// Inclusive date range (ISO-8601 strings compare lexicographically).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Range start
    pub start: String,
    /// Range end
    pub end: String,
}

/// Common list filter shared by contacts, tasks and messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    /// Free-text search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Accepted status values (any of)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    /// Required tags (any of)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Date window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl FilterParams {
    /// Returns `true` if the record passes every populated criterion.
    pub fn matches<R: Searchable + ?Sized>(&self, record: &R) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = record
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !self.status.is_empty() {
            match record.status() {
                Some(status) if self.status.iter().any(|s| s == status) => {}
                _ => return false,
            }
        }

        if !self.tags.is_empty() && !record.tags().iter().any(|t| self.tags.contains(t)) {
            return false;
        }

        if let Some(range) = &self.date_range {
            match record.date() {
                Some(date) if date >= range.start.as_str() && date <= range.end.as_str() => {}
                _ => return false,
            }
        }

        true
    }

    fn push_pairs(&self, pairs: &mut Vec<(String, String)>) {
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        for status in &self.status {
            pairs.push(("status[]".to_string(), status.clone()));
        }
        for tag in &self.tags {
            pairs.push(("tags[]".to_string(), tag.clone()));
        }
        if let Some(range) = &self.date_range {
            pairs.push(("dateRange[start]".to_string(), range.start.clone()));
            pairs.push(("dateRange[end]".to_string(), range.end.clone()));
        }
    }
}

/// Filter plus pagination for `GET /{entity}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Filter criteria
    #[serde(flatten)]
    pub filter: FilterParams,
    /// 1-based page number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListParams {
    /// Empty parameters (server defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page number and size.
    pub fn page(mut self, page: u32, limit: u32) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    /// Sets the search term.
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.filter.search = Some(search.into());
        self
    }

    /// Adds an accepted status.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.filter.status.push(status.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.filter.tags.push(tag.into());
        self
    }

    /// Rebuilds parameters from decoded query pairs.
    ///
    /// Unknown keys are ignored; unparsable numbers fall back to `None`.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        let mut start = None;
        let mut end = None;
        for (key, value) in pairs {
            let value = value.into();
            match key.as_ref() {
                "search" => params.filter.search = Some(value),
                "status[]" | "status" => params.filter.status.push(value),
                "tags[]" | "tags" => params.filter.tags.push(value),
                "dateRange[start]" => start = Some(value),
                "dateRange[end]" => end = Some(value),
                "page" => params.page = value.parse().ok(),
                "limit" => params.limit = value.parse().ok(),
                _ => {}
            }
        }
        if let (Some(start), Some(end)) = (start, end) {
            params.filter.date_range = Some(DateRange { start, end });
        }
        params
    }
}

impl ToQuery for ListParams {
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        self.filter.push_pairs(&mut pairs);
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}
