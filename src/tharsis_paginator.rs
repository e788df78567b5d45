//! Cursor pagination over Tharsis connections.
//!
//! List operations return one [`Page`] at a time; [`collect_all`] walks the
//! cursor until the server reports no further page.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::tharsis_error::Result;

/// Page size and starting cursor for a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaginationOptions {
    /// Maximum items per page (`first`).
    #[serde(rename = "first", skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Cursor to resume after (`after`).
    #[serde(rename = "after", skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl PaginationOptions {
    /// Options asking for `limit` items per page.
    #[must_use]
    pub const fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            cursor: None,
        }
    }

    /// Same options, resuming after `cursor`.
    #[must_use]
    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// Cursor state of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether another page follows.
    pub has_next_page: bool,
    /// Cursor of the last item in this page.
    pub end_cursor: Option<String>,
    /// Total number of items across all pages, when reported.
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items in this page.
    pub items: Vec<T>,
    /// Cursor state.
    pub page_info: PageInfo,
}

/// Relay-style connection as returned on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Connection<T> {
    #[serde(default)]
    total_count: Option<u64>,
    page_info: PageInfo,
    #[serde(default)]
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Edge<T> {
    node: T,
}

impl<T> Connection<T> {
    /// Flatten edges into a [`Page`].
    pub(crate) fn into_page(self) -> Page<T> {
        let mut page_info = self.page_info;
        if page_info.total_count.is_none() {
            page_info.total_count = self.total_count;
        }
        Page {
            items: self.edges.into_iter().map(|edge| edge.node).collect(),
            page_info,
        }
    }
}

/// Fetch every page starting at `cursor`, keeping at most `max_items` items.
///
/// # Errors
///
/// Returns the first error produced by `fetch_page`.
pub async fn collect_all<T, F, Fut>(
    mut cursor: Option<String>,
    max_items: Option<usize>,
    mut fetch_page: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut out = Vec::new();
    if max_items == Some(0) {
        return Ok(out);
    }
    loop {
        let page = fetch_page(cursor.take()).await?;

        match max_items {
            Some(max) => {
                let remaining = max.saturating_sub(out.len());
                out.extend(page.items.into_iter().take(remaining));
                if out.len() >= max {
                    break;
                }
            }
            None => out.extend(page.items),
        }

        if !page.page_info.has_next_page {
            break;
        }
        cursor = page.page_info.end_cursor;
        if cursor.is_none() {
            break;
        }
    }
    Ok(out)
}
