//! Keyset pagination shared by history listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use shared::pagination::{clamp_limit, decode_cursor, encode_cursor};

use crate::error::{DomainError, DomainResult};

/// Position after which the next page starts (newest-first order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor<K> {
    pub created_at: DateTime<Utc>,
    pub id: K,
}

/// Decoded page request handed to stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest<K> {
    pub limit: i64,
    pub after: Option<PageCursor<K>>,
}

impl<K> PageRequest<K> {
    pub fn first(limit: i64) -> Self {
        Self { limit, after: None }
    }

    /// Number of rows a store should fetch to detect a following page.
    pub fn fetch_limit(&self) -> i64 {
        self.limit + 1
    }
}

impl<K: FromStr> PageRequest<K> {
    /// Decodes `limit` and `cursor` query parameters.
    pub fn from_query(limit: Option<i64>, cursor: Option<&str>) -> DomainResult<Self> {
        let after = match cursor {
            Some(raw) if !raw.is_empty() => {
                let (created_at, id) = decode_cursor::<K>(raw)
                    .map_err(|e| DomainError::Validation(format!("cursor: {}", e)))?;
                Some(PageCursor { created_at, id })
            }
            _ => None,
        };
        Ok(Self {
            limit: clamp_limit(limit),
            after,
        })
    }
}

/// Pagination info in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    /// Builds a page from up to `limit + 1` rows ordered newest-first.
    pub fn from_rows<K, F>(mut rows: Vec<T>, limit: i64, key: F) -> Self
    where
        K: Display,
        F: Fn(&T) -> (DateTime<Utc>, K),
    {
        let limit = usize::try_from(limit).unwrap_or(0);
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(|row| {
                let (created_at, id) = key(row);
                encode_cursor(created_at, id)
            })
        } else {
            None
        };
        Self {
            data: rows,
            pagination: PageInfo {
                next_cursor,
                has_more,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
