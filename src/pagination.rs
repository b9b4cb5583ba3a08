use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::error::ApiError;

/// Message returned whenever a collection is requested without valid pagination.
pub const PAGINATION_REQUIRED: &str =
    "Lists must be paginated with start=<num>&size=<num> query params (use 0 to list all)";

/// PageQuery
///
/// Raw query parameters. Kept as strings so that a non-numeric value can be
/// reported with our own message instead of Axum's default rejection.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Offset of the first element to return.
    #[param(value_type = u32, example = 0)]
    pub start: Option<String>,
    /// Maximum number of elements to return (0 lists everything from `start`).
    #[param(value_type = u32, example = 10)]
    pub size: Option<String>,
}

/// Page
///
/// A validated `start`/`size` window over a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: u32,
    pub size: u32,
}

impl Page {
    pub fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    /// parse
    ///
    /// Both parameters are mandatory and must be non-negative integers.
    pub fn parse(start: Option<&str>, size: Option<&str>) -> Result<Self, ApiError> {
        let parse = |raw: Option<&str>| {
            raw.and_then(|value| value.trim().parse::<u32>().ok())
                .ok_or_else(|| ApiError::bad_request(PAGINATION_REQUIRED))
        };
        Ok(Self {
            start: parse(start)?,
            size: parse(size)?,
        })
    }

    /// SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        i64::from(self.start)
    }

    /// SQL `LIMIT` value; `None` (i.e. `LIMIT NULL`) when the whole tail is requested.
    pub fn limit(&self) -> Option<i64> {
        (self.size > 0).then(|| i64::from(self.size))
    }

    /// Applies the window to an in-memory iterator.
    pub fn slice<T, I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let skipped = items.into_iter().skip(self.start as usize);
        match self.limit() {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        }
    }
}

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PageQuery>::try_from_uri(&parts.uri)
            .map_err(|_| ApiError::bad_request(PAGINATION_REQUIRED))?;
        Page::parse(query.start.as_deref(), query.size.as_deref())
    }
}
