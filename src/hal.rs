use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    error::ApiError,
    models::{Post, User},
    pagination::Page,
};

pub const HAL_JSON: &str = "application/hal+json";

/// Link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

pub type Links = BTreeMap<&'static str, Link>;

/// Linked
///
/// Implemented by entities that know their own action links.
pub trait Linked {
    /// Relation name of a collection of this entity inside `_embedded`.
    const COLLECTION: &'static str;

    fn links(&self) -> Links;
}

impl Linked for User {
    const COLLECTION: &'static str = "users";

    fn links(&self) -> Links {
        Links::from([
            ("self", Link::new(format!("/users/{}", self.id))),
            ("posts", Link::new(format!("/users/{}/posts", self.id))),
        ])
    }
}

impl Linked for Post {
    const COLLECTION: &'static str = "posts";

    fn links(&self) -> Links {
        Links::from([
            (
                "self",
                Link::new(format!("/users/{}/posts/{}", self.user_id, self.id)),
            ),
            ("author", Link::new(format!("/users/{}", self.user_id))),
        ])
    }
}

/// Resource
///
/// An entity with its `_links` merged into the same JSON object.
#[derive(Debug, Serialize)]
pub struct Resource<T> {
    #[serde(flatten)]
    pub data: T,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T: Linked> Resource<T> {
    pub fn new(data: T) -> Self {
        let links = data.links();
        Self { data, links }
    }
}

/// Collection
///
/// One page of entities under `_embedded`, with navigation links between pages.
#[derive(Debug, Serialize)]
pub struct Collection<T> {
    pub total: i64,
    pub start: u32,
    pub size: u32,
    #[serde(rename = "_embedded")]
    pub embedded: BTreeMap<&'static str, Vec<Resource<T>>>,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl<T: Linked> Collection<T> {
    pub fn new(items: Vec<T>, total: i64, path: &str, page: Page) -> Self {
        let resources = items.into_iter().map(Resource::new).collect();
        Self {
            total,
            start: page.start,
            size: page.size,
            embedded: BTreeMap::from([(T::COLLECTION, resources)]),
            links: navigation_links(path, page, total),
        }
    }
}

fn page_href(path: &str, start: u64, size: u32) -> Link {
    Link::new(format!("{path}?start={start}&size={size}"))
}

/// navigation_links
///
/// `self` is always present. With `size = 0` the page already holds everything
/// from `start`, so no other links are emitted. Otherwise `first` and `last` are
/// always present and `prev`/`next` only when such a page exists.
pub fn navigation_links(path: &str, page: Page, total: i64) -> Links {
    let start = u64::from(page.start);
    let size = u64::from(page.size);
    let total = total.max(0) as u64;

    let mut links = Links::from([("self", page_href(path, start, page.size))]);
    if size == 0 {
        return links;
    }

    links.insert("first", page_href(path, 0, page.size));
    if start > 0 {
        links.insert("prev", page_href(path, start.saturating_sub(size), page.size));
    }
    if start + size < total {
        links.insert("next", page_href(path, start + size, page.size));
    }
    let last_start = total.saturating_sub(1) / size * size;
    links.insert("last", page_href(path, last_start, page.size));
    links
}

/// Hal
///
/// Response wrapper that serializes its body as `application/hal+json`.
#[derive(Debug)]
pub struct Hal<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for Hal<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(body) => (
                self.0,
                [(header::CONTENT_TYPE, HeaderValue::from_static(HAL_JSON))],
                body,
            )
                .into_response(),
            Err(e) => ApiError::internal(format!("failed to serialize response: {e}")).into_response(),
        }
    }
}
