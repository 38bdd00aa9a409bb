//! Result normalization: raw backend rows to the canonical `Post`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::models::Post;

/// Raw row shape as the backend returns it. Every column may be null or
/// absent; `normalize` decides what is required.
#[derive(Debug, Deserialize)]
struct RawPost {
    id: Option<Uuid>,
    title: Option<String>,
    slug: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    content: Option<String>,
    excerpt: Option<String>,
    category: Option<String>,
    published: Option<bool>,
    views: Option<i64>,
    author_id: Option<Uuid>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    featured_image: Option<String>,
    tags: Option<Vec<String>>,
}

/// Map a raw backend row into a `Post`.
///
/// Required fields: id, title, slug, created_at — a row missing any of them
/// is a `MalformedRecord`. Optional fields fall back to documented
/// defaults: empty content, empty tag list, zero views, unpublished, and
/// `updated_at = created_at`.
pub fn normalize(row: Value) -> Result<Post, Error> {
    let raw: RawPost =
        serde_json::from_value(row).map_err(|e| Error::MalformedRecord(e.to_string()))?;

    let id = raw
        .id
        .ok_or_else(|| Error::MalformedRecord("record is missing id".to_string()))?;
    let title = raw
        .title
        .ok_or_else(|| Error::MalformedRecord("record is missing title".to_string()))?;
    let slug = raw
        .slug
        .ok_or_else(|| Error::MalformedRecord("record is missing slug".to_string()))?;
    let created_at = raw
        .created_at
        .ok_or_else(|| Error::MalformedRecord("record is missing created_at".to_string()))?;

    // created_at <= updated_at is an invariant of the canonical entity
    let updated_at = raw.updated_at.unwrap_or(created_at).max(created_at);

    Ok(Post {
        id,
        title,
        content: raw.content.unwrap_or_default(),
        excerpt: raw.excerpt,
        category: raw.category,
        published: raw.published.unwrap_or(false),
        views: raw.views.unwrap_or(0).max(0),
        created_at,
        updated_at,
        author_id: raw.author_id,
        slug,
        meta_title: raw.meta_title,
        meta_description: raw.meta_description,
        featured_image: raw.featured_image,
        tags: raw.tags.unwrap_or_default(),
    })
}
