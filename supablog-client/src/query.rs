//! Query composition: turns a `FilterRequest` into a structured descriptor
//! the backend boundary understands. `SupabaseBackend` renders descriptors
//! into PostgREST query parameters; `MemoryBackend` interprets them
//! directly.

use crate::config::Config;
use crate::error::Error;
use crate::models::FilterRequest;

pub const POSTS_TABLE: &str = "posts";

/// A single filter predicate on a table column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match on a text column.
    Eq { column: &'static str, value: String },
    /// Exact match on a boolean column.
    EqBool { column: &'static str, value: bool },
    /// Case-insensitive substring match against any of the columns.
    Search {
        columns: &'static [&'static str],
        needle: String,
    },
    /// Array column contains the given element.
    HasTag { column: &'static str, tag: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub table: &'static str,
    pub predicates: Vec<Predicate>,
    pub order_column: &'static str,
    pub ascending: bool,
    pub limit: u32,
    pub offset: u32,
}

/// Compose the listing query for a filter.
///
/// Non-privileged callers always get `published = true` forced onto the
/// query; `include_unpublished` cannot bypass it. Category and tag filters
/// are dropped when the corresponding feature flag is off.
pub fn compose(
    filter: &FilterRequest,
    privileged: bool,
    config: &Config,
) -> Result<QueryDescriptor, Error> {
    if filter.limit == Some(0) {
        return Err(Error::Validation("limit must be positive".to_string()));
    }
    let limit = filter.limit.unwrap_or(config.posts_per_page);

    let mut predicates = Vec::new();
    if !(privileged && filter.include_unpublished) {
        predicates.push(Predicate::EqBool {
            column: "published",
            value: true,
        });
    }
    if let Some(needle) = filter.query.as_deref().filter(|q| !q.trim().is_empty()) {
        predicates.push(Predicate::Search {
            columns: &["title", "content"],
            needle: needle.trim().to_string(),
        });
    }
    if config.enable_categories {
        if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
            predicates.push(Predicate::Eq {
                column: "category",
                value: category.to_string(),
            });
        }
    }
    if config.enable_tags {
        if let Some(tag) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
            predicates.push(Predicate::HasTag {
                column: "tags",
                tag: tag.to_string(),
            });
        }
    }

    let (order_column, ascending) = filter.order.unwrap_or_default().column();

    Ok(QueryDescriptor {
        table: POSTS_TABLE,
        predicates,
        order_column,
        ascending,
        limit,
        offset: filter.offset,
    })
}

/// Single-post lookup by slug, with the same published-only rule for
/// non-privileged callers.
pub fn by_slug(slug: &str, privileged: bool) -> QueryDescriptor {
    let mut predicates = vec![Predicate::Eq {
        column: "slug",
        value: slug.to_string(),
    }];
    if !privileged {
        predicates.push(Predicate::EqBool {
            column: "published",
            value: true,
        });
    }
    QueryDescriptor {
        table: POSTS_TABLE,
        predicates,
        order_column: "created_at",
        ascending: false,
        limit: 1,
        offset: 0,
    }
}
