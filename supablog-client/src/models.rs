use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// Canonical blog post as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub published: bool,
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_id: Option<Uuid>,
    pub slug: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
}

/// Unsaved post data supplied to `create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub published: bool,
    /// Explicit slug; generated from the title when absent.
    pub slug: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostUpdate {
    pub id: Uuid,
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub published: Option<bool>,
    pub slug: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PostUpdate {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            title: None,
            content: None,
            excerpt: None,
            category: None,
            published: None,
            slug: None,
            meta_title: None,
            meta_description: None,
            featured_image: None,
            tags: None,
        }
    }
}

/// Sort order for listings. The default matches what readers expect from a
/// blog index: newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderBy {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    UpdatedAtDesc,
    ViewsDesc,
}

impl OrderBy {
    /// Column name and ascending flag for the backend query.
    pub fn column(self) -> (&'static str, bool) {
        match self {
            OrderBy::CreatedAtDesc => ("created_at", false),
            OrderBy::CreatedAtAsc => ("created_at", true),
            OrderBy::UpdatedAtDesc => ("updated_at", false),
            OrderBy::ViewsDesc => ("views", false),
        }
    }
}

/// Filter parameters for `list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Case-insensitive substring match against title and content.
    pub query: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    /// Page size; defaults to `Config::posts_per_page`. Zero is rejected.
    pub limit: Option<u32>,
    pub offset: u32,
    /// Honored only for privileged callers; everyone else sees published
    /// posts regardless of this flag.
    pub include_unpublished: bool,
    pub order: Option<OrderBy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
}

/// Identity attached to a repository instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Caller {
    Anonymous,
    User { id: Uuid, role: Option<String> },
}

impl Caller {
    pub fn from_session(session: &Session) -> Self {
        Caller::User {
            id: session.user.id,
            role: session.user.role.clone(),
        }
    }

    /// Privileged callers may see unpublished posts.
    pub fn is_privileged(&self, config: &Config) -> bool {
        matches!(self, Caller::User { role: Some(role), .. } if role == &config.admin_role)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::Anonymous => None,
            Caller::User { id, .. } => Some(*id),
        }
    }
}

/// Derive a URL-safe slug from a title: lowercase, runs of
/// non-alphanumeric characters collapsed to a single hyphen, trimmed.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}
