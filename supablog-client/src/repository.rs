//! Post repository: CRUD and listing over an injected backend.
//!
//! The repository is the sole writer of record. It composes queries, feeds
//! raw rows through the normalizer and enforces authorship, slug and
//! published-visibility rules. Deletes are hard deletes.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::Error;
use crate::models::{slugify, Caller, FilterRequest, Post, PostDraft, PostUpdate};
use crate::normalize::normalize;
use crate::query::{self, POSTS_TABLE};

pub struct PostRepository {
    backend: Arc<dyn Backend>,
    config: Arc<Config>,
    caller: Caller,
}

impl PostRepository {
    pub fn new(backend: Arc<dyn Backend>, config: Arc<Config>, caller: Caller) -> Self {
        Self {
            backend,
            config,
            caller,
        }
    }

    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    fn privileged(&self) -> bool {
        self.caller.is_privileged(&self.config)
    }

    /// List posts matching the filter, newest first unless the filter says
    /// otherwise.
    pub async fn list(&self, filter: &FilterRequest) -> Result<Vec<Post>, Error> {
        let query = query::compose(filter, self.privileged(), &self.config)?;
        tracing::debug!(table = query.table, predicates = query.predicates.len(), "list");
        let rows = self.backend.select(&query).await?;
        rows.into_iter().map(normalize).collect()
    }

    /// Fetch one post by slug.
    ///
    /// With `increment_view` the view counter is bumped as a side effect of
    /// the read. The bump is best-effort: a failed counter write is logged
    /// and the post is still returned. Concurrent readers may race on the
    /// counter; the hosted schema owns eventual consistency there.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        increment_view: bool,
    ) -> Result<Option<Post>, Error> {
        let query = query::by_slug(slug, self.privileged());
        let rows = self.backend.select(&query).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let post = normalize(row)?;

        if increment_view {
            let patch = json!({ "views": post.views + 1 });
            match self.backend.update(POSTS_TABLE, post.id, patch).await {
                Ok(Some(row)) => return Ok(Some(normalize(row)?)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(slug, error = %e, "view counter update failed");
                }
            }
        }

        Ok(Some(post))
    }

    /// Create a post from a draft.
    ///
    /// The slug is taken from the draft or derived from the title; a taken
    /// slug is a `Conflict`. The backend's unique constraint remains the
    /// final word when two writers race past the pre-check.
    pub async fn create(&self, draft: PostDraft, author_id: Option<Uuid>) -> Result<Post, Error> {
        if draft.title.trim().is_empty() {
            return Err(Error::Validation("title cannot be empty".to_string()));
        }
        let slug = match draft.slug.as_deref().filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_string(),
            None => slugify(&draft.title),
        };
        if slug.is_empty() {
            return Err(Error::Validation(
                "title does not produce a usable slug".to_string(),
            ));
        }

        let existing = self.backend.select(&query::by_slug(&slug, true)).await?;
        if !existing.is_empty() {
            return Err(Error::Conflict(format!("slug '{slug}' already exists")));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let row = json!({
            "id": id,
            "title": draft.title,
            "content": draft.content,
            "excerpt": draft.excerpt,
            "category": draft.category,
            "published": draft.published,
            "views": 0,
            "created_at": now,
            "updated_at": now,
            "author_id": author_id,
            "slug": slug,
            "meta_title": draft.meta_title,
            "meta_description": draft.meta_description,
            "featured_image": draft.featured_image,
            "tags": draft.tags,
        });

        let created = self.backend.insert(POSTS_TABLE, row).await?;
        tracing::info!(%id, slug, "post created");
        normalize(created)
    }

    /// Apply a partial update; refreshes `updated_at`.
    pub async fn update(&self, patch: PostUpdate) -> Result<Post, Error> {
        let mut body = Map::new();
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(Error::Validation("title cannot be empty".to_string()));
            }
            body.insert("title".to_string(), json!(title));
        }
        if let Some(content) = &patch.content {
            body.insert("content".to_string(), json!(content));
        }
        if let Some(excerpt) = &patch.excerpt {
            body.insert("excerpt".to_string(), json!(excerpt));
        }
        if let Some(category) = &patch.category {
            body.insert("category".to_string(), json!(category));
        }
        if let Some(published) = patch.published {
            body.insert("published".to_string(), json!(published));
        }
        if let Some(slug) = &patch.slug {
            self.ensure_slug_free(slug, patch.id).await?;
            body.insert("slug".to_string(), json!(slug));
        }
        if let Some(meta_title) = &patch.meta_title {
            body.insert("meta_title".to_string(), json!(meta_title));
        }
        if let Some(meta_description) = &patch.meta_description {
            body.insert("meta_description".to_string(), json!(meta_description));
        }
        if let Some(featured_image) = &patch.featured_image {
            body.insert("featured_image".to_string(), json!(featured_image));
        }
        if let Some(tags) = &patch.tags {
            body.insert("tags".to_string(), json!(tags));
        }
        body.insert("updated_at".to_string(), json!(Utc::now()));

        match self
            .backend
            .update(POSTS_TABLE, patch.id, Value::Object(body))
            .await?
        {
            Some(row) => {
                tracing::info!(id = %patch.id, "post updated");
                normalize(row)
            }
            None => Err(Error::NotFound),
        }
    }

    /// Remove a post permanently.
    pub async fn delete(&self, id: Uuid) -> Result<(), Error> {
        if self.backend.delete(POSTS_TABLE, id).await? {
            tracing::info!(%id, "post deleted");
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    async fn ensure_slug_free(&self, slug: &str, own_id: Uuid) -> Result<(), Error> {
        let rows = self.backend.select(&query::by_slug(slug, true)).await?;
        let own_id = own_id.to_string();
        let taken = rows
            .iter()
            .any(|r| r.get("id").and_then(Value::as_str) != Some(own_id.as_str()));
        if taken {
            Err(Error::Conflict(format!("slug '{slug}' already exists")))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use chrono::TimeZone;

    fn config() -> Arc<Config> {
        Arc::new(Config::new("https://example.supabase.co", "anon-key"))
    }

    fn admin() -> Caller {
        Caller::User {
            id: Uuid::new_v4(),
            role: Some("admin".to_string()),
        }
    }

    fn repo_pair() -> (Arc<MemoryBackend>, PostRepository, PostRepository) {
        let backend = Arc::new(MemoryBackend::new());
        let config = config();
        let privileged =
            PostRepository::new(backend.clone(), config.clone(), admin());
        let anonymous =
            PostRepository::new(backend.clone(), config, Caller::Anonymous);
        (backend, privileged, anonymous)
    }

    fn draft(title: &str, category: Option<&str>, published: bool) -> PostDraft {
        PostDraft {
            title: title.to_string(),
            content: format!("content of {title}"),
            category: category.map(str::to_string),
            published,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_get_by_slug_round_trips() {
        let (_, repo, _) = repo_pair();
        let author = Uuid::new_v4();
        let created = repo
            .create(draft("Hello, World!", None, true), Some(author))
            .await
            .unwrap();
        assert_eq!(created.slug, "hello-world");
        assert_eq!(created.author_id, Some(author));
        assert_eq!(created.views, 0);

        let fetched = repo.get_by_slug("hello-world", false).await.unwrap().unwrap();
        assert_eq!(fetched.title, created.title);
        assert_eq!(fetched.content, created.content);
    }

    #[tokio::test]
    async fn slug_collision_is_a_conflict() {
        let (_, repo, _) = repo_pair();
        repo.create(draft("Hello, World!", None, true), None)
            .await
            .unwrap();
        let err = repo
            .create(draft("Hello!! World", None, true), None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let (_, repo, _) = repo_pair();
        let err = repo.create(draft("   ", None, true), None).await.unwrap_err();
        assert!(err.is_validation());
        let err = repo.create(draft("!!!", None, true), None).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn delete_makes_slug_unresolvable() {
        let (_, repo, _) = repo_pair();
        let post = repo
            .create(draft("Going away", None, true), None)
            .await
            .unwrap();
        repo.delete(post.id).await.unwrap();
        assert!(repo.get_by_slug(&post.slug, false).await.unwrap().is_none());

        let err = repo.delete(post.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_refreshes_updated_at() {
        let (_, repo, _) = repo_pair();
        let post = repo
            .create(draft("Original", None, true), None)
            .await
            .unwrap();

        let mut patch = PostUpdate::new(post.id);
        patch.title = Some("Edited".to_string());
        let updated = repo.update(patch).await.unwrap();
        assert_eq!(updated.title, "Edited");
        assert_eq!(updated.slug, post.slug);
        assert!(updated.updated_at >= post.updated_at);

        let mut missing = PostUpdate::new(Uuid::new_v4());
        missing.title = Some("Nobody".to_string());
        assert!(repo.update(missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn unpublished_posts_are_invisible_to_anonymous_callers() {
        let (_, privileged, anonymous) = repo_pair();
        privileged
            .create(draft("Secret draft", None, false), None)
            .await
            .unwrap();

        assert!(anonymous
            .get_by_slug("secret-draft", false)
            .await
            .unwrap()
            .is_none());

        let filter = FilterRequest {
            include_unpublished: true,
            ..Default::default()
        };
        assert!(anonymous.list(&filter).await.unwrap().is_empty());

        let posts = privileged.list(&filter).await.unwrap();
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn read_for_display_increments_views() {
        let (_, repo, _) = repo_pair();
        repo.create(draft("Counted", None, true), None).await.unwrap();

        let first = repo.get_by_slug("counted", true).await.unwrap().unwrap();
        assert_eq!(first.views, 1);
        let second = repo.get_by_slug("counted", true).await.unwrap().unwrap();
        assert_eq!(second.views, 2);
        // plain read does not bump the counter
        let third = repo.get_by_slug("counted", false).await.unwrap().unwrap();
        assert_eq!(third.views, 2);
    }

    #[tokio::test]
    async fn category_listing_is_limited_and_newest_first() {
        let (backend, _, anonymous) = repo_pair();
        for day in 1..=7 {
            let created = Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap();
            backend
                .insert(
                    POSTS_TABLE,
                    json!({
                        "id": Uuid::new_v4(),
                        "title": format!("Tech {day}"),
                        "slug": format!("tech-{day}"),
                        "category": "Technology",
                        "published": true,
                        "created_at": created,
                        "updated_at": created,
                    }),
                )
                .await
                .unwrap();
        }
        backend
            .insert(
                POSTS_TABLE,
                json!({
                    "id": Uuid::new_v4(),
                    "title": "Off topic",
                    "slug": "off-topic",
                    "category": "Travel",
                    "published": true,
                    "created_at": Utc.with_ymd_and_hms(2026, 1, 8, 0, 0, 0).unwrap(),
                }),
            )
            .await
            .unwrap();

        let filter = FilterRequest {
            category: Some("Technology".to_string()),
            limit: Some(5),
            ..Default::default()
        };
        let posts = anonymous.list(&filter).await.unwrap();
        assert_eq!(posts.len(), 5);
        assert!(posts.iter().all(|p| p.category.as_deref() == Some("Technology")));
        assert!(posts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        // newest five of the seven
        assert_eq!(posts[0].slug, "tech-7");
        assert_eq!(posts[4].slug, "tech-3");
    }

    #[tokio::test]
    async fn slug_change_checks_for_collisions() {
        let (_, repo, _) = repo_pair();
        repo.create(draft("First", None, true), None).await.unwrap();
        let second = repo.create(draft("Second", None, true), None).await.unwrap();

        let mut patch = PostUpdate::new(second.id);
        patch.slug = Some("first".to_string());
        assert!(repo.update(patch).await.unwrap_err().is_conflict());

        // renaming to its own slug is not a collision
        let mut patch = PostUpdate::new(second.id);
        patch.slug = Some("second".to_string());
        assert_eq!(repo.update(patch).await.unwrap().slug, "second");
    }
}
