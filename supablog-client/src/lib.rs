//! Typed client toolkit for Supabase-backed blogs.
//!
//! The pieces compose bottom-up: a [`Config`] feeds a backend
//! implementation, the [`PostRepository`] runs CRUD and filtered listings
//! over it, and [`PostFeed`] exposes listings reactively. [`SupablogClient`]
//! wires the default (hosted) stack together; every piece can also be
//! assembled by hand with a substitute [`backend::Backend`].

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod query;
pub mod repository;
pub mod watch;

use std::sync::Arc;

use auth::AuthClient;
use backend::SupabaseBackend;

pub use config::Config;
pub use error::Error;
pub use models::{
    slugify, Caller, FilterRequest, OrderBy, Post, PostDraft, PostUpdate, Session, User,
};
pub use repository::PostRepository;
pub use watch::{FetchState, PostFeed};

/// Unified client over the hosted backend: one configuration, one backend
/// connection, one auth session shared by the repositories it hands out.
#[derive(Clone)]
pub struct SupablogClient {
    config: Arc<Config>,
    backend: Arc<SupabaseBackend>,
    auth: AuthClient,
}

impl SupablogClient {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let config = Arc::new(config);
        let backend = Arc::new(SupabaseBackend::new(&config));
        let auth = AuthClient::new(config.clone());
        Ok(Self {
            config,
            backend,
            auth,
        })
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::new(Config::from_env()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    /// Sign in and route subsequent data requests through the user's token.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let session = self.auth.sign_in(email, password).await?;
        self.backend
            .set_token(Some(session.access_token.clone()))
            .await;
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<(), Error> {
        self.auth.sign_out().await?;
        self.backend.set_token(None).await;
        Ok(())
    }

    /// Resume a saved session; returns the user when the token is still
    /// accepted by the backend.
    pub async fn restore_session(&self, access_token: &str) -> Result<Option<User>, Error> {
        let user = self.auth.restore(access_token).await?;
        if user.is_some() {
            self.backend
                .set_token(Some(access_token.to_string()))
                .await;
        }
        Ok(user)
    }

    /// Repository bound to the current caller identity.
    pub async fn posts(&self) -> PostRepository {
        PostRepository::new(
            self.backend.clone(),
            self.config.clone(),
            self.auth.caller().await,
        )
    }

    /// Reactive feed over the current caller's repository.
    pub async fn feed(&self) -> PostFeed {
        PostFeed::new(Arc::new(self.posts().await))
    }
}
