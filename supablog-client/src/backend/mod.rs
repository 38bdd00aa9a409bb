//! Backend service boundary.
//!
//! The repository talks to persistence only through the [`Backend`] trait so
//! the hosted Supabase implementation can be swapped for the in-memory one
//! in tests or local tooling.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;
use crate::query::QueryDescriptor;

pub use memory::MemoryBackend;
pub use supabase::SupabaseBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Run a composed query and return the matching rows in order.
    async fn select(&self, query: &QueryDescriptor) -> Result<Vec<Value>, Error>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, Error>;

    /// Patch the row with the given id. `None` when no such row exists.
    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Option<Value>, Error>;

    /// Delete the row with the given id; `false` when no such row exists.
    async fn delete(&self, table: &str, id: Uuid) -> Result<bool, Error>;
}
