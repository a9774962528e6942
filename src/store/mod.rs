//! Record store for users, libraries and cards.
//!
//! The auth core only needs one guarantee from this layer: a library lookup
//! scoped to an owner returns `None` both when the row is missing and when
//! it belongs to someone else.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::auth::UserId;
use async_trait::async_trait;
use serde::Serialize;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    pub id: i64,
    pub owner: UserId,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: i64,
    pub library_id: i64,
    pub name: String,
    pub set_name: String,
    pub condition: String,
    pub foil: bool,
    pub collector_number: String,
    /// Price in US cents.
    pub usd_price: i32,
    pub qty: i32,
}

/// Fields for a card about to be inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCard {
    pub name: String,
    pub set_name: String,
    pub condition: String,
    pub foil: bool,
    pub collector_number: String,
    pub usd_price: i32,
    pub qty: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
    #[error("stored row is inconsistent: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Backend(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fails with `Conflict` when the email (case-insensitive) is taken.
    async fn create_user(&self, email: &str, password_hash: &str) -> StoreResult<User>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn create_library(&self, owner: UserId, name: &str) -> StoreResult<Library>;

    async fn list_libraries(&self, owner: UserId) -> StoreResult<Vec<Library>>;

    /// Owner-scoped lookup: `None` for missing rows and foreign rows alike.
    async fn get_library(&self, id: i64, owner: UserId) -> StoreResult<Option<Library>>;

    /// Unscoped existence check, for diagnostics only.
    async fn library_exists(&self, id: i64) -> StoreResult<bool>;

    /// Deletes the library and its cards. Returns false if nothing matched.
    async fn delete_library(&self, id: i64, owner: UserId) -> StoreResult<bool>;

    async fn create_card(&self, library_id: i64, card: &NewCard) -> StoreResult<Card>;

    async fn list_cards(&self, library_id: i64) -> StoreResult<Vec<Card>>;

    async fn get_card(&self, id: i64) -> StoreResult<Option<Card>>;

    /// Moves `card_id` only if it currently sits in `from`.
    async fn move_card(&self, card_id: i64, from: i64, to: i64) -> StoreResult<bool>;

    async fn delete_card(&self, card_id: i64, library_id: i64) -> StoreResult<bool>;
}
