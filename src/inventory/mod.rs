//! Inventory handlers shared by the RPC transport and the HTTP gateway.
//!
//! Each method takes the [`AuthenticatedCall`] the gate produced. Methods
//! that name a library or card go through the [`OwnershipGuard`] before
//! the store is touched.

pub mod guard;
pub mod ops;

pub use guard::{MovePermit, OwnershipGuard};

use crate::auth::password::{dummy_verify, hash_password, verify_password};
use crate::auth::{AuthenticatedCall, TokenCodec, UserId};
use crate::error::Status;
use crate::store::{Card, Library, NewCard, RecordStore};
use serde::Serialize;
use std::sync::Arc;

const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_LIBRARY_NAME_LEN: usize = 128;

/// Returned by registration and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthGrant {
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
}

pub struct InventoryService {
    store: Arc<dyn RecordStore>,
    codec: TokenCodec,
    password_iterations: u32,
}

impl InventoryService {
    pub fn new(store: Arc<dyn RecordStore>, codec: TokenCodec, password_iterations: u32) -> Self {
        Self {
            store,
            codec,
            password_iterations,
        }
    }

    fn guard(&self) -> OwnershipGuard<'_> {
        OwnershipGuard::new(self.store.as_ref())
    }

    pub fn health(&self) -> HealthReport {
        HealthReport { status: "SERVING" }
    }

    /// Register a user. Only reachable by device-authenticated callers.
    pub async fn create_user(
        &self,
        call: &AuthenticatedCall,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, Status> {
        let email = validate_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Status::invalid_argument(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password = password.to_string();
        let iterations = self.password_iterations;
        let hash = blocking(move || hash_password(&password, iterations)).await?;
        let user = self.store.create_user(email, &hash).await?;

        tracing::info!(user = %user.id, device = call.is_device(), "user registered");
        Ok(AuthGrant {
            user_id: user.id,
            token: self.codec.issue(user.id),
        })
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthGrant, Status> {
        let user = self.store.get_user_by_email(email.trim()).await?;
        let password = password.to_string();
        let iterations = self.password_iterations;

        let Some(user) = user else {
            blocking(move || dummy_verify(&password, iterations)).await?;
            tracing::warn!(reason = "unknown_email", "login rejected");
            return Err(Status::unauthenticated());
        };

        let encoded = user.password_hash.clone();
        if !blocking(move || verify_password(&password, &encoded)).await? {
            tracing::warn!(user = %user.id, reason = "wrong_password", "login rejected");
            return Err(Status::unauthenticated());
        }

        tracing::info!(user = %user.id, "login succeeded");
        Ok(AuthGrant {
            user_id: user.id,
            token: self.codec.issue(user.id),
        })
    }

    pub async fn create_library(&self, call: &AuthenticatedCall, name: &str) -> Result<Library, Status> {
        let owner = call.principal()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Status::invalid_argument("library name must not be empty"));
        }
        if name.chars().count() > MAX_LIBRARY_NAME_LEN {
            return Err(Status::invalid_argument(format!(
                "library name must be at most {MAX_LIBRARY_NAME_LEN} characters"
            )));
        }
        Ok(self.store.create_library(owner, name).await?)
    }

    pub async fn get_libraries(&self, call: &AuthenticatedCall) -> Result<Vec<Library>, Status> {
        let owner = call.principal()?;
        Ok(self.store.list_libraries(owner).await?)
    }

    pub async fn get_library(&self, call: &AuthenticatedCall, library_id: i64) -> Result<Library, Status> {
        let owner = call.principal()?;
        self.guard().check_library(owner, library_id).await
    }

    /// Deletes the library together with its cards.
    pub async fn delete_library(&self, call: &AuthenticatedCall, library_id: i64) -> Result<(), Status> {
        let owner = call.principal()?;
        let library = self.guard().check_library(owner, library_id).await?;
        if !self.store.delete_library(library.id, owner).await? {
            return Err(Status::not_found("library not found"));
        }
        tracing::info!(user = %owner, library_id, "library deleted");
        Ok(())
    }

    pub async fn create_card(
        &self,
        call: &AuthenticatedCall,
        library_id: i64,
        card: NewCard,
    ) -> Result<Card, Status> {
        let owner = call.principal()?;
        let card = validate_card(card)?;
        let library = self.guard().check_library(owner, library_id).await?;
        Ok(self.store.create_card(library.id, &card).await?)
    }

    pub async fn get_cards(&self, call: &AuthenticatedCall, library_id: i64) -> Result<Vec<Card>, Status> {
        let owner = call.principal()?;
        let library = self.guard().check_library(owner, library_id).await?;
        Ok(self.store.list_cards(library.id).await?)
    }

    pub async fn get_card(&self, call: &AuthenticatedCall, card_id: i64) -> Result<Card, Status> {
        let owner = call.principal()?;
        let (card, _) = self.guard().check_card(owner, card_id).await?;
        Ok(card)
    }

    pub async fn move_card(
        &self,
        call: &AuthenticatedCall,
        card_id: i64,
        source_library_id: i64,
        dest_library_id: i64,
    ) -> Result<Card, Status> {
        let owner = call.principal()?;
        let guard = self.guard();
        let permit = guard
            .check_card_move(owner, card_id, source_library_id, dest_library_id)
            .await?;
        guard.apply_move(permit).await
    }

    pub async fn delete_card(&self, call: &AuthenticatedCall, card_id: i64) -> Result<(), Status> {
        let owner = call.principal()?;
        let (card, library) = self.guard().check_card(owner, card_id).await?;
        if !self.store.delete_card(card.id, library.id).await? {
            return Err(Status::not_found("card not found"));
        }
        Ok(())
    }
}

/// Run CPU-heavy password work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, Status>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "password task failed");
        Status::internal()
    })
}

fn validate_email(email: &str) -> Result<&str, Status> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Status::invalid_argument("email must not be empty"));
    }
    if !email.contains('@') {
        return Err(Status::invalid_argument("email must contain '@'"));
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(Status::invalid_argument(format!(
            "email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    Ok(email)
}

/// Zero quantity means "not given" and becomes 1.
fn validate_card(mut card: NewCard) -> Result<NewCard, Status> {
    card.name = card.name.trim().to_string();
    if card.name.is_empty() {
        return Err(Status::invalid_argument("card name must not be empty"));
    }
    if card.qty == 0 {
        card.qty = 1;
    }
    if card.qty < 0 {
        return Err(Status::invalid_argument("qty must be at least 1"));
    }
    if card.usd_price < 0 {
        return Err(Status::invalid_argument("usd_price must not be negative"));
    }
    Ok(card)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::DEFAULT_TOKEN_TTL;
    use crate::auth::CallerIdentity;
    use crate::error::Code;
    use crate::store::SqliteStore;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> (TokenCodec, InventoryService) {
        let codec = TokenCodec::new(KEY, DEFAULT_TOKEN_TTL);
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        (codec.clone(), InventoryService::new(store, codec, 1_000))
    }

    fn device() -> AuthenticatedCall {
        AuthenticatedCall::new(ops::CREATE_USER, CallerIdentity::Device)
    }

    fn as_user(op: &str, user: UserId) -> AuthenticatedCall {
        AuthenticatedCall::for_user(op, user)
    }

    async fn register(svc: &InventoryService, email: &str) -> UserId {
        svc.create_user(&device(), email, "hunter2hunter2")
            .await
            .unwrap()
            .user_id
    }

    #[tokio::test]
    async fn registration_issues_a_usable_token() {
        let (codec, svc) = service();
        let grant = svc
            .create_user(&device(), "ada@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(codec.verify(&grant.token).unwrap(), grant.user_id);
    }

    #[tokio::test]
    async fn registration_validates_input() {
        let (_, svc) = service();
        for (email, password) in [
            ("", "hunter2hunter2"),
            ("no-at-sign", "hunter2hunter2"),
            ("ada@example.com", "short"),
        ] {
            let status = svc.create_user(&device(), email, password).await.unwrap_err();
            assert_eq!(status.code(), Code::InvalidArgument, "{email:?}/{password:?}");
        }
        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            svc.create_user(&device(), &long, "hunter2hunter2")
                .await
                .unwrap_err()
                .code(),
            Code::InvalidArgument
        );
    }

    #[tokio::test]
    async fn duplicate_registration_is_already_exists() {
        let (_, svc) = service();
        register(&svc, "ada@example.com").await;
        let status = svc
            .create_user(&device(), "Ada@Example.com", "hunter2hunter2")
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn login_failures_are_uniform() {
        let (codec, svc) = service();
        let id = register(&svc, "ada@example.com").await;

        let grant = svc.login("ada@example.com", "hunter2hunter2").await.unwrap();
        assert_eq!(grant.user_id, id);
        assert_eq!(codec.verify(&grant.token).unwrap(), id);

        let wrong = svc.login("ada@example.com", "nope-nope").await.unwrap_err();
        let unknown = svc.login("bob@example.com", "hunter2hunter2").await.unwrap_err();
        assert_eq!(wrong, Status::unauthenticated());
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn library_operations_require_a_user_principal() {
        let (_, svc) = service();
        let status = svc.get_libraries(&device()).await.unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn second_user_cannot_see_or_delete_first_users_library() {
        let (_, svc) = service();
        let u1 = register(&svc, "u1@example.com").await;
        let u2 = register(&svc, "u2@example.com").await;
        let lib = svc
            .create_library(&as_user(ops::CREATE_LIBRARY, u1), "L1")
            .await
            .unwrap();

        let get = svc
            .get_library(&as_user(ops::GET_LIBRARY, u2), lib.id)
            .await
            .unwrap_err();
        let del = svc
            .delete_library(&as_user(ops::DELETE_LIBRARY, u2), lib.id)
            .await
            .unwrap_err();
        assert_eq!(get.code(), Code::NotFound);
        assert_eq!(del.code(), Code::NotFound);
        assert!(svc
            .get_libraries(&as_user(ops::GET_LIBRARIES, u2))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            svc.get_library(&as_user(ops::GET_LIBRARY, u1), lib.id)
                .await
                .unwrap(),
            lib
        );
    }

    #[tokio::test]
    async fn library_name_is_validated() {
        let (_, svc) = service();
        let u1 = register(&svc, "u1@example.com").await;
        let call = as_user(ops::CREATE_LIBRARY, u1);
        assert_eq!(
            svc.create_library(&call, "   ").await.unwrap_err().code(),
            Code::InvalidArgument
        );
        assert_eq!(
            svc.create_library(&call, &"x".repeat(129)).await.unwrap_err().code(),
            Code::InvalidArgument
        );
    }

    #[tokio::test]
    async fn card_lifecycle() {
        let (_, svc) = service();
        let u1 = register(&svc, "u1@example.com").await;
        let a = svc
            .create_library(&as_user(ops::CREATE_LIBRARY, u1), "A")
            .await
            .unwrap();
        let b = svc
            .create_library(&as_user(ops::CREATE_LIBRARY, u1), "B")
            .await
            .unwrap();

        let card = svc
            .create_card(
                &as_user(ops::CREATE_CARD, u1),
                a.id,
                NewCard {
                    name: "Shivan Dragon".into(),
                    ..NewCard::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(card.qty, 1);

        let moved = svc
            .move_card(&as_user(ops::MOVE_CARD, u1), card.id, a.id, b.id)
            .await
            .unwrap();
        assert_eq!(moved.library_id, b.id);
        assert!(svc
            .get_cards(&as_user(ops::GET_CARDS, u1), a.id)
            .await
            .unwrap()
            .is_empty());

        svc.delete_card(&as_user(ops::DELETE_CARD, u1), card.id)
            .await
            .unwrap();
        assert_eq!(
            svc.get_card(&as_user(ops::GET_CARD, u1), card.id)
                .await
                .unwrap_err()
                .code(),
            Code::NotFound
        );
    }

    #[tokio::test]
    async fn card_input_is_validated() {
        let (_, svc) = service();
        let u1 = register(&svc, "u1@example.com").await;
        let lib = svc
            .create_library(&as_user(ops::CREATE_LIBRARY, u1), "A")
            .await
            .unwrap();
        let call = as_user(ops::CREATE_CARD, u1);

        for card in [
            NewCard::default(),
            NewCard {
                name: "Lotus".into(),
                qty: -1,
                ..NewCard::default()
            },
            NewCard {
                name: "Lotus".into(),
                usd_price: -5,
                ..NewCard::default()
            },
        ] {
            assert_eq!(
                svc.create_card(&call, lib.id, card).await.unwrap_err().code(),
                Code::InvalidArgument
            );
        }
    }

    #[tokio::test]
    async fn cards_in_foreign_library_are_hidden() {
        let (_, svc) = service();
        let u1 = register(&svc, "u1@example.com").await;
        let u2 = register(&svc, "u2@example.com").await;
        let lib = svc
            .create_library(&as_user(ops::CREATE_LIBRARY, u1), "A")
            .await
            .unwrap();
        let card = svc
            .create_card(
                &as_user(ops::CREATE_CARD, u1),
                lib.id,
                NewCard {
                    name: "Lotus".into(),
                    ..NewCard::default()
                },
            )
            .await
            .unwrap();

        for status in [
            svc.get_cards(&as_user(ops::GET_CARDS, u2), lib.id).await.unwrap_err(),
            svc.get_card(&as_user(ops::GET_CARD, u2), card.id).await.unwrap_err(),
            svc.delete_card(&as_user(ops::DELETE_CARD, u2), card.id).await.unwrap_err(),
            svc.create_card(
                &as_user(ops::CREATE_CARD, u2),
                lib.id,
                NewCard {
                    name: "Forgery".into(),
                    ..NewCard::default()
                },
            )
            .await
            .unwrap_err(),
        ] {
            assert_eq!(status.code(), Code::NotFound);
        }
        assert_eq!(
            svc.get_card(&as_user(ops::GET_CARD, u1), card.id).await.unwrap(),
            card
        );
    }

    #[tokio::test]
    async fn deleting_library_removes_its_cards() {
        let (_, svc) = service();
        let u1 = register(&svc, "u1@example.com").await;
        let lib = svc
            .create_library(&as_user(ops::CREATE_LIBRARY, u1), "A")
            .await
            .unwrap();
        let card = svc
            .create_card(
                &as_user(ops::CREATE_CARD, u1),
                lib.id,
                NewCard {
                    name: "Lotus".into(),
                    ..NewCard::default()
                },
            )
            .await
            .unwrap();

        svc.delete_library(&as_user(ops::DELETE_LIBRARY, u1), lib.id)
            .await
            .unwrap();
        assert_eq!(
            svc.get_card(&as_user(ops::GET_CARD, u1), card.id)
                .await
                .unwrap_err()
                .code(),
            Code::NotFound
        );
    }
}
