//! Resource ownership checks.
//!
//! Every handler that names a library or card runs its lookup through
//! [`OwnershipGuard`] before touching the store. A resource that does not
//! exist and a resource owned by someone else produce the same `NotFound`;
//! only the log line tells them apart.

use crate::auth::UserId;
use crate::error::Status;
use crate::store::{Card, Library, RecordStore};

const LIBRARY_NOT_FOUND: &str = "library not found";
const CARD_NOT_FOUND: &str = "card not found";

pub struct OwnershipGuard<'a> {
    store: &'a dyn RecordStore,
}

/// Proof that a move was checked against both libraries and the card's
/// current location. Only [`OwnershipGuard::check_card_move`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePermit {
    card: Card,
    source: Library,
    dest: Library,
}

impl MovePermit {
    pub fn is_noop(&self) -> bool {
        self.source.id == self.dest.id
    }
}

impl<'a> OwnershipGuard<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    pub async fn check_library(&self, principal: UserId, library_id: i64) -> Result<Library, Status> {
        self.owned_library(principal, library_id)
            .await?
            .ok_or_else(|| Status::not_found(LIBRARY_NOT_FOUND))
    }

    /// The card and the library holding it, both owned by `principal`.
    pub async fn check_card(&self, principal: UserId, card_id: i64) -> Result<(Card, Library), Status> {
        let Some(card) = self.store.get_card(card_id).await? else {
            tracing::warn!(user = %principal, card_id, reason = "absent", "card access denied");
            return Err(Status::not_found(CARD_NOT_FOUND));
        };
        match self.owned_library(principal, card.library_id).await? {
            Some(library) => Ok((card, library)),
            None => {
                tracing::warn!(user = %principal, card_id, reason = "not_owned", "card access denied");
                Err(Status::not_found(CARD_NOT_FOUND))
            }
        }
    }

    /// Both libraries must belong to `principal` and the card must sit in
    /// `source_library_id` right now.
    pub async fn check_card_move(
        &self,
        principal: UserId,
        card_id: i64,
        source_library_id: i64,
        dest_library_id: i64,
    ) -> Result<MovePermit, Status> {
        let source = self.check_library(principal, source_library_id).await?;
        let dest = if dest_library_id == source_library_id {
            source.clone()
        } else {
            self.check_library(principal, dest_library_id).await?
        };

        let card = match self.store.get_card(card_id).await? {
            Some(card) if card.library_id == source.id => card,
            found => {
                let reason = if found.is_some() { "not_in_source" } else { "absent" };
                tracing::warn!(user = %principal, card_id, source_library_id, reason, "card move denied");
                return Err(Status::not_found(CARD_NOT_FOUND));
            }
        };

        Ok(MovePermit { card, source, dest })
    }

    /// Apply a checked move. The store update is conditional on the card
    /// still being in the source library, so a concurrent move loses cleanly.
    pub async fn apply_move(&self, permit: MovePermit) -> Result<Card, Status> {
        if permit.is_noop() {
            return Ok(permit.card);
        }
        let MovePermit { mut card, source, dest } = permit;
        if !self.store.move_card(card.id, source.id, dest.id).await? {
            tracing::warn!(card_id = card.id, source_library_id = source.id, "card left source library before move");
            return Err(Status::not_found(CARD_NOT_FOUND));
        }
        card.library_id = dest.id;
        Ok(card)
    }

    async fn owned_library(&self, principal: UserId, library_id: i64) -> Result<Option<Library>, Status> {
        if let Some(library) = self.store.get_library(library_id, principal).await? {
            return Ok(Some(library));
        }
        let reason = match self.store.library_exists(library_id).await {
            Ok(true) => "not_owned",
            Ok(false) => "absent",
            Err(_) => "unknown",
        };
        tracing::warn!(user = %principal, library_id, reason, "library access denied");
        Ok(None)
    }
}
