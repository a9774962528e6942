//! Maps a decoded [`RpcRequest`] to an inventory handler.
//!
//! Order per request: auth gate, method lookup, body decode, handler. The
//! gate runs first even for unknown methods, so probing for method names
//! without a session only ever yields `Unauthenticated`.

use super::messages::{
    AuthResponse, CardList, CardMessage, CardRef, CreateCardRequest, CreateLibraryRequest,
    Credentials, Empty, HealthCheckResponse, LibraryList, LibraryMessage, LibraryRef,
    MoveCardRequest, RpcRequest, RpcResponse,
};
use crate::auth::AuthGate;
use crate::error::{Code, Status};
use crate::inventory::{ops, AuthGrant, InventoryService};
use prost::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Dispatcher {
    gate: Arc<AuthGate>,
    service: Arc<InventoryService>,
}

impl Dispatcher {
    pub fn new(gate: Arc<AuthGate>, service: Arc<InventoryService>) -> Self {
        Self { gate, service }
    }

    /// Always produces a response; failures are carried in `code`.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id;
        // 0 means no deadline, and so does one past the clock's range.
        let deadline = match request.deadline_ms {
            0 => None,
            ms => Instant::now().checked_add(Duration::from_millis(ms)),
        };
        let result = match deadline {
            None => self.handle(&request).await,
            Some(deadline) => match tokio::time::timeout_at(deadline, self.handle(&request)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(method = %request.method, deadline_ms = request.deadline_ms, "rpc deadline exceeded");
                    Err(Status::deadline_exceeded())
                }
            },
        };

        match result {
            Ok(body) => RpcResponse {
                id,
                code: Code::Ok.as_i32(),
                message: String::new(),
                body,
            },
            Err(status) => RpcResponse {
                id,
                code: status.code().as_i32(),
                message: status.message().to_string(),
                body: Vec::new(),
            },
        }
    }

    async fn handle(&self, request: &RpcRequest) -> Result<Vec<u8>, Status> {
        let call = self.gate.authorize(&request.method, &request.metadata)?;
        let body = request.body.as_slice();
        let svc = &self.service;

        match request.method.as_str() {
            ops::HEALTH_CHECK => {
                decode::<Empty>(body)?;
                Ok(HealthCheckResponse {
                    status: svc.health().status.to_string(),
                }
                .encode_to_vec())
            }
            ops::CREATE_USER => {
                let req: Credentials = decode(body)?;
                let grant = svc.create_user(&call, &req.email, &req.password).await?;
                Ok(auth_response(grant))
            }
            ops::LOGIN => {
                let req: Credentials = decode(body)?;
                let grant = svc.login(&req.email, &req.password).await?;
                Ok(auth_response(grant))
            }
            ops::CREATE_LIBRARY => {
                let req: CreateLibraryRequest = decode(body)?;
                let library = svc.create_library(&call, &req.name).await?;
                Ok(LibraryMessage::from(library).encode_to_vec())
            }
            ops::GET_LIBRARIES => {
                decode::<Empty>(body)?;
                let libraries = svc.get_libraries(&call).await?;
                Ok(LibraryList {
                    libraries: libraries.into_iter().map(Into::into).collect(),
                }
                .encode_to_vec())
            }
            ops::GET_LIBRARY => {
                let req: LibraryRef = decode(body)?;
                let library = svc.get_library(&call, req.library_id).await?;
                Ok(LibraryMessage::from(library).encode_to_vec())
            }
            ops::DELETE_LIBRARY => {
                let req: LibraryRef = decode(body)?;
                svc.delete_library(&call, req.library_id).await?;
                Ok(Empty {}.encode_to_vec())
            }
            ops::CREATE_CARD => {
                let (library_id, card) = decode::<CreateCardRequest>(body)?.into_new_card();
                let card = svc.create_card(&call, library_id, card).await?;
                Ok(CardMessage::from(card).encode_to_vec())
            }
            ops::GET_CARDS => {
                let req: LibraryRef = decode(body)?;
                let cards = svc.get_cards(&call, req.library_id).await?;
                Ok(CardList {
                    cards: cards.into_iter().map(Into::into).collect(),
                }
                .encode_to_vec())
            }
            ops::GET_CARD => {
                let req: CardRef = decode(body)?;
                let card = svc.get_card(&call, req.card_id).await?;
                Ok(CardMessage::from(card).encode_to_vec())
            }
            ops::MOVE_CARD => {
                let req: MoveCardRequest = decode(body)?;
                let card = svc
                    .move_card(&call, req.card_id, req.source_library_id, req.dest_library_id)
                    .await?;
                Ok(CardMessage::from(card).encode_to_vec())
            }
            ops::DELETE_CARD => {
                let req: CardRef = decode(body)?;
                svc.delete_card(&call, req.card_id).await?;
                Ok(Empty {}.encode_to_vec())
            }
            other => Err(Status::unimplemented(other)),
        }
    }
}

fn decode<M: Message + Default>(body: &[u8]) -> Result<M, Status> {
    M::decode(body).map_err(|e| Status::invalid_argument(format!("malformed request body: {e}")))
}

fn auth_response(grant: AuthGrant) -> Vec<u8> {
    AuthResponse {
        user_id: grant.user_id.get(),
        token: grant.token,
    }
    .encode_to_vec()
}
