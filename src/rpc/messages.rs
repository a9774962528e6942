//! Protobuf messages for the RPC transport.
//!
//! The envelope pair ([`RpcRequest`], [`RpcResponse`]) wraps every call;
//! the `body` of each carries one of the per-operation messages below.

use crate::store::{Card, Library, NewCard};
use prost::Message;
use std::collections::HashMap;

#[derive(Clone, PartialEq, Message)]
pub struct RpcRequest {
    /// Echoed back in the matching response.
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub method: String,
    /// Call metadata (`authorization`, `x-device-secret`, ...).
    #[prost(map = "string, string", tag = "3")]
    pub metadata: HashMap<String, String>,
    #[prost(bytes = "vec", tag = "4")]
    pub body: Vec<u8>,
    /// Relative deadline; zero means none.
    #[prost(uint64, tag = "5")]
    pub deadline_ms: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RpcResponse {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    /// Numeric [`Code`](crate::error::Code).
    #[prost(int32, tag = "2")]
    pub code: i32,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(bytes = "vec", tag = "4")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, Message)]
pub struct HealthCheckResponse {
    #[prost(string, tag = "1")]
    pub status: String,
}

/// Body of both `CreateUser` and `Login`.
#[derive(Clone, PartialEq, Message)]
pub struct Credentials {
    #[prost(string, tag = "1")]
    pub email: String,
    #[prost(string, tag = "2")]
    pub password: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuthResponse {
    #[prost(int64, tag = "1")]
    pub user_id: i64,
    #[prost(string, tag = "2")]
    pub token: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct CreateLibraryRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct LibraryRef {
    #[prost(int64, tag = "1")]
    pub library_id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct LibraryMessage {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, tag = "3")]
    pub created_at: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct LibraryList {
    #[prost(message, repeated, tag = "1")]
    pub libraries: Vec<LibraryMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CreateCardRequest {
    #[prost(int64, tag = "1")]
    pub library_id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub set_name: String,
    #[prost(string, tag = "4")]
    pub condition: String,
    #[prost(bool, tag = "5")]
    pub foil: bool,
    #[prost(string, tag = "6")]
    pub collector_number: String,
    #[prost(int32, tag = "7")]
    pub usd_price: i32,
    #[prost(int32, tag = "8")]
    pub qty: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct CardRef {
    #[prost(int64, tag = "1")]
    pub card_id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct MoveCardRequest {
    #[prost(int64, tag = "1")]
    pub card_id: i64,
    #[prost(int64, tag = "2")]
    pub source_library_id: i64,
    #[prost(int64, tag = "3")]
    pub dest_library_id: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct CardMessage {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub library_id: i64,
    #[prost(string, tag = "3")]
    pub name: String,
    #[prost(string, tag = "4")]
    pub set_name: String,
    #[prost(string, tag = "5")]
    pub condition: String,
    #[prost(bool, tag = "6")]
    pub foil: bool,
    #[prost(string, tag = "7")]
    pub collector_number: String,
    #[prost(int32, tag = "8")]
    pub usd_price: i32,
    #[prost(int32, tag = "9")]
    pub qty: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct CardList {
    #[prost(message, repeated, tag = "1")]
    pub cards: Vec<CardMessage>,
}

impl From<Library> for LibraryMessage {
    fn from(library: Library) -> Self {
        Self {
            id: library.id,
            name: library.name,
            created_at: library.created_at,
        }
    }
}

impl From<Card> for CardMessage {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            library_id: card.library_id,
            name: card.name,
            set_name: card.set_name,
            condition: card.condition,
            foil: card.foil,
            collector_number: card.collector_number,
            usd_price: card.usd_price,
            qty: card.qty,
        }
    }
}

impl CreateCardRequest {
    pub fn into_new_card(self) -> (i64, NewCard) {
        (
            self.library_id,
            NewCard {
                name: self.name,
                set_name: self.set_name,
                condition: self.condition,
                foil: self.foil,
                collector_number: self.collector_number,
                usd_price: self.usd_price,
                qty: self.qty,
            },
        )
    }
}
