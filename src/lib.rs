//! cardsorter: a multi-tenant card inventory service.
//!
//! Two transports (binary RPC over TCP, HTTP/JSON via axum) share one
//! [`auth::AuthGate`] and one [`inventory::InventoryService`]. The gate
//! decides whether a call may proceed at all; the inventory handlers run
//! the [`inventory::OwnershipGuard`] before touching any library or card.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod rpc;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{Code, Status};
