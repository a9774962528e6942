//! Binary RPC transport over TCP.
//!
//! # Wire Format
//!
//! ```text
//! +----------------------------+------------------------------+
//! | Length (4 bytes, BE)       | RpcRequest / RpcResponse     |
//! +----------------------------+------------------------------+
//! ```
//!
//! A connection handles its requests one at a time; connections run
//! concurrently, one tokio task each.

pub mod client;
pub mod dispatch;
pub mod messages;

pub use client::{ClientError, RpcClient};
pub use dispatch::Dispatcher;
pub use messages::{RpcRequest, RpcResponse};

use crate::error::Status;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use prost::bytes::Bytes;
use prost::Message;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::Instrument;

/// Default maximum frame size (1 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("undecodable frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("connection closed")]
    Closed,
}

/// Length-prefixed codec shared by server and client.
pub fn frame_codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

pub struct RpcServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    max_frame_bytes: usize,
}

impl RpcServer {
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher, max_frame_bytes: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher,
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "rpc listener started");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "rpc accept failed");
                        continue;
                    }
                },
            };

            let dispatcher = self.dispatcher.clone();
            let max_frame_bytes = self.max_frame_bytes;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, dispatcher, max_frame_bytes).await {
                    tracing::debug!(%peer, error = %e, "rpc connection ended with error");
                }
            });
        }

        tracing::info!("rpc listener stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    max_frame_bytes: usize,
) -> Result<(), FrameError> {
    let mut framed = Framed::new(stream, frame_codec(max_frame_bytes));
    tracing::debug!(%peer, "rpc connection opened");

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let response = match RpcRequest::decode(&frame[..]) {
            Ok(request) => {
                let span = tracing::debug_span!("rpc", %peer, id = request.id, method = %request.method);
                dispatcher.dispatch(request).instrument(span).await
            }
            Err(e) => {
                // Without an envelope there is no id to answer; reply once and hang up.
                tracing::warn!(%peer, error = %e, "undecodable rpc envelope");
                let status = Status::invalid_argument("malformed request envelope");
                let reply = RpcResponse {
                    id: 0,
                    code: status.code().as_i32(),
                    message: status.message().to_string(),
                    body: Vec::new(),
                };
                framed.send(Bytes::from(reply.encode_to_vec())).await?;
                return Err(FrameError::Decode(e));
            }
        };
        framed.send(Bytes::from(response.encode_to_vec())).await?;
    }

    tracing::debug!(%peer, "rpc connection closed");
    Ok(())
}
