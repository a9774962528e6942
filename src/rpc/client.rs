//! Minimal RPC client: one connection, one request in flight.

use super::messages::{RpcRequest, RpcResponse};
use super::{frame_codec, FrameError, DEFAULT_MAX_FRAME_BYTES};
use crate::auth::{AUTHORIZATION_KEY, DEVICE_SECRET_KEY};
use crate::error::{Code, Status};
use futures_util::{SinkExt, StreamExt};
use prost::bytes::Bytes;
use prost::Message;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] FrameError),
    /// The server answered with a non-OK code.
    #[error(transparent)]
    Status(Status),
    #[error("response id {got} does not match request id {expected}")]
    IdMismatch { expected: u64, got: u64 },
}

pub struct RpcClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    next_id: u64,
    metadata: HashMap<String, String>,
    deadline: Option<Duration>,
}

impl RpcClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, FrameError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, frame_codec(DEFAULT_MAX_FRAME_BYTES)),
            next_id: 1,
            metadata: HashMap::new(),
            deadline: None,
        })
    }

    /// Send `authorization: Bearer <token>` on every following call.
    pub fn set_token(&mut self, token: &str) {
        self.metadata
            .insert(AUTHORIZATION_KEY.to_string(), format!("Bearer {token}"));
    }

    pub fn set_device_secret(&mut self, secret: &str) {
        self.metadata
            .insert(DEVICE_SECRET_KEY.to_string(), secret.to_string());
    }

    pub fn clear_metadata(&mut self) {
        self.metadata.clear();
    }

    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }

    /// Send one envelope and wait for the reply.
    pub async fn send(&mut self, request: RpcRequest) -> Result<RpcResponse, FrameError> {
        self.framed
            .send(Bytes::from(request.encode_to_vec()))
            .await?;
        let frame = self.framed.next().await.ok_or(FrameError::Closed)??;
        Ok(RpcResponse::decode(&frame[..])?)
    }

    pub async fn call<Req, Resp>(&mut self, method: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let id = self.next_id;
        self.next_id += 1;
        let deadline_ms = self
            .deadline
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);

        let response = self
            .send(RpcRequest {
                id,
                method: method.to_string(),
                metadata: self.metadata.clone(),
                body: body.encode_to_vec(),
                deadline_ms,
            })
            .await?;

        if response.id != id {
            return Err(ClientError::IdMismatch {
                expected: id,
                got: response.id,
            });
        }
        match Code::from_i32(response.code) {
            Code::Ok => Ok(Resp::decode(response.body.as_slice()).map_err(FrameError::from)?),
            code => Err(ClientError::Status(Status::new(code, response.message))),
        }
    }
}
