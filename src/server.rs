//! Process wiring: one store, one gate, one service, two transports.

use crate::auth::{AuthGate, TokenCodec};
use crate::config::Config;
use crate::gateway::{self, AppState};
use crate::inventory::InventoryService;
use crate::rpc::{Dispatcher, RpcServer};
use crate::store::{RecordStore, SqliteStore};
use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Shared handles built once from a validated [`Config`].
#[derive(Clone)]
pub struct Services {
    pub gate: Arc<AuthGate>,
    pub service: Arc<InventoryService>,
}

impl Services {
    pub fn new(config: &Config, store: Arc<dyn RecordStore>) -> Self {
        let codec = TokenCodec::from_config(&config.auth);
        Self {
            gate: Arc::new(AuthGate::from_config(&config.auth)),
            service: Arc::new(InventoryService::new(
                store,
                codec,
                config.auth.password_iterations,
            )),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.gate.clone(), self.service.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            gate: self.gate.clone(),
            service: self.service.clone(),
        }
    }
}

/// Both listeners, bound but not yet serving.
pub struct Server {
    services: Services,
    config: Config,
    http: TcpListener,
    rpc: RpcServer,
}

impl Server {
    pub async fn bind(config: Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        let services = Services::new(&config, store);

        let http = TcpListener::bind(config.http_addr()?)
            .await
            .with_context(|| format!("failed to bind http listener on {}", config.http.port))?;
        let rpc = RpcServer::bind(config.rpc_addr()?, services.dispatcher(), config.rpc.max_frame_bytes)
            .await
            .with_context(|| format!("failed to bind rpc listener on {}", config.rpc.port))?;

        Ok(Self {
            services,
            config,
            http,
            rpc,
        })
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    pub fn rpc_addr(&self) -> std::io::Result<SocketAddr> {
        self.rpc.local_addr()
    }

    /// Serve both transports until `shutdown` resolves or one of them fails.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let app = gateway::router(self.services.app_state(), &self.config.http);

        let http = gateway::run_gateway(self.http, app, wait_for(stop_rx.clone()));
        let rpc = self.rpc.serve(wait_for(stop_rx));

        let stopper = async move {
            shutdown.await;
            tracing::info!("shutdown requested");
            let _ = stop_tx.send(true);
        };
        tokio::spawn(stopper);

        tokio::try_join!(
            async { http.await.context("http gateway failed") },
            async { rpc.await.context("rpc server failed") },
        )?;
        Ok(())
    }
}

async fn wait_for(mut stop: watch::Receiver<bool>) {
    // a closed channel also means stop
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// Open the store from config and serve until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let store = SqliteStore::open(&config.database.path).with_context(|| {
        format!("failed to open database {}", config.database.path.display())
    })?;
    tracing::info!(path = %config.database.path.display(), "record store opened");

    let server = Server::bind(config, Arc::new(store)).await?;
    tracing::info!(
        http = %server.http_addr()?,
        rpc = %server.rpc_addr()?,
        "cardsorter listening"
    );

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await
}
