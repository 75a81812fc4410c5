//! # Embedded Server Lifecycle
//!
//! Programmatic start/stop around the actix `HttpServer`, so the binary and
//! integration tests share one code path. Binding with port 0 asks the OS
//! for a free port; the actually-bound address is returned from `start`.
//!
//! `start` is idempotent — a second call while running returns the existing
//! address instead of binding twice. `stop` drains connections gracefully
//! within a bounded grace period and reports a failure to stop as its own
//! error rather than hanging.

use crate::error::AppError;
use crate::health;
use crate::middleware::RequestLogging;
use crate::state::AppState;
use crate::websocket;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct Running {
    handle: actix_web::dev::ServerHandle,
    task: JoinHandle<std::io::Result<()>>,
    addr: SocketAddr,
}

pub struct InterviewServer {
    state: AppState,
    inner: Option<Running>,
}

impl InterviewServer {
    pub fn new(state: AppState) -> Self {
        Self { state, inner: None }
    }

    /// Bind and start serving. `port: None` binds an OS-assigned free port.
    /// Returns the bound address; calling again while running returns the
    /// same address.
    pub async fn start(&mut self, host: &str, port: Option<u16>) -> Result<SocketAddr, AppError> {
        if let Some(running) = &self.inner {
            return Ok(running.addr);
        }

        let bind_addr = format!("{}:{}", host, port.unwrap_or(0));
        let state = self.state.clone();

        let server = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(cors)
                .wrap(RequestLogging)
                .route("/ws", web::get().to(websocket::ws_route))
                .route("/health", web::get().to(health::health_check))
        })
        .bind(&bind_addr)
        .map_err(|err| AppError::Bind {
            addr: bind_addr.clone(),
            source: err.to_string(),
        })?;

        let addr = server.addrs().first().copied().ok_or_else(|| AppError::Bind {
            addr: bind_addr,
            source: "no bound address reported".to_string(),
        })?;

        let server = server.run();
        let handle = server.handle();
        let task = tokio::spawn(server);

        info!(addr = %addr, "Interview server listening");
        self.inner = Some(Running { handle, task, addr });
        Ok(addr)
    }

    /// Address the server is currently bound to, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.as_ref().map(|r| r.addr)
    }

    /// Gracefully stop, waiting at most `grace` for in-flight work to
    /// drain. Stopping a server that is not running is a no-op.
    pub async fn stop(&mut self, grace: Duration) -> Result<(), AppError> {
        let Some(running) = self.inner.take() else {
            return Ok(());
        };

        info!(addr = %running.addr, "Stopping interview server");
        match tokio::time::timeout(grace, running.handle.stop(true)).await {
            Ok(()) => {
                if let Err(err) = running.task.await {
                    warn!(error = %err, "Server task ended abnormally");
                }
                Ok(())
            }
            Err(_) => {
                // Graceful drain overran; force the listener down.
                running.handle.stop(false).await;
                running.task.abort();
                Err(AppError::ShutdownTimeout)
            }
        }
    }
}
