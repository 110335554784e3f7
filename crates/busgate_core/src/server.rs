use std::{convert::Infallible, future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use busgate_config::BusgateConfig;
use hyper::{Request, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpListener,
    sync::Semaphore,
};
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::dispatch::Dispatcher;
use crate::responses::HttpResponse;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    cfg: Arc<BusgateConfig>,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(cfg: Arc<BusgateConfig>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { cfg, dispatcher }
    }

    /// Binds the configured address and serves until Ctrl+C.
    #[instrument(skip(self), fields(
        listen = %self.cfg.server().listen(),
        max_connections = self.cfg.global().max_connections(),
    ))]
    pub async fn run(self) -> anyhow::Result<()> {
        let listen = self.cfg.server().listen().to_string();
        info!(target: "busgate::server", listen = %listen, "Starting busgate");

        let listener = match TcpListener::bind(&listen).await {
            Ok(l) => {
                info!(target: "busgate::server", listen = %listen, "Bind() successful");
                l
            }
            Err(e) => {
                error!(
                    target: "busgate::server",
                    listen = %listen,
                    error = ?e,
                    "Failed to bind listener"
                );
                return Err(e).with_context(|| format!("failed to bind {listen}"));
            }
        };

        info!(
            target: "busgate::server",
            "Waiting for incoming connections (Ctrl+C to stop)..."
        );

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(target: "busgate::server", error = ?e, "Failed to listen for Ctrl+C");
            }
        })
        .await
    }

    /// Accept loop. Returns once `shutdown` resolves; open connections finish
    /// on their own tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = Arc::new(listener);
        self.serve_with(
            move || {
                let listener = listener.clone();
                async move { listener.accept().await }
            },
            shutdown,
        )
        .await
    }

    async fn serve_with<A, Fut, S, F>(self, mut accept: A, shutdown: F) -> anyhow::Result<()>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = io::Result<(S, SocketAddr)>>,
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        // Global limit for concurrent connections across the process
        let max_conns = self.cfg.global().max_connections() as usize;
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(
            target: "busgate::server",
            max_conns,
            "Global connection semaphore initialized"
        );

        tokio::pin!(shutdown);

        loop {
            // A free slot comes first, so a full server leaves new clients in
            // the listen backlog. Owned so the permit can move into the task.
            let permit = tokio::select! {
                _ = &mut shutdown => {
                    shutting_down();
                    return Ok(());
                }
                permit = semaphore.clone().acquire_owned() => {
                    permit.context("connection semaphore closed")?
                }
            };

            let (stream, addr) = tokio::select! {
                _ = &mut shutdown => {
                    shutting_down();
                    return Ok(());
                }
                accepted = accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        // EMFILE, ECONNABORTED and friends clear up on their own.
                        error!(
                            target: "busgate::server",
                            error = ?e,
                            backoff_ms = ACCEPT_BACKOFF.as_millis() as u64,
                            "Failed to accept connection; retrying"
                        );
                        drop(permit);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            debug!(
                target: "busgate::server",
                client_addr = %addr,
                available = semaphore.available_permits(),
                "New connection accepted"
            );

            let dispatcher = self.dispatcher.clone();
            let span = tracing::info_span!("connection", client_addr = %addr);

            tokio::spawn(
                async move {
                    if let Err(e) = serve_connection(stream, addr, dispatcher).await {
                        warn!(target: "busgate::server", error = ?e, "Connection closed with error");
                    }
                    drop(permit);
                }
                .instrument(span),
            );
        }
    }
}

fn shutting_down() {
    warn!(target: "busgate::server", "Shutdown requested; no longer accepting connections");
}

async fn serve_connection<S>(
    stream: S,
    client_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let dispatcher = dispatcher.clone();
        async move { Ok::<HttpResponse, Infallible>(dispatcher.handle(req.method(), req.uri()).await) }
    });

    http1::Builder::new()
        .keep_alive(true)
        .serve_connection(io, service)
        .await
        .with_context(|| format!("HTTP/1 connection error from {client_addr}"))?;

    Ok(())
}
