use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use backstop_core::{Admission, Clock, MonotonicClock, SlidingWindowLimiter};
use backstop_net::{Header, Limits, ParseStatus, RequestParser, encode_response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::error::GateError;

pub const DEFAULT_GREETING: &str = "Hello from backstop!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Serve,
    Throttle { retry_after_ms: u64 },
}

impl GateDecision {
    /// Whole seconds for the `Retry-After` header, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            GateDecision::Serve => 0,
            GateDecision::Throttle { retry_after_ms } => retry_after_ms.div_ceil(1000),
        }
    }
}

impl From<Admission> for GateDecision {
    fn from(admission: Admission) -> Self {
        match admission {
            Admission::Admitted => GateDecision::Serve,
            Admission::Rejected { retry_after_ms } => GateDecision::Throttle { retry_after_ms },
        }
    }
}

/// HTTP front door that answers every request with a greeting, subject to a
/// per-address sliding-window limit.
pub struct Gate {
    state: Arc<GateState>,
}

struct GateState {
    config: GateConfig,
    limiter: Mutex<SlidingWindowLimiter>,
    clock: Arc<dyn Clock>,
}

impl Gate {
    pub fn new(config: GateConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = Mutex::new(SlidingWindowLimiter::from_config(&config.limiter));
        Self {
            state: Arc::new(GateState {
                config,
                limiter,
                clock,
            }),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.state.config
    }

    /// Admission decision for `key` at the gate clock's current time.
    pub async fn classify(&self, key: &str) -> GateDecision {
        self.state.classify(key).await
    }

    pub fn respond(&self, decision: GateDecision) -> Vec<u8> {
        self.state.respond(decision)
    }

    pub async fn tracked_keys(&self) -> usize {
        self.state.limiter.lock().await.tracked_keys()
    }

    /// Binds the listen address and serves until [`RunningGate::stop`].
    pub async fn start(self) -> Result<RunningGate, GateError> {
        let config = &self.state.config;
        if config.sweep_interval_ms == Some(0) {
            return Err(GateError::Config(
                "sweep_interval_ms must be positive".to_string(),
            ));
        }

        let listener = TcpListener::bind((config.listen.host.as_str(), config.listen.port))
            .await
            .map_err(|err| {
                GateError::Runtime(format!(
                    "failed to bind {}:{}: {err}",
                    config.listen.host, config.listen.port
                ))
            })?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "gate listening");

        let shutdown = CancellationToken::new();
        if let Some(period) = config.sweep_interval_ms {
            let state = Arc::clone(&self.state);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                sweep_loop(state, Duration::from_millis(period), shutdown).await;
            });
        }

        let state = Arc::clone(&self.state);
        let token = shutdown.clone();
        let task = tokio::spawn(async move {
            accept_loop(state, listener, token).await;
        });

        Ok(RunningGate {
            gate: self,
            local_addr,
            shutdown,
            task,
        })
    }
}

/// A started gate. Stopping consumes the handle, so a gate runs at most once.
pub struct RunningGate {
    gate: Gate,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for RunningGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningGate")
            .field("local_addr", &self.local_addr)
            .field("stopped", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl RunningGate {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub async fn stop(self) -> Result<(), GateError> {
        self.shutdown.cancel();
        self.task
            .await
            .map_err(|err| GateError::Runtime(err.to_string()))?;
        tracing::info!(local_addr = %self.local_addr, "gate stopped");
        Ok(())
    }
}

impl GateState {
    async fn classify(&self, key: &str) -> GateDecision {
        // read the clock under the lock so each key sees non-decreasing timestamps
        let mut limiter = self.limiter.lock().await;
        let admission = limiter.admit_now(key, &self.clock);
        GateDecision::from(admission)
    }

    fn respond(&self, decision: GateDecision) -> Vec<u8> {
        match decision {
            GateDecision::Serve => encode_response(
                200,
                &[
                    Header::new("Content-Type", "text/plain; charset=utf-8"),
                    Header::new("Connection", "close"),
                ],
                self.config.greeting.as_bytes(),
            ),
            GateDecision::Throttle { .. } => encode_response(
                429,
                &[
                    Header::new("Retry-After", decision.retry_after_secs().to_string()),
                    Header::new("Connection", "close"),
                ],
                b"",
            ),
        }
    }

    fn limits(&self) -> Limits {
        Limits {
            max_header_bytes: self.config.max_request_bytes,
            max_body_bytes: self.config.max_request_bytes,
        }
    }
}

async fn accept_loop(state: Arc<GateState>, listener: TcpListener, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(state, stream, peer).await {
                            tracing::warn!(%peer, error = %err, "connection failed");
                        }
                    });
                }
                Err(err) => tracing::warn!(error = %err, "accept failed"),
            },
        }
    }
}

async fn sweep_loop(state: Arc<GateState>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let mut limiter = state.limiter.lock().await;
                let now = state.clock.now_ms();
                let purged = limiter.purge_idle(now);
                if purged > 0 {
                    tracing::debug!(purged, remaining = limiter.tracked_keys(), "purged idle keys");
                }
            }
        }
    }
}

async fn handle_connection(
    state: Arc<GateState>,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), GateError> {
    let mut parser = RequestParser::with_limits(state.limits());
    let mut temp = vec![0u8; 8192];

    let response = loop {
        let n = stream.read(&mut temp).await?;
        if n == 0 {
            return Ok(());
        }
        match parser.push(&temp[..n]) {
            ParseStatus::NeedMore => continue,
            ParseStatus::Error { error } => {
                tracing::debug!(%peer, %error, "rejecting malformed request");
                break encode_response(400, &[Header::new("Connection", "close")], b"");
            }
            ParseStatus::Complete { message } => {
                let key = peer.ip().to_string();
                let decision = state.classify(&key).await;
                tracing::debug!(
                    request_id = %Uuid::new_v4(),
                    %key,
                    method = %message.line.method,
                    target = %message.line.target,
                    ?decision,
                    "classified request"
                );
                break state.respond(decision);
            }
        }
    };

    stream.write_all(&response).await?;
    stream.shutdown().await?;
    Ok(())
}
