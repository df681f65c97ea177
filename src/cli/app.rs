//! The bargain application: engine, timers, and dispatch stream wired into
//! one serialized event loop
//!
//! All engine mutations happen on this loop, so protocol events and timer
//! fires are processed strictly in arrival order.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};

use crate::config::BargainConfig;
use crate::dispatch::{Inbound, SysmsgTable};
use crate::error::{BargainError, Result};
use crate::negotiation::{Effect, NegotiationEngine};
use crate::notify::{LogSink, NotificationSink};
use crate::timer::TimerManager;

/// Main bargain application
pub struct BargainApp {
    engine: NegotiationEngine,
    sink: Box<dyn NotificationSink + Send>,
}

impl BargainApp {
    /// Create an application with the default log-backed notification sink.
    pub fn new(config: BargainConfig) -> Self {
        Self::with_sink(config, Box::new(LogSink))
    }

    pub fn with_sink(config: BargainConfig, sink: Box<dyn NotificationSink + Send>) -> Self {
        let engine = NegotiationEngine::new(config, SysmsgTable::builtin());
        Self { engine, sink }
    }

    /// Accept one dispatch connection on `port` and run until it closes.
    pub async fn listen(self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| BargainError::DispatchConnection(e.to_string()))?;
        tracing::info!("Waiting for dispatch connection on port {port}");

        let (stream, addr) = listener
            .accept()
            .await
            .map_err(|e| BargainError::DispatchConnection(e.to_string()))?;
        tracing::info!("Dispatch connected from {addr}");
        self.run(stream).await
    }

    /// Connect to a dispatch endpoint and run until the stream closes.
    pub async fn connect(self, addr: &str) -> Result<()> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| BargainError::DispatchConnection(e.to_string()))?;
        tracing::info!("Connected to dispatch at {addr}");
        self.run(stream).await
    }

    /// Run the event loop over any line-framed dispatch stream.
    pub async fn run<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, LinesCodec::new());
        let (mut timers, mut timer_rx) = TimerManager::new();

        loop {
            tokio::select! {
                line = framed.next() => {
                    let Some(line) = line else {
                        tracing::info!("Dispatch stream closed");
                        return Ok(());
                    };
                    let line = line
                        .map_err(|e| BargainError::DispatchConnection(e.to_string()))?;
                    match serde_json::from_str::<Inbound>(&line) {
                        Ok(event) => {
                            let fx = self.engine.handle_inbound(event);
                            self.apply(fx, &mut timers, &mut framed).await?;
                        }
                        Err(e) => {
                            tracing::warn!("Ignoring malformed inbound message: {e}");
                        }
                    }
                }
                Some(fired) = timer_rx.recv() => {
                    if timers.acknowledge(&fired) {
                        let fx = self.engine.handle_timer(fired.kind);
                        self.apply(fx, &mut timers, &mut framed).await?;
                    }
                }
            }
        }
    }

    async fn apply<S>(
        &mut self,
        effects: Vec<Effect>,
        timers: &mut TimerManager,
        framed: &mut Framed<S, LinesCodec>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        for effect in effects {
            match effect {
                Effect::Send(outbound) => {
                    let line = serde_json::to_string(&outbound)?;
                    tracing::debug!("sending {line}");
                    framed
                        .send(line)
                        .await
                        .map_err(|e| BargainError::DispatchConnection(e.to_string()))?;
                }
                Effect::Notify(message) => self.sink.notify(&message),
                Effect::ArmTimer(kind, delay) => timers.arm(kind, delay),
                Effect::CancelTimer(kind) => timers.cancel(kind),
            }
        }
        Ok(())
    }
}
