//! Client event loop
//!
//! [`SignalingClient`] owns the message channel and one role flow and runs
//! everything on a single task: socket events, engine events, user intents,
//! and timers are multiplexed with `tokio::select!` and handled one at a
//! time, so flows never see concurrent callbacks.

use crate::config::ClientConfig;
use crate::peer::EngineEvent;
use crate::role::{ConnectionState, FlowContext, RoleFlow};
use crate::signaling::websocket::{self, SocketEvent};
use crate::signaling::{ChannelMessage, MessageChannel, SignalingSink};
use crate::ui::{Intent, UiBridge, UiEvent};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Why [`SignalingClient::run`] returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientExit {
    /// The signaling connection closed
    ChannelClosed(Option<String>),
    /// The user asked for a reload
    Reload,
    /// The intent source went away
    IntentsClosed,
}

/// Single-task driver for one publish or subscribe attempt
pub struct SignalingClient {
    channel: MessageChannel,
    flow: Box<dyn RoleFlow>,
    ui: Arc<dyn UiBridge>,
    inbound: mpsc::UnboundedReceiver<ChannelMessage>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    engine_events_open: bool,
}

impl SignalingClient {
    /// Create a client over an already-connecting signaling sink
    ///
    /// # Arguments
    ///
    /// * `config` - Client configuration
    /// * `sink` - Writer for the signaling socket
    /// * `flow` - Role flow to drive
    /// * `engine_events` - Events from the flow's transport engine
    /// * `ui` - Presentation bridge
    pub fn new(
        config: &ClientConfig,
        sink: Box<dyn SignalingSink>,
        flow: Box<dyn RoleFlow>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        ui: Arc<dyn UiBridge>,
    ) -> Self {
        let mut channel = MessageChannel::new(sink, config.send_retry_delay());
        let inbound = channel.subscribe(flow.subscriptions());

        let role = flow.role();
        channel.on_ready(move |_| info!("Signaling open for {}", role));
        channel.on_close(move |reason| {
            info!(
                "Signaling closed for {}{}",
                role,
                reason.map(|r| format!(": {}", r)).unwrap_or_default()
            );
        });

        Self {
            channel,
            flow,
            ui,
            inbound,
            engine_events,
            engine_events_open: true,
        }
    }

    /// Open a WebSocket to the configured server and create a client over it
    ///
    /// Returns the client and the socket event stream to pass to
    /// [`SignalingClient::run`].
    pub fn connect(
        config: &ClientConfig,
        flow: Box<dyn RoleFlow>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        ui: Arc<dyn UiBridge>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SocketEvent>)> {
        config.validate()?;
        let (sink, events) = websocket::connect(&config.signaling_url);
        Ok((Self::new(config, Box::new(sink), flow, engine_events, ui), events))
    }

    /// Current role state
    pub fn state(&self) -> ConnectionState {
        self.flow.state()
    }

    /// The signaling channel
    pub fn channel(&self) -> &MessageChannel {
        &self.channel
    }

    /// Run until the channel closes, the user reloads, or intents stop
    ///
    /// The flow starts on the first [`Intent::Connect`].
    pub async fn run(
        mut self,
        mut socket: mpsc::UnboundedReceiver<SocketEvent>,
        mut intents: mpsc::UnboundedReceiver<Intent>,
    ) -> Result<ClientExit> {
        info!("Starting {} client", self.flow.role());

        loop {
            let deadline = self.next_deadline();
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                event = socket.recv() => match event {
                    Some(SocketEvent::Opened) => self.channel.mark_ready(),
                    Some(SocketEvent::Frame(frame)) => self.on_frame(&frame).await,
                    Some(SocketEvent::Closed(reason)) => {
                        self.shutdown(reason.as_deref()).await;
                        return Ok(ClientExit::ChannelClosed(reason));
                    }
                    None => {
                        self.shutdown(None).await;
                        return Ok(ClientExit::ChannelClosed(None));
                    }
                },
                event = self.engine_events.recv(), if self.engine_events_open => match event {
                    Some(event) => self.on_engine_event(event).await,
                    None => {
                        debug!("Engine event stream ended");
                        self.engine_events_open = false;
                    }
                },
                intent = intents.recv() => match intent {
                    Some(Intent::Reload) => {
                        info!("Reload requested");
                        self.shutdown(Some("reload")).await;
                        return Ok(ClientExit::Reload);
                    }
                    Some(intent) => self.on_intent(intent).await,
                    None => {
                        self.shutdown(None).await;
                        return Ok(ClientExit::IntentsClosed);
                    }
                },
                _ = sleep_until(wake_at), if deadline.is_some() => self.on_timer().await,
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.channel.next_retry_deadline(), self.flow.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn report(&self, result: Result<()>) {
        if let Err(e) = result {
            if e.is_user_facing() {
                warn!("{}", e);
            } else {
                error!("{}", e);
            }
            self.ui.emit(UiEvent::Error(e.to_string()));
        }
    }

    async fn on_frame(&mut self, frame: &str) {
        if let Err(e) = self.channel.receive(frame) {
            warn!("Dropping malformed signaling frame: {}", e);
            return;
        }

        while let Ok(message) = self.inbound.try_recv() {
            let mut cx = FlowContext {
                channel: &mut self.channel,
                ui: self.ui.as_ref(),
                now: Instant::now(),
            };
            let result = self.flow.handle_message(message, &mut cx).await;
            self.report(result);
        }
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        let mut cx = FlowContext {
            channel: &mut self.channel,
            ui: self.ui.as_ref(),
            now: Instant::now(),
        };
        let result = self.flow.handle_engine_event(event, &mut cx).await;
        self.report(result);
    }

    async fn on_intent(&mut self, intent: Intent) {
        let mut cx = FlowContext {
            channel: &mut self.channel,
            ui: self.ui.as_ref(),
            now: Instant::now(),
        };
        let result = match intent {
            Intent::Connect => self.flow.start(&mut cx).await,
            other => self.flow.handle_intent(other, &mut cx).await,
        };
        self.report(result);
    }

    async fn on_timer(&mut self) {
        let now = Instant::now();
        self.channel.expire_retries(now);

        let mut cx = FlowContext {
            channel: &mut self.channel,
            ui: self.ui.as_ref(),
            now,
        };
        let result = self.flow.on_tick(&mut cx).await;
        self.report(result);
    }

    async fn shutdown(&mut self, reason: Option<&str>) {
        let mut cx = FlowContext {
            channel: &mut self.channel,
            ui: self.ui.as_ref(),
            now: Instant::now(),
        };
        self.flow.teardown(&mut cx).await;
        self.channel.close(reason);
        self.ui.emit(UiEvent::SpinnerVisible(false));
    }
}
