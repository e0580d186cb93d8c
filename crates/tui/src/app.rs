//! Application state and the main event loop.
//!
//! All chat state mutation happens on this loop: terminal input, transport
//! events, and dial outcomes are multiplexed with `tokio::select!` and fed
//! into the router one at a time.

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use parley_core::transport::{spawn_connection, ChatEndpoint, Direction, TransportEvent};
use parley_core::{ChatEvent, Config, Error, MessageRouter};
use ratatui::prelude::*;
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ui;

/// How long a transient notice stays on screen.
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Which view has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Connect form: typing edits the target peer id.
    Connect,
    /// Conversation view: typing edits the composition buffer.
    Chat,
    /// Inline rename of the active conversation's title.
    Rename,
}

/// Outcome channel payload for failed dial attempts. Successful dials
/// arrive as `TransportEvent::Connected` instead.
struct DialFailure {
    target: String,
    error: String,
}

/// Terminal application state.
pub struct App {
    endpoint: ChatEndpoint,
    config: Config,
    pub(crate) router: MessageRouter,
    pub(crate) mode: Mode,
    running: bool,

    pub(crate) connect_input: String,
    pub(crate) compose_input: String,
    pub(crate) rename_input: String,

    /// Transient status notice and when it was set.
    pub(crate) notice: Option<(String, Instant)>,
    /// Target currently being dialed, if any.
    pub(crate) dialing: Option<String>,

    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    dial_tx: mpsc::UnboundedSender<DialFailure>,
    dial_rx: mpsc::UnboundedReceiver<DialFailure>,

    initial_target: Option<String>,
}

impl App {
    /// Create the application around a bound endpoint.
    pub fn new(endpoint: ChatEndpoint, config: Config, connect: Option<String>) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (dial_tx, dial_rx) = mpsc::unbounded_channel();
        let router = MessageRouter::new(endpoint.local_id(), config.max_message_bytes);

        Self {
            endpoint,
            config,
            router,
            mode: Mode::Connect,
            running: true,
            connect_input: String::new(),
            compose_input: String::new(),
            rename_input: String::new(),
            notice: None,
            dialing: None,
            transport_tx,
            transport_rx,
            dial_tx,
            dial_rx,
            initial_target: connect,
        }
    }

    /// Run the terminal UI until the user quits.
    pub async fn run(mut self) -> Result<()> {
        let _accept_loop = self
            .endpoint
            .spawn_accept_loop(self.transport_tx.clone(), self.config.max_message_bytes);

        if let Some(target) = self.initial_target.take() {
            self.connect_input = target;
            self.submit_connect();
        }

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let mut input = EventStream::new();
        let mut tick = tokio::time::interval(Duration::from_millis(250));

        while self.running {
            terminal.draw(|f| ui::draw(f, self))?;

            tokio::select! {
                maybe_event = input.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("input stream error: {}", e);
                        self.running = false;
                    }
                    None => self.running = false,
                },
                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport(event);
                }
                Some(failure) = self.dial_rx.recv() => {
                    self.dialing = None;
                    self.set_notice(format!(
                        "connection to {} failed: {}",
                        short_id(&failure.target),
                        failure.error
                    ));
                }
                _ = tick.tick() => {
                    self.expire_notice();
                }
            }
        }

        Ok(())
    }

    // ==================== Transport events ====================

    fn handle_transport(&mut self, event: TransportEvent) {
        // Loop-level bookkeeping before the router consumes the event.
        if let TransportEvent::Connected { peer_id, .. } = &event {
            info!(peer = %peer_id, "session ready");
            self.dialing = None;
            self.mode = Mode::Chat;
            self.compose_input.clear();
        }

        // The notice is keyed off the router's verdict, not the raw close:
        // a superseded connection's close must not claim "disconnected"
        // while the redialed connection is live.
        match self.router.handle_transport_event(event) {
            Ok(events) => {
                for event in &events {
                    if let ChatEvent::PeerDisconnected { peer_id, .. } = event {
                        self.set_notice(format!("disconnected from {}", short_id(peer_id)));
                    }
                }
            }
            Err(e) => self.report(e),
        }
    }

    // ==================== Key handling ====================

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.running = false;
            return;
        }

        match self.mode {
            Mode::Connect => self.handle_connect_key(key),
            Mode::Chat => self.handle_chat_key(key),
            Mode::Rename => self.handle_rename_key(key),
        }
    }

    fn handle_connect_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_connect(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.connect_input.push(c);
            }
            KeyCode::Backspace => {
                self.connect_input.pop();
            }
            KeyCode::Esc | KeyCode::Tab => {
                // Back to the conversation view when there is one to show.
                if !self.router.store().is_empty() {
                    if self.router.store().active_id().is_none() {
                        let first = self.router.store().conversations()[0].id.clone();
                        let _ = self.router.activate(&first);
                    }
                    self.mode = Mode::Chat;
                }
            }
            _ => {}
        }
    }

    fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.compose_input.push('\n');
            }
            KeyCode::Enter => self.submit_message(),
            KeyCode::Tab => self.cycle_conversation(),
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.new_conversation();
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(conversation) = self.router.active_conversation() {
                    self.rename_input = conversation.title.clone();
                    self.mode = Mode::Rename;
                }
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.delete_active();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.compose_input.push(c);
            }
            KeyCode::Backspace => {
                self.compose_input.pop();
            }
            _ => {}
        }
    }

    fn handle_rename_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                if let Some(id) = self.router.store().active_id().cloned() {
                    let title = std::mem::take(&mut self.rename_input);
                    if let Err(e) = self.router.rename_conversation(&id, title) {
                        self.report(e);
                    }
                }
                self.mode = Mode::Chat;
            }
            KeyCode::Esc => {
                self.rename_input.clear();
                self.mode = Mode::Chat;
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.rename_input.push(c);
            }
            KeyCode::Backspace => {
                self.rename_input.pop();
            }
            _ => {}
        }
    }

    // ==================== User intents ====================

    /// Validate the connect target and dial it in the background.
    fn submit_connect(&mut self) {
        let target = self.connect_input.trim().to_string();

        if let Err(e) = self.router.validate_connect_target(&target) {
            self.report(e);
            return;
        }

        // Reconnect to a known peer just reactivates its thread.
        if self.router.is_connected(&target) {
            if let Some(id) = self.router.store().find_by_peer(&target).map(|c| c.id.clone()) {
                let _ = self.router.activate(&id);
                self.mode = Mode::Chat;
            }
            return;
        }

        info!(target = %target, "dialing");
        self.dialing = Some(target.clone());

        let endpoint = self.endpoint.clone();
        let transport_tx = self.transport_tx.clone();
        let dial_tx = self.dial_tx.clone();
        let timeout = self.config.connect_timeout();
        let max_frame = self.config.max_message_bytes;

        tokio::spawn(async move {
            match endpoint.connect(&target, timeout).await {
                Ok(conn) => {
                    let peer_id = conn.peer_id().to_string();
                    let handle = spawn_connection(conn, transport_tx.clone(), max_frame);
                    let _ = transport_tx.send(TransportEvent::Connected {
                        peer_id,
                        handle,
                        direction: Direction::Outbound,
                    });
                }
                Err(e) => {
                    let _ = dial_tx.send(DialFailure {
                        target,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    /// Send the composition buffer to the active conversation.
    fn submit_message(&mut self) {
        match self.router.send_message(&self.compose_input) {
            Ok(_) => self.compose_input.clear(),
            Err(Error::EmptyMessage) => {} // ignore bare Enter
            Err(e) => self.report(e),
        }
    }

    /// "New conversation": clear the connect target and deactivate. A UI
    /// mode toggle, not a store operation.
    fn new_conversation(&mut self) {
        self.connect_input.clear();
        self.router.deactivate();
        self.mode = Mode::Connect;
    }

    fn delete_active(&mut self) {
        if let Some(id) = self.router.store().active_id().cloned() {
            if let Err(e) = self.router.delete_conversation(&id) {
                self.report(e);
            }
        }
        if self.router.store().is_empty() {
            self.mode = Mode::Connect;
        }
    }

    fn cycle_conversation(&mut self) {
        let conversations = self.router.store().conversations();
        if conversations.is_empty() {
            return;
        }
        let next = match self.router.store().active_id() {
            Some(active) => {
                let index = conversations
                    .iter()
                    .position(|c| &c.id == active)
                    .unwrap_or(0);
                conversations[(index + 1) % conversations.len()].id.clone()
            }
            None => conversations[0].id.clone(),
        };
        let _ = self.router.activate(&next);
    }

    // ==================== Notices ====================

    fn report(&mut self, error: Error) {
        warn!("{}", error);
        self.set_notice(error.to_string());
    }

    fn set_notice(&mut self, text: String) {
        self.notice = Some((text, Instant::now()));
    }

    fn expire_notice(&mut self) {
        if let Some((_, since)) = &self.notice {
            if since.elapsed() >= NOTICE_TTL {
                self.notice = None;
            }
        }
    }
}

/// First few characters of a peer id, for display.
pub(crate) fn short_id(peer_id: &str) -> String {
    peer_id.chars().take(10).collect()
}
