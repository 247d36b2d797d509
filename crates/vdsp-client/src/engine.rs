//! Single cooperative event loop driving MUP1/CoAP exchanges over a
//! transport (§5).
//!
//! This is the driver half of the Sans-IO split: [`vdsp_core`] contributes
//! the pure [`Connection`]/[`Correlator`] state machines, [`vdsp_proto`]
//! contributes the wire codecs, and this module owns the transport, the
//! single [`Mup1Parser`] instance and the clock, executing the actions those
//! state machines return. There are no background tasks and no locks: one
//! `Engine` value drives one device, one exchange at a time, matching the
//! single-owner model of §5.

use std::ops::Add;
use std::time::Duration;

use bytes::Bytes;
use vdsp_core::{
    CoreError,
    connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState},
    correlator::{Correlator, CorrelatorAction},
    env::Environment,
    transport::Transport,
};
use vdsp_proto::{
    coap::{Message, MessageType, option_number},
    mup1::{self, FrameType, Mup1Frame, Mup1Parser},
};

use crate::{config::Config, error::FacadeError};

/// Drives MUP1 framing, the connection handshake and CoAP request/response
/// exchanges for one device (§5).
pub struct Engine<T, E>
where
    T: Transport,
    E: Environment,
{
    transport: T,
    env: E,
    config: Config,
    connection: Connection<E::Instant>,
    correlator: Correlator<E::Instant, ()>,
    parser: Mup1Parser,
    read_buf: Box<[u8; 4096]>,
}

impl<T, E> Engine<T, E>
where
    T: Transport,
    E: Environment,
    E::Instant: Add<Duration, Output = E::Instant>,
{
    /// Builds an engine over `transport`, initially `Disconnected`.
    pub fn new(transport: T, env: E, config: Config) -> Self {
        let connection = Connection::new(ConnectionConfig { ping_timeout: config.ping_timeout });
        Self {
            transport,
            env,
            config,
            connection,
            correlator: Correlator::new(),
            parser: Mup1Parser::new(),
            read_buf: Box::new([0u8; 4096]),
        }
    }

    /// Current connection state (§4.7).
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Tunables this engine was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn write_frame(&mut self, bytes: Bytes) -> Result<(), FacadeError> {
        self.transport.write_all(&bytes).await.map_err(|e| FacadeError::Transport(e.to_string()))
    }

    /// Reads one chunk from the transport and feeds it to the MUP1 parser.
    /// An empty read signals a closed transport (§7 "transport closure").
    async fn read_once(&mut self) -> Result<Vec<Mup1Frame>, FacadeError> {
        let n = self
            .transport
            .read(&mut self.read_buf[..])
            .await
            .map_err(|e| FacadeError::Transport(e.to_string()))?;
        if n == 0 {
            return Err(FacadeError::Core(CoreError::TransportDown));
        }
        Ok(self.parser.feed(&self.read_buf[..n]))
    }

    async fn run_connection_action(&mut self, action: ConnectionAction) -> Result<(), FacadeError> {
        match action {
            ConnectionAction::SendPing => self.write_frame(mup1::encode(FrameType::Ping, &[])).await,
            ConnectionAction::Disconnect { reason } => {
                tracing::warn!(reason, "connection torn down");
                Ok(())
            },
        }
    }

    /// Connects to the device: sends the MUP1 handshake ping and waits for
    /// the matching reply (§4.7).
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidState`] if not currently `Disconnected`;
    /// [`CoreError::Timeout`] if no reply arrives within `ping_timeout`.
    pub async fn connect(&mut self) -> Result<(), FacadeError> {
        let now = self.env.now();
        let actions = self.connection.connect(now)?;
        for action in actions {
            self.run_connection_action(action).await?;
        }

        loop {
            if self.connection.state() == ConnectionState::Connected {
                return Ok(());
            }

            tokio::select! {
                frames = self.read_once() => {
                    for frame in frames? {
                        self.dispatch_unsolicited(frame)?;
                    }
                },
                () = self.env.sleep(self.config.tick_interval) => {
                    let now = self.env.now();
                    for action in self.connection.tick(now) {
                        self.run_connection_action(action).await?;
                    }
                    if self.connection.state() == ConnectionState::Disconnected {
                        return Err(FacadeError::Core(CoreError::Timeout {
                            token: Vec::new(),
                            elapsed: self.config.ping_timeout,
                        }));
                    }
                },
            }
        }
    }

    fn dispatch_unsolicited(&mut self, frame: Mup1Frame) -> Result<(), FacadeError> {
        match frame.frame_type {
            FrameType::Ping => {
                let now = self.env.now();
                self.connection.handle_pong(now)?;
            },
            FrameType::Coap => {
                tracing::debug!("unsolicited CoAP frame dropped: no pending exchange matched");
            },
            FrameType::Announce | FrameType::Trace | FrameType::SysReq => {
                tracing::debug!(frame_type = ?frame.frame_type, "unsolicited frame ignored");
            },
        }
        Ok(())
    }

    /// A standalone diagnostic ping, independent of the connection state
    /// machine: succeeds on a matching `P` reply within `ping_timeout` (§4.6
    /// `ping()`).
    ///
    /// # Errors
    ///
    /// [`CoreError::Timeout`] if no reply arrives in time.
    pub async fn ping(&mut self) -> Result<(), FacadeError> {
        let start = self.env.now();
        self.write_frame(mup1::encode(FrameType::Ping, &[])).await?;

        loop {
            tokio::select! {
                frames = self.read_once() => {
                    for frame in frames? {
                        if frame.frame_type == FrameType::Ping {
                            return Ok(());
                        }
                    }
                },
                () = self.env.sleep(self.config.tick_interval) => {
                    let now = self.env.now();
                    let elapsed = now - start;
                    if elapsed >= self.config.ping_timeout {
                        return Err(FacadeError::Core(CoreError::Timeout { token: Vec::new(), elapsed }));
                    }
                },
            }
        }
    }

    /// Submits one CoAP request and drives the loop until a reply with the
    /// matching token arrives, the exchange exhausts its retry budget (§8
    /// scenario E), or the peer resets it.
    ///
    /// `request.token` is overwritten with the token the correlator assigns.
    ///
    /// # Errors
    ///
    /// [`CoreError::ParseError`] if encoding fails; [`CoreError::Timeout`] on
    /// retry exhaustion; [`CoreError::ClientError`]/[`CoreError::ServerError`]
    /// on a 4.xx/5.xx reply; [`CoreError::Reset`] on an RST reply.
    pub async fn exchange(&mut self, mut request: Message) -> Result<Message, FacadeError> {
        let token = self.correlator.allocate_token(&self.env);
        request.token = token.clone();
        let encoded = request.encode().map_err(CoreError::from)?;
        let frame = mup1::encode(FrameType::Coap, &encoded);
        let now = self.env.now();
        let token = self.correlator.submit(
            token,
            now,
            frame.clone(),
            self.config.retry_interval,
            self.config.max_attempts,
            None,
            (),
        );
        self.write_frame(frame).await?;

        let path = request_path(&request);

        loop {
            tokio::select! {
                frames = self.read_once() => {
                    for mup1_frame in frames? {
                        if mup1_frame.frame_type == FrameType::Ping {
                            let now = self.env.now();
                            let _ = self.connection.handle_pong(now);
                            continue;
                        }
                        if mup1_frame.frame_type != FrameType::Coap {
                            continue;
                        }
                        let message = Message::decode(&mup1_frame.payload).map_err(CoreError::from)?;
                        if message.token != token {
                            tracing::debug!("reply token mismatch, dropped");
                            continue;
                        }
                        self.correlator.complete(&token);
                        return resolve_response(message, &path);
                    }
                },
                () = self.env.sleep(self.config.tick_interval) => {
                    let now = self.env.now();
                    for action in self.correlator.tick(now) {
                        match action {
                            CorrelatorAction::Retransmit { frame, .. } => {
                                self.write_frame(frame).await?;
                            },
                            CorrelatorAction::Fail { token: failed, elapsed, .. } => {
                                if failed == token {
                                    return Err(FacadeError::Core(CoreError::Timeout {
                                        token: failed.to_vec(),
                                        elapsed,
                                    }));
                                }
                            },
                        }
                    }
                },
            }
        }
    }

    /// Cancels the exchange for `token`; a reply arriving afterwards is
    /// dropped by the correlator (§4.5 "Cancellation").
    pub fn cancel(&mut self, token: &[u8]) {
        self.correlator.cancel(token);
    }
}

fn request_path(request: &Message) -> String {
    request
        .options
        .iter()
        .filter(|o| o.number == option_number::URI_PATH)
        .map(|o| String::from_utf8_lossy(&o.value).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn resolve_response(response: Message, path: &str) -> Result<Message, FacadeError> {
    if response.msg_type == MessageType::Rst {
        return Err(FacadeError::Core(CoreError::Reset { path: path.to_string() }));
    }
    let code = response.code;
    if code.is_client_error() {
        return Err(FacadeError::Core(CoreError::ClientError {
            class: code.class,
            detail: code.detail,
            path: path.to_string(),
        }));
    }
    if code.is_server_error() {
        return Err(FacadeError::Core(CoreError::ServerError {
            class: code.class,
            detail: code.detail,
            path: path.to_string(),
        }));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use vdsp_proto::coap::Code;

    use super::*;

    #[test]
    fn request_path_joins_uri_path_segments() {
        let request = Message {
            msg_type: MessageType::Con,
            code: Code::GET,
            message_id: 0,
            token: Bytes::new(),
            options: vdsp_proto::coap::uri_path_options("ietf-interfaces:interfaces/interface"),
            payload: Bytes::new(),
        };
        assert_eq!(request_path(&request), "ietf-interfaces:interfaces/interface");
    }

    #[test]
    fn resolve_response_maps_client_and_server_errors() {
        let ok = Message {
            msg_type: MessageType::Ack,
            code: Code::CONTENT,
            message_id: 1,
            token: Bytes::new(),
            options: vec![],
            payload: Bytes::new(),
        };
        assert!(resolve_response(ok, "/x").is_ok());

        let not_found = Message { code: Code::NOT_FOUND, ..sample() };
        assert!(matches!(
            resolve_response(not_found, "/x"),
            Err(FacadeError::Core(CoreError::ClientError { .. }))
        ));

        let internal_error = Message { code: Code::INTERNAL_SERVER_ERROR, ..sample() };
        assert!(matches!(
            resolve_response(internal_error, "/x"),
            Err(FacadeError::Core(CoreError::ServerError { .. }))
        ));

        let reset = Message { msg_type: MessageType::Rst, ..sample() };
        assert!(matches!(resolve_response(reset, "/x"), Err(FacadeError::Core(CoreError::Reset { .. }))));
    }

    fn sample() -> Message {
        Message {
            msg_type: MessageType::Ack,
            code: Code::CONTENT,
            message_id: 1,
            token: Bytes::new(),
            options: vec![],
            payload: Bytes::new(),
        }
    }
}
