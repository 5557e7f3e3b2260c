use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{
    Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler, WrapFuture,
};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc;

use whiteboard_system::{ClientMessage, ConnectionId, ServerMessage};

use crate::config::ServerConfig;
use crate::connection_tx_storage::ConnectionTx;
use crate::server::{ServerCommand, ServerTx};

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    ClientMessage {
        from: ConnectionId,
        message: ClientMessage,
    },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Message(Arc<ServerMessage>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected(ConnectionId),
    Disconnected,
}

#[derive(Debug, PartialEq)]
pub enum Admission {
    Forward(ConnectionId, ClientMessage),
    Buffered,
    Throttled,
    Closed,
}

/// Inbound side of one connection's lifecycle.
///
/// Holds messages back until the coordinator has assigned an id, and lets
/// through at most one cursor update per `cursor_interval`.
pub struct InboundGate {
    state: ConnectionState,
    pending: Vec<ClientMessage>,
    cursor_interval: Duration,
    last_cursor: Option<Instant>,
}

impl InboundGate {
    pub fn new(cursor_interval: Duration) -> Self {
        Self {
            state: ConnectionState::Connecting,
            pending: Vec::new(),
            cursor_interval,
            last_cursor: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn admit(&mut self, message: ClientMessage, now: Instant) -> Admission {
        if let ClientMessage::Cursor { .. } = message {
            if let Some(last) = self.last_cursor {
                if now.saturating_duration_since(last) < self.cursor_interval {
                    return Admission::Throttled;
                }
            }
            self.last_cursor = Some(now);
        }
        match self.state {
            ConnectionState::Connecting => {
                self.pending.push(message);
                Admission::Buffered
            }
            ConnectionState::Connected(connection_id) => Admission::Forward(connection_id, message),
            ConnectionState::Disconnected => Admission::Closed,
        }
    }

    /// Moves to `Connected` and hands back whatever arrived before.
    pub fn connected(&mut self, connection_id: ConnectionId) -> Vec<ClientMessage> {
        if self.state != ConnectionState::Connecting {
            log::warn!("Connection {} acknowledged twice", connection_id);
            return Vec::new();
        }
        self.state = ConnectionState::Connected(connection_id);
        std::mem::take(&mut self.pending)
    }

    /// Moves to `Disconnected`; returns the id the coordinator knows us by.
    pub fn disconnected(&mut self) -> Option<ConnectionId> {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        self.pending.clear();
        match previous {
            ConnectionState::Connected(connection_id) => Some(connection_id),
            _ => None,
        }
    }
}

/// Hands coordinator events to the connection actor through `deliver` until
/// either side goes away.
///
/// An actor that stops before handling `Connected` never reports its own
/// disconnect, so once delivery fails the relay reports it for any id it
/// has seen. The coordinator ignores a repeated report.
async fn relay_events<F>(
    mut rx: mpsc::Receiver<ConnectionEvent>,
    srv_tx: ServerTx,
    mut deliver: F,
) where
    F: FnMut(ConnectionEvent) -> Result<(), ConnectionEvent>,
{
    let mut connection_id = None;
    let mut orphaned = None;
    while let Some(event) = rx.recv().await {
        if let ConnectionEvent::Connected { connection_id: id } = event {
            connection_id = Some(id);
        }
        if deliver(event).is_err() {
            orphaned = connection_id;
            break;
        }
    }
    // The coordinator may be blocked sending to this buffer.
    drop(rx);

    if let Some(from) = orphaned {
        let command = ServerCommand::Connection(ConnectionCommand::Disconnect { from });
        if srv_tx.send(command).await.is_err() {
            log::error!("Server loop is gone; disconnect of {} dropped", from);
        }
    }
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

struct ConnectionActor {
    gate: InboundGate,
    srv_tx: ServerTx,
    connection_buffer: usize,
}

impl ConnectionActor {
    fn new(srv_tx: ServerTx, config: &ServerConfig) -> Self {
        Self {
            gate: InboundGate::new(config.cursor_interval),
            srv_tx,
            connection_buffer: config.connection_buffer,
        }
    }

    /// Queues `command` on the coordinator. The actor handles nothing else
    /// until the command is accepted, which keeps inbound order intact.
    fn forward(&self, command: ConnectionCommand, ctx: &mut ws::WebsocketContext<Self>) {
        let srv_tx = self.srv_tx.clone();
        ctx.wait(
            async move {
                if srv_tx.send(ServerCommand::Connection(command)).await.is_err() {
                    log::error!("Server loop is gone; inbound command dropped");
                }
            }
            .into_actor(self),
        );
    }

    fn admit(&mut self, message: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let kind = message.kind();
        match self.gate.admit(message, Instant::now()) {
            Admission::Forward(from, message) => {
                self.forward(ConnectionCommand::ClientMessage { from, message }, ctx)
            }
            Admission::Buffered => log::debug!("Buffered {} until connected", kind),
            Admission::Throttled => log::trace!("Throttled {}", kind),
            Admission::Closed => log::debug!("Dropped {} after disconnect", kind),
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(self.connection_buffer);

        self.forward(ConnectionCommand::Connect { tx }, ctx);

        let addr = ctx.address();
        let srv_tx = self.srv_tx.clone();

        actix::spawn(async move {
            log::debug!("connection relay - started");
            relay_events(rx, srv_tx, move |event| {
                if addr.connected() {
                    addr.do_send(ConnectionActorMessage(event));
                    Ok(())
                } else {
                    Err(event)
                }
            })
            .await;
            log::debug!("connection relay - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(from) = self.gate.disconnected() {
            let srv_tx = self.srv_tx.clone();
            actix::spawn(async move {
                let command = ServerCommand::Connection(ConnectionCommand::Disconnect { from });
                if srv_tx.send(command).await.is_err() {
                    log::error!("Server loop is gone; disconnect of {} dropped", from);
                }
            });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => match ClientMessage::decode(&text) {
                Ok(message) => self.admit(message, ctx),
                Err(err) => log::warn!("Dropping inbound message: {}", err),
            },
            Ok(ws::Message::Binary(bin)) => {
                log::warn!("Dropping binary frame of {} bytes", bin.len());
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => (),
            Err(err) => {
                log::warn!("WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                for message in self.gate.connected(connection_id) {
                    self.forward(
                        ConnectionCommand::ClientMessage {
                            from: connection_id,
                            message,
                        },
                        ctx,
                    );
                }
            }
            ConnectionEvent::Message(message) => match message.encode() {
                Ok(text) => ctx.text(text),
                Err(err) => log::error!("Failed to encode {}: {}", message.kind(), err),
            },
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor::new(srv_tx.get_ref().clone(), config.get_ref()),
        &req,
        stream,
    )
}
