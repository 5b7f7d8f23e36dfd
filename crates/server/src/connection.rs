//! TCP listener and per-connection workers.
//!
//! Each accepted connection gets a reader task (this module's handler) and a
//! writer task fed through its [`Outbox`]. Readers block only themselves;
//! writers never block anyone else. Whatever way the handler exits, the
//! cleanup step runs and tells the registry the seat is gone.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::framing::FrameReader;
use crate::intake::{self, NicknamePolicy};
use crate::protocol::{ClientFrame, ServerFrame};
use crate::registry::Registry;
use crate::seat::{Outbound, Outbox, Player, Seat};
use crate::session::{GameSession, Progress};

/// Shared handles every connection worker needs.
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<Registry>,
    pub policy: Arc<NicknamePolicy>,
    pub default_time_control: u32,
}

/// Accept loop. Runs until the listener fails.
pub async fn serve(listener: TcpListener, ctx: ServerContext) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::debug!(%addr, "Connection accepted");
        tokio::spawn(handle_connection(stream, addr, ctx.clone()));
    }
}

/// Per-connection state threaded through the handler.
struct Connection {
    addr: SocketAddr,
    outbox: Outbox,
    nickname: Option<String>,
    seat: Option<(Arc<GameSession>, Seat)>,
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, ctx: ServerContext) {
    let (read_half, write_half) = stream.into_split();
    let (outbox, rx) = Outbox::channel();
    let writer = tokio::spawn(write_loop(write_half, rx));

    let mut conn = Connection {
        addr,
        outbox,
        nickname: None,
        seat: None,
    };
    let mut frames = FrameReader::new(BufReader::new(read_half));

    if let Err(e) = conn.run(&ctx, &mut frames).await {
        tracing::debug!(addr = %conn.addr, "Connection error: {}", e);
    }
    conn.cleanup(&ctx).await;

    drop(conn);
    let _ = writer.await;
}

impl Connection {
    async fn run(
        &mut self,
        ctx: &ServerContext,
        frames: &mut FrameReader<BufReader<OwnedReadHalf>>,
    ) -> std::io::Result<()> {
        let handshake = match frames.next_frame().await? {
            None => return Ok(()),
            Some(Ok(line)) => {
                intake::parse_handshake(&line, &ctx.policy, ctx.default_time_control)
                    .map_err(|e| e.to_string())
            }
            Some(Err(e)) => Err(e.to_string()),
        };
        let handshake = match handshake {
            Ok(hs) => hs,
            Err(reason) => {
                tracing::info!(addr = %self.addr, "Handshake rejected: {}", reason);
                self.outbox.send(ServerFrame::Error(reason));
                self.outbox.close();
                return Ok(());
            }
        };

        tracing::info!(
            addr = %self.addr,
            nickname = %handshake.nickname,
            time_control = handshake.time_control,
            "Player connected"
        );
        self.nickname = Some(handshake.nickname.clone());
        let player = Player::new(handshake.nickname, handshake.time_control, self.outbox.clone());
        let (session, seat) = ctx.registry.enqueue(player).await;
        self.seat = Some((session.clone(), seat));

        loop {
            tokio::select! {
                frame = frames.next_frame() => {
                    match frame? {
                        Some(Ok(line)) => self.dispatch(ctx, &session, seat, &line).await,
                        Some(Err(e)) => {
                            tracing::debug!(addr = %self.addr, "Bad frame: {}", e);
                            self.outbox.send(ServerFrame::Error(e.to_string()));
                        }
                        None => break,
                    }
                }
                _ = self.outbox.closed() => break,
            }
        }
        Ok(())
    }

    async fn dispatch(&self, ctx: &ServerContext, session: &Arc<GameSession>, seat: Seat, line: &str) {
        let frame = match ClientFrame::parse(line) {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                self.outbox.send(ServerFrame::Error(e.to_string()));
                return;
            }
        };

        match frame {
            ClientFrame::Move(token) => match session.submit_move(seat, &token).await {
                Ok(Progress::Continue) => {}
                Ok(Progress::Finished) => ctx.registry.remove(session.id()).await,
                Err(e) => {
                    tracing::debug!(
                        session_id = session.id(),
                        ?seat,
                        token = %token,
                        "Move rejected: {}",
                        e
                    );
                    self.outbox.send(ServerFrame::Error(e.to_string()));
                }
            },
            ClientFrame::QueryMoves(square) => {
                let squares = session.query_moves(seat, &square).await;
                self.outbox.send(ServerFrame::Moves(squares));
            }
            ClientFrame::Chat(text) => {
                if let Err(e) = session.relay_chat(seat, &text).await {
                    self.outbox.send(ServerFrame::Error(e.to_string()));
                }
            }
        }
    }

    /// Runs on every exit path: release the seat, then close our side.
    async fn cleanup(&mut self, ctx: &ServerContext) {
        if let Some((session, seat)) = self.seat.take() {
            ctx.registry.leave(&session, seat).await;
        }
        self.outbox.close();
        if let Some(nickname) = &self.nickname {
            tracing::info!(addr = %self.addr, nickname = %nickname, "Player disconnected");
        }
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: UnboundedReceiver<Outbound>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Frame(frame) => {
                let line = format!("{}\n", frame);
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    tracing::debug!("Write failed: {}", e);
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = writer.shutdown().await;
}
