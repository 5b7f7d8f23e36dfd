#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Client;
use server::config::Config;
use server::intake::NicknamePolicy;
use server::ServerHandle;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// How long a test waits for a single line before giving up.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Start an in-process server on ephemeral ports with a fast clock tick.
pub async fn spawn_server() -> ServerHandle {
    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        moderation_host: "127.0.0.1".to_string(),
        moderation_port: 0,
        clock_tick_ms: 50,
        ..Config::default()
    };
    let policy = NicknamePolicy::new(["admin", "moderator"]);
    server::start(&config, policy)
        .await
        .expect("Failed to start server")
}

/// Line-oriented TCP client speaking the game protocol.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to game server");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Connect and send the handshake line.
    pub async fn join(addr: SocketAddr, handshake: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(handshake).await;
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("Failed to write line");
    }

    /// Write bytes as-is, no newline added.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer
            .write_all(bytes)
            .await
            .expect("Failed to write bytes");
    }

    /// Non-`TIME` lines until the server closes the connection. No per-line
    /// timeout, for tests that run on a paused clock.
    pub async fn lines_until_closed(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(Some(line)) = self.lines.next_line().await {
            if !line.starts_with("TIME|") {
                out.push(line);
            }
        }
        out
    }

    /// Next line, or `None` once the server closed the connection.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("Timed out waiting for a line")
            .ok()
            .flatten()
    }

    /// Next line that is not a `TIME|` snapshot.
    pub async fn recv_skipping_time(&mut self) -> Option<String> {
        loop {
            match self.recv().await {
                Some(line) if line.starts_with("TIME|") => continue,
                other => return other,
            }
        }
    }

    /// Assert nothing but clock snapshots arrives within `window`.
    pub async fn assert_silent(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.lines.next_line()).await {
                Err(_) => return,
                Ok(Ok(Some(line))) if line.starts_with("TIME|") => continue,
                Ok(other) => panic!("Expected silence, got {:?}", other),
            }
        }
    }

    pub async fn expect_closed(&mut self) {
        let next = self.recv_skipping_time().await;
        assert_eq!(next, None, "Expected the server to close the connection");
    }
}

/// Two clients paired into one session. Returns `(white, black)`.
pub async fn paired(addr: SocketAddr, time_control: Option<u32>) -> (TestClient, TestClient) {
    let suffix = time_control.map(|tc| format!("|{tc}")).unwrap_or_default();
    let mut white = TestClient::join(addr, &format!("alice{suffix}")).await;
    // Give the first seat time to land in the waiting pool.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut black = TestClient::join(addr, &format!("bob{suffix}")).await;

    assert_eq!(white.recv().await.as_deref(), Some("START|WHITE"));
    assert_eq!(black.recv().await.as_deref(), Some("START|BLACK"));
    (white, black)
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

/// Build a URL for a moderation endpoint.
pub fn url(handle: &ServerHandle, path: &str) -> String {
    format!("http://{}{}", handle.moderation_addr, path)
}
