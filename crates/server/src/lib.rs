pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod framing;
pub mod intake;
pub mod moderation;
pub mod protocol;
pub mod registry;
pub mod routes;
pub mod seat;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use config::Config;
use connection::ServerContext;
use intake::NicknamePolicy;
use moderation::Moderation;
use registry::Registry;

/// A running game server and its moderation API.
pub struct ServerHandle {
    pub game_addr: SocketAddr,
    pub moderation_addr: SocketAddr,
    pub registry: Arc<Registry>,
    game_task: JoinHandle<anyhow::Result<()>>,
    moderation_task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Stop accepting connections on both listeners.
    pub fn abort(&self) {
        self.game_task.abort();
        self.moderation_task.abort();
    }
}

/// Bind both listeners and spawn their accept loops.
pub async fn start(config: &Config, policy: NicknamePolicy) -> anyhow::Result<ServerHandle> {
    let registry = Arc::new(Registry::new(Duration::from_millis(config.clock_tick_ms)));

    let game_listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let game_addr = game_listener.local_addr()?;
    let ctx = ServerContext {
        registry: registry.clone(),
        policy: Arc::new(policy),
        default_time_control: config.default_time_control,
    };
    let game_task = tokio::spawn(connection::serve(game_listener, ctx));

    let moderation_listener =
        TcpListener::bind((config.moderation_host.as_str(), config.moderation_port)).await?;
    let moderation_addr = moderation_listener.local_addr()?;
    let app = routes::router(Moderation::new(registry.clone()));
    let moderation_task = tokio::spawn(async move { axum::serve(moderation_listener, app).await });

    tracing::info!("Game server listening on {game_addr}");
    tracing::info!("Moderation API listening on {moderation_addr}");

    Ok(ServerHandle {
        game_addr,
        moderation_addr,
        registry,
        game_task,
        moderation_task,
    })
}
