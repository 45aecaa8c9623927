mod cooldown;
mod http_store;
mod launch;
mod ws_channel;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use canvas::channel::ChannelError;
use canvas::consts::{BACKGROUND_COLOR, DEFAULT_BOARD_SIZE, DEFAULT_PALETTE};
use canvas::grid::BoardId;
use canvas::identity::{Identity, IdentityError, IdentityStore};
use canvas::reconciler::Cell;
use canvas::session::{BoardSource, PersistPolicy, PlaceError, Placement, Session, SessionConfig};
use canvas::store::BoardStore;
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cooldown::CooldownStamp;
use crate::http_store::HttpBoardStore;
use crate::launch::HttpLauncher;
use crate::ws_channel::{WsChannel, ws_url};

/// How long a one-shot placement waits for its launch POST before exiting.
const LAUNCH_DRAIN: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Unhealthy(u16),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Place(#[from] PlaceError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("cannot read {path}: {source}")]
    ReadFile { path: String, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pixelboard", about = "Headless client for the shared pixel board")]
struct Cli {
    #[arg(long, env = "PIXELBOARD_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "PIXELBOARD_IDENTITY_DIR", default_value = ".pixelboard")]
    identity_dir: PathBuf,

    #[arg(long, env = "PIXELBOARD_PROFILE", default_value = "default", help = "Identity profile to act as")]
    profile: String,

    #[arg(long, env = "PIXELBOARD_LAUNCH_URL", help = "POST a launch request here after each placement")]
    launch_url: Option<String>,

    #[arg(long, default_value_t = false, help = "Write snapshots against the last known version")]
    versioned: bool,

    #[arg(long, env = "PIXELBOARD_TIMEOUT_SECS", default_value_t = 5, help = "Websocket connect and join timeout")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
struct BoardArgs {
    #[arg(long, default_value_t = 1)]
    board: BoardId,

    #[arg(long, default_value_t = DEFAULT_BOARD_SIZE)]
    size: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Load the board and print a summary.
    Load {
        #[command(flatten)]
        board: BoardArgs,
        #[arg(long, default_value_t = false, help = "Include every cell value")]
        cells: bool,
    },
    /// Place a palette color. The cooldown carries over between runs of
    /// the same profile.
    Place {
        #[command(flatten)]
        board: BoardArgs,
        x: i64,
        y: i64,
        color: u16,
    },
    /// Upload an image as a tile and place it.
    PlaceImage {
        #[command(flatten)]
        board: BoardArgs,
        x: i64,
        y: i64,
        file: PathBuf,
    },
    /// Print remote placements and presence as JSON lines.
    Watch {
        #[command(flatten)]
        board: BoardArgs,
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Who placed the cell at (x, y).
    Owner {
        #[command(flatten)]
        board: BoardArgs,
        x: i64,
        y: i64,
    },
    /// Show the local identity, optionally renaming it.
    Identity {
        #[arg(long)]
        name: Option<String>,
    },
    Palette,
}

struct CliContext {
    base_url: String,
    client: reqwest::Client,
    identity: IdentityStore,
    launch_url: Option<String>,
    persist_policy: PersistPolicy,
    timeout: Duration,
}

impl CliContext {
    fn store(&self) -> Arc<HttpBoardStore> {
        Arc::new(HttpBoardStore::new(self.client.clone(), &self.base_url))
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext {
        client: reqwest::Client::new(),
        identity: IdentityStore::scoped(&cli.identity_dir, &cli.profile),
        base_url: cli.base_url,
        launch_url: cli.launch_url,
        persist_policy: if cli.versioned { PersistPolicy::Versioned } else { PersistPolicy::LastWriteWins },
        timeout: Duration::from_secs(cli.timeout_secs),
    };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Load { board, cells } => run_load(&ctx, board, cells).await,
        Command::Place { board, x, y, color } => run_place(&ctx, board, x, y, Placing::Color(color)).await,
        Command::PlaceImage { board, x, y, file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .map_err(|source| CliError::ReadFile { path: file.display().to_string(), source })?;
            run_place(&ctx, board, x, y, Placing::Image(bytes)).await
        }
        Command::Watch { board, seconds } => run_watch(&ctx, board, Duration::from_secs(seconds)).await,
        Command::Owner { board, x, y } => run_owner(&ctx, board, x, y).await,
        Command::Identity { name } => {
            let identity = match name {
                Some(name) => ctx.identity.set_display_name(&name)?,
                None => ctx.identity.load_or_create()?,
            };
            print_json(&identity_json(&identity))
        }
        Command::Palette => print_json(&json!(DEFAULT_PALETTE)),
    }
}

async fn run_ping(ctx: &CliContext) -> Result<(), CliError> {
    let url = format!("{}/healthz", ctx.base_url.trim_end_matches('/'));
    let status = ctx.client.get(url).send().await?.status();
    if !status.is_success() {
        return Err(CliError::Unhealthy(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

// =============================================================================
// SESSION COMMANDS
// =============================================================================

async fn open_session(ctx: &CliContext, board: BoardArgs) -> Result<(Session, Option<Arc<HttpLauncher>>), CliError> {
    let identity = ctx.identity.load_or_create()?;
    let store = ctx.store();
    let channel = Arc::new(WsChannel::new(&ws_url(&ctx.base_url)?).with_handshake_timeout(ctx.timeout));
    let config = SessionConfig { persist_policy: ctx.persist_policy, ..SessionConfig::default() };

    let mut session = Session::new(identity, store.clone(), channel, config).with_tiles(store);
    let launcher = ctx
        .launch_url
        .as_deref()
        .map(|url| Arc::new(HttpLauncher::new(ctx.client.clone(), url)));
    if let Some(launcher) = &launcher {
        session = session.with_launcher(launcher.clone());
    }
    session.open(board.board, board.size, Instant::now()).await;
    Ok((session, launcher))
}

async fn run_load(ctx: &CliContext, board: BoardArgs, cells: bool) -> Result<(), CliError> {
    let (mut session, _) = open_session(ctx, board).await?;
    let reconciler = session.reconciler();
    let mut summary = status_json(&session);
    summary["painted"] = json!(reconciler.cells().iter().filter(|c| **c != BACKGROUND_COLOR).count());
    summary["owned"] = json!(reconciler.owners().iter().flatten().count());
    summary["images"] = json!(reconciler.images().iter().flatten().count());
    if cells {
        summary["cells"] = json!(reconciler.cells());
    }
    session.close();
    print_json(&summary)
}

enum Placing {
    Color(u16),
    Image(Vec<u8>),
}

async fn run_place(ctx: &CliContext, board: BoardArgs, x: i64, y: i64, placing: Placing) -> Result<(), CliError> {
    let stamp = CooldownStamp::beside(ctx.identity.path());
    let (mut session, launcher) = open_session(ctx, board).await?;
    let now = Instant::now();
    carry_cooldown(&mut session, &stamp, now);
    let result = match &placing {
        Placing::Color(color) => session.place_color(x, y, *color, now).await,
        Placing::Image(bytes) => session.place_image(x, y, bytes, now).await,
    };
    session.close();
    let placement = result?;
    if let Err(e) = stamp.record(SystemTime::now()) {
        warn!(path = %stamp.path().display(), error = %e, "cooldown stamp not written");
    }

    print_json(&placement_json(&placement, &session, now))?;
    if let Some(launcher) = launcher {
        if !launcher.wait_completed(1, LAUNCH_DRAIN).await {
            warn!("launch notification still pending at exit");
        }
    }
    Ok(())
}

/// Arm the session with the cooldown left from this profile's last run.
fn carry_cooldown(session: &mut Session, stamp: &CooldownStamp, now: Instant) {
    if let Some(elapsed) = stamp.elapsed_at(SystemTime::now()) {
        session.resume_cooldown(elapsed, now);
    }
}

async fn run_watch(ctx: &CliContext, board: BoardArgs, duration: Duration) -> Result<(), CliError> {
    let (mut session, _) = open_session(ctx, board).await?;
    if !session.status().connected {
        warn!(board_id = board.board, "not connected, nothing to watch");
    }

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut tick = tokio::time::interval(session.config().tick_interval);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            _ = tick.tick() => {
                let players = session.tick(Instant::now());
                let players: Vec<Value> = players.iter().map(|p| json!({ "key": p.key, "meta": p.meta })).collect();
                print_line(&json!({ "type": "presence", "players": players }))?;
            }
            event = session.recv() => {
                let Some(event) = event else { break };
                let idx = session.handle_event(&event, Instant::now());
                let line = idx.and_then(|_| session.ticker().lines().next());
                print_line(&json!({
                    "type": event.name(),
                    "payload": event.payload(),
                    "idx": idx,
                    "ticker": line,
                }))?;
            }
        }
    }
    session.close();
    Ok(())
}

async fn run_owner(ctx: &CliContext, board: BoardArgs, x: i64, y: i64) -> Result<(), CliError> {
    let (mut session, _) = open_session(ctx, board).await?;
    session.close();
    let reconciler = session.reconciler();
    let idx = reconciler.grid().index(x, y);

    // The per-pixel table may know an owner the snapshot lost.
    let mut record = None;
    if let Some(idx) = idx.and_then(|i| u32::try_from(i).ok()) {
        match ctx.store().pixel_owner(board.board, idx).await {
            Ok(found) => record = found,
            Err(e) => warn!(board_id = board.board, idx, error = %e, "pixel owner lookup failed"),
        }
    }

    print_json(&json!({
        "x": x,
        "y": y,
        "idx": idx,
        "cell": reconciler.cell_at(x, y).as_ref().map(cell_json),
        "owner": reconciler.owner_at(x, y),
        "record": record,
    }))
}

// =============================================================================
// OUTPUT
// =============================================================================

fn status_json(session: &Session) -> Value {
    let status = session.status();
    let reconciler = session.reconciler();
    json!({
        "board_id": reconciler.board_id(),
        "size": reconciler.grid().size(),
        "version": reconciler.version(),
        "connected": status.connected,
        "source": match status.board_source {
            BoardSource::Server => "server",
            BoardSource::Local => "local",
        },
        "last_persist_error": status.last_persist_error,
    })
}

fn placement_json(placement: &Placement, session: &Session, now: Instant) -> Value {
    json!({
        "idx": placement.idx,
        "event": placement.event.name(),
        "payload": placement.event.payload(),
        "status": status_json(session),
        "cooldown_secs": session.cooldown_remaining(now).as_secs(),
    })
}

fn cell_json(cell: &Cell) -> Value {
    match cell {
        Cell::Color(index) => json!({ "color": index }),
        Cell::Image(url) => json!({ "image": url }),
    }
}

fn identity_json(identity: &Identity) -> Value {
    json!({
        "id": identity.id.to_string(),
        "display_name": identity.display_name,
        "color": identity.color,
        "presence_key": identity.presence_key(),
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn print_line(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
