use clap::Parser;
use env_logger::Env;
use log::info;
use server::dispatcher::Dispatcher;
use server::network::Server;
use server::secret::RandomSecrets;
use server::session::GameService;
use server::store::SessionStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on, UDP and TCP alike
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Log every handled request
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding session records and scores
    #[arg(short, long, default_value = "./gamedata")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // --verbose surfaces the per-request log lines; RUST_LOG still wins.
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let store = SessionStore::open(&args.data_dir)?;
    let service = GameService::new(store, Box::new(RandomSecrets));
    let dispatcher = Arc::new(Dispatcher::new(service));

    let address = format!("0.0.0.0:{}", args.port);
    let server = Server::bind(&address, dispatcher).await?;
    info!("Game server listening on {} (UDP and TCP)", address);
    info!("Session records under {}", args.data_dir.display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_handle = tokio::spawn(server.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    server_handle.await??;
    Ok(())
}
