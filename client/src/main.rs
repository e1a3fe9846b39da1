use clap::Parser;
use client::commands::GameClient;
use client::network::Connection;
use log::info;
use tokio::net::lookup_host;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server hostname to connect to
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Server port (UDP and TCP)
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let server = lookup_host((args.host.as_str(), args.port))
        .await?
        .next()
        .ok_or_else(|| format!("could not resolve {}:{}", args.host, args.port))?;

    info!("Playing against {} ({}:{})", server, args.host, args.port);

    let mut client = GameClient::new(Connection::new(server, server));
    client.run().await?;

    Ok(())
}
