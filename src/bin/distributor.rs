//! distributor CLI: feed slowsquare work to a distserver broker.

use clap::{Parser, Subcommand};
use distributor::codec;
use distributor::config::Config;
use distributor::distributor::Distributor;
use distributor::session::Session;
use distributor::slowsquare::RandomSquares;
use distributor::telemetry::{TelemetryConfig, init_telemetry};
use distributor::transport::Framer;
use num_bigint::BigInt;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "distributor", about = "Work-distribution client for a distserver broker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to the broker and distribute work until interrupted
    Run {
        /// TOML config file (environment variables are used otherwise)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Initial payloads to distribute before generated ones
        #[arg(long, num_args = 1..)]
        seed: Vec<BigInt>,
        /// Upper bound (exclusive) for randomly generated payloads
        #[arg(long, default_value_t = 20)]
        max: u64,
    },
    /// Print the fingerprint and inline address for a payload
    Encode {
        value: BigInt,
    },
    /// Decode an inline address into a payload
    Decode {
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, seed, max } => cmd_run(config, seed, max).await,
        Command::Encode { value } => {
            let encoded = codec::encode(&value);
            println!("fingerprint: {}", encoded.fingerprint);
            println!("address:     {}", encoded.address);
            Ok(())
        }
        Command::Decode { address } => {
            let value: BigInt = codec::decode(&address)?;
            println!("{value}");
            Ok(())
        }
    }
}

async fn cmd_run(config: Option<PathBuf>, seed: Vec<BigInt>, max: u64) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_env()?,
    };

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "distributor".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let mut distributor =
        Distributor::new(config.distributor_settings(), RandomSquares::new(1..max));
    distributor.queue_mut().seed(seed);

    let framer = Framer::connect(&config.host, config.port)
        .await?
        .with_send_timeout(config.send_timeout);
    let mut session = Session::new(distributor, framer);

    let shutdown = session.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.trigger();
    });

    session.run().await?;

    let queue = session.distributor().queue();
    println!(
        "completed {} of {} payloads ({} unsent, {} running)",
        queue.completed(),
        queue.created(),
        queue.unsent().len(),
        queue.running().len()
    );
    Ok(())
}
