//! Chat broker entry point

use chatroom_broker::config::BrokerConfig;
use chatroom_broker::server::Broker;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatroomd")]
#[command(about = "Multi-room chat broker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the broker
    Serve {
        /// Configuration file (TOML); CLI flags below override its values
        #[arg(short, long)]
        config: Option<String>,

        /// Reliable (TCP) bind address
        #[arg(long)]
        tcp_addr: Option<String>,

        /// Unreliable (UDP) bind address
        #[arg(long)]
        udp_addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            tcp_addr,
            udp_addr,
        } => {
            let mut config = match config {
                Some(path) => BrokerConfig::from_file(&path)?,
                None => BrokerConfig::default(),
            };
            if let Some(addr) = tcp_addr {
                config.tcp_addr = addr;
            }
            if let Some(addr) = udp_addr {
                config.udp_addr = addr;
            }
            config.validate();

            let broker = Broker::new(config);
            broker.run().await?;
        }
    }

    Ok(())
}
