use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};

use pbm_rs::nbe::classify_text;
use pbm_rs::simulator::serve_udp;
use pbm_rs::{
    connect, init_logger, log_debug, log_error, log_info, log_warn, spawn_poller, BurnerConfig,
    CannedBurner, PollerConfig, ProtocolId, Snapshot,
};

#[derive(Parser)]
#[command(name = "pbm-cli")]
#[command(about = "CLI tool for NBE pellet burner controllers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the burner answers
    Discover {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Run one polling cycle and print the result as JSON
    Fetch {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Poll the burner until interrupted
    Monitor {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Classify a state/substate pair
    Classify { state: String, substate: String },
    /// Answer requests like a burner would
    Simulate {
        #[arg(long, default_value = "0.0.0.0:8483")]
        bind: String,
    },
}

#[derive(Args)]
struct ConnectionArgs {
    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    remote: Option<String>,
    #[arg(long)]
    remote_port: Option<u16>,
    #[arg(long)]
    local_address: Option<String>,
    #[arg(long)]
    local_port: Option<u16>,
    #[arg(long)]
    serial: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[arg(long)]
    refresh_minutes: Option<u64>,
    #[arg(long)]
    protocol: Option<String>,
}

impl ConnectionArgs {
    fn load(self) -> Result<BurnerConfig> {
        let mut config = match &self.config {
            Some(path) => BurnerConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BurnerConfig::default(),
        };
        if let Some(remote) = self.remote {
            config.remote_address = remote;
        }
        if let Some(port) = self.remote_port {
            config.remote_port = port;
        }
        if let Some(address) = self.local_address {
            config.local_address = address;
        }
        if let Some(port) = self.local_port {
            config.local_port = port;
        }
        if let Some(serial) = self.serial {
            config.serial = serial;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(minutes) = self.refresh_minutes {
            config.refresh_minutes = minutes;
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol.parse::<ProtocolId>()?;
        }
        Ok(config)
    }
}

fn print_snapshot(snapshot: &Snapshot) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    println!("current temperature:       {:?}", snapshot.current_temperature());
    println!("target temperature:        {:?}", snapshot.target_temperature());
    println!(
        "limit above / below:       {:?} / {:?}",
        snapshot.temperature_limit_above(),
        snapshot.temperature_limit_below()
    );
    println!(
        "silo contents / minimum:   {:?} / {:?}",
        snapshot.silo_contents(),
        snapshot.silo_minimum_contents()
    );
    println!("refill needed:             {:?}", snapshot.refill_needed());
    println!("auger consumption:         {:?}", snapshot.auger_consumption());
    println!("cleaning countdown:        {:?}", snapshot.cleaning_countdown());
    println!(
        "power output (% / kW):     {:?} / {:?}",
        snapshot.power_output_percent(),
        snapshot.power_output_kw()
    );
    match snapshot.previous_hour_consumption() {
        Ok(consumption) => println!("previous hour consumption: {consumption:?}"),
        Err(e) => println!("previous hour consumption: {e}"),
    }
    println!(
        "alarm:                     {:?} {:?}",
        snapshot.alarm_code(),
        snapshot.alarm_text()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Discover { connection } => {
            let config = connection.load()?;
            let mut monitor = connect(config.to_options()?, None)?;
            if monitor.discover(true).await? {
                log_info(&format!("Burner at {} answered", config.remote_address));
            } else {
                log_warn(&format!("Status: {}", monitor.status()));
                anyhow::bail!("burner at {} did not answer", config.remote_address);
            }
        }
        Commands::Fetch { connection } => {
            let config = connection.load()?;
            let options = config.to_options()?;
            log_debug(&format!("Fetching with {options:?}"));
            let mut monitor = connect(options, None)?;
            let snapshot = monitor.poll_once().await.context("polling burner")?;
            print_snapshot(snapshot)?;
        }
        Commands::Monitor { connection } => {
            let config = connection.load()?;
            let (tx, rx) = watch::channel(false);
            let monitor = Arc::new(Mutex::new(connect(config.to_options()?, Some(rx.clone()))?));
            let poller = spawn_poller(monitor.clone(), PollerConfig::from(&config), rx);

            tokio::signal::ctrl_c().await?;
            log_info("Stopping");
            let _ = tx.send(true);
            poller.await?;

            let monitor = monitor.lock().await;
            match monitor.last_snapshot() {
                Some(snapshot) => print_snapshot(snapshot)?,
                None => log_error(&format!("No data fetched, burner {}", monitor.status())),
            }
        }
        Commands::Classify { state, substate } => {
            let alarm = classify_text(&state, &substate)?;
            println!("{} {}", alarm.code, alarm.text);
        }
        Commands::Simulate { bind } => {
            let socket = UdpSocket::bind(&bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            let (tx, rx) = watch::channel(false);
            let server = tokio::spawn(serve_udp(socket, CannedBurner::with_defaults(), rx));

            tokio::signal::ctrl_c().await?;
            let _ = tx.send(true);
            server.await??;
        }
    }

    Ok(())
}
