use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use routesim::{Algorithm, RouterConfig, RouterController, logging};

/// Link between the A-th and B-th created routers
#[derive(Debug, Clone)]
struct LinkArg {
    a: usize,
    b: usize,
    cost: u32,
}

#[derive(Debug, Clone)]
struct SendArg {
    from: usize,
    to: usize,
    text: String,
}

#[derive(Parser)]
#[command(name = "routesim", about = "Simulated link-state / distance-vector router network")]
struct Cli {
    /// ls or dv. Overrides the config file
    #[arg(long, value_parser = parse_algorithm)]
    algorithm: Option<Algorithm>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 3)]
    routers: usize,

    /// A-B:COST, indices into the created routers
    #[arg(long = "link", value_parser = parse_link)]
    links: Vec<LinkArg>,

    /// A-B:TEXT
    #[arg(long = "send", value_parser = parse_send)]
    sends: Vec<SendArg>,

    /// Time to wait for convergence before sending and after
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,
}

fn parse_algorithm(s: &str) -> Result<Algorithm> {
    match s {
        "ls" | "link-state" => Ok(Algorithm::LinkState),
        "dv" | "distance-vector" => Ok(Algorithm::DistanceVector),
        other => bail!("unknown algorithm '{other}', expected ls or dv"),
    }
}

fn parse_pair(s: &str) -> Result<(usize, usize, &str)> {
    let (pair, rest) = s.split_once(':').context("expected A-B:VALUE")?;
    let (a, b) = pair.split_once('-').context("expected A-B:VALUE")?;
    Ok((a.trim().parse()?, b.trim().parse()?, rest))
}

fn parse_link(s: &str) -> Result<LinkArg> {
    let (a, b, cost) = parse_pair(s)?;
    Ok(LinkArg { a, b, cost: cost.trim().parse()? })
}

fn parse_send(s: &str) -> Result<SendArg> {
    let (from, to, text) = parse_pair(s)?;
    Ok(SendArg { from, to, text: text.to_string() })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let mut config = match &cli.config {
        Some(path) => RouterConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RouterConfig::default(),
    };
    if let Some(algorithm) = cli.algorithm {
        config.algorithm = algorithm;
    }

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(simulate(cli, config))
}

async fn simulate(cli: Cli, config: RouterConfig) -> Result<()> {
    let mut controller = RouterController::new(config)?;
    let mut events = controller.subscribe();
    let echo = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("log echo skipped {} events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut ids = Vec::with_capacity(cli.routers);
    for _ in 0..cli.routers {
        ids.push(controller.create_router().await?);
    }
    let id = |index: usize| {
        ids.get(index)
            .copied()
            .with_context(|| format!("router index {index} out of range"))
    };

    for link in &cli.links {
        controller.create_link(id(link.a)?, id(link.b)?, link.cost).await?;
    }
    let settle = Duration::from_millis(cli.settle_ms);
    tokio::time::sleep(settle).await;

    for send in &cli.sends {
        controller.communicate(id(send.from)?, &send.text, id(send.to)?).await?;
    }
    tokio::time::sleep(settle).await;

    for port in controller.router_ids() {
        let info = controller.fetch_node_info(port).await?;
        println!("{}", serde_json::to_string_pretty(&info)?);
    }

    controller.clear_routers().await;
    echo.abort();
    info!("simulation finished");
    Ok(())
}
