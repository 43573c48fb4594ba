//! Cassandra exporter binary
//!
//! Loads the YAML config, starts the exposition server, and runs one
//! scrape pipeline per configured host. Pipelines are independent tasks;
//! the only thing they share is the exposition endpoint.

use cassandra_exporter::config::{self, Config};
use cassandra_exporter::jolokia::JolokiaConnector;
use cassandra_exporter::registry::MetricRegistry;
use cassandra_exporter::schedule::ScrapeScheduler;
use cassandra_exporter::scrape::ScrapeEngine;
use cassandra_exporter::source::Connector;
use cassandra_exporter::{server, telemetry};

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Prometheus exporter for Apache Cassandra management metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(default_value = config::DEFAULT_PATH)]
    config: String,

    /// Run a single scrape cycle per host, then exit
    #[arg(long)]
    oneshot: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    telemetry::init_logging(&args.log_level);

    let cfg = match Config::from_file(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("cannot parse config file present at {}: {}", args.config, e);
            return Err(e.into());
        }
    };

    let labels = config::additional_labels_from_env(
        std::env::vars(),
        cfg.additional_labels_pattern()?.as_ref(),
    );

    let hosts = cfg.hosts();
    let registries: Vec<Arc<MetricRegistry>> = hosts
        .iter()
        .map(|_| Arc::new(MetricRegistry::new(labels.clone())))
        .collect();

    let listen_addr: SocketAddr = format!("{}:{}", cfg.listen_address, cfg.listen_port).parse()?;
    let exposition = tokio::spawn(server::serve(listen_addr, registries.clone()));

    let mut pipelines = Vec::with_capacity(hosts.len());
    for (host, registry) in hosts.into_iter().zip(registries) {
        let cfg = cfg.clone();
        let oneshot = args.oneshot;
        pipelines.push(tokio::spawn(async move {
            run_pipeline(cfg, host, registry, oneshot).await
        }));
    }

    for pipeline in pipelines {
        pipeline.await??;
    }

    if args.oneshot {
        // Normal one-shot completion; the exposition server dies with us.
        return Ok(());
    }

    // Continuous pipelines only return on unrecoverable setup errors;
    // keep serving whatever was scraped until then.
    exposition.await??;
    Ok(())
}

/// One node's scrape pipeline: connect, run, and on any failure reconnect
/// after a fixed delay. Never crashes the process in continuous mode.
async fn run_pipeline(
    cfg: Config,
    host: String,
    registry: Arc<MetricRegistry>,
    oneshot: bool,
) -> cassandra_exporter::Result<()> {
    let connector = JolokiaConnector::new(
        JolokiaConnector::url_for(&host, cfg.ssl),
        cfg.user.clone(),
        cfg.password.clone(),
    );

    // The engine (and its tier clocks) survives reconnects; only the
    // registry is cleared on a fresh connection.
    let scheduler = ScrapeScheduler::new(
        &cfg.blacklist,
        &cfg.max_scrap_frequency_in_sec,
        cfg.tier_boundary(),
    )?;
    let mut engine = ScrapeEngine::new(scheduler, Arc::clone(&registry));

    loop {
        let outcome = match connector.connect().await {
            Ok(source) => engine.run(source.as_ref(), !oneshot).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                if oneshot {
                    return Ok(());
                }
                info!(host = %host, "scraper stopped, reconnecting");
            }
            Err(e) => {
                if oneshot {
                    return Err(e);
                }
                error!(host = %host, "scraper stopped due to uncaught error: {}", e);
            }
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
