//! Ship one task try's local log to S3 and print the remote view.
//!
//! Run with: cargo run -p log-shipper-demo -- shipper.json etl extract 2016-01-01T00:00:00 1
//!
//! `shipper.json` holds the handler settings plus a table of S3 connections:
//!
//! ```json
//! {
//!   "logging": {
//!     "local_base_log_folder": "logs",
//!     "remote_base_log_folder": "s3://task-logs/logs"
//!   },
//!   "connections": {
//!     "": {
//!       "region": "us-east-1",
//!       "endpoint_url": "http://127.0.0.1:9000",
//!       "force_path_style": true
//!     }
//!   }
//! }
//! ```

use std::{collections::HashMap, path::PathBuf};

use anyhow::{Context, bail};
use remote_log_core::{RemoteLogConfig, TaskInstanceKey};
use remote_log_storage::{
    TaskLogHandler,
    storage::{S3ClientFactory, S3ConnectionConfig},
};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShipperConfig {
    logging: RemoteLogConfig,
    connections: HashMap<String, S3ConnectionConfig>,
}

struct Args {
    config: PathBuf,
    ti: TaskInstanceKey,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config, dag_id, task_id, execution_date, try_number] = args.as_slice() else {
        bail!("usage: log-shipper <config.json> <dag_id> <task_id> <execution_date> <try_number>");
    };
    let try_number = try_number
        .parse()
        .with_context(|| format!("invalid try number: {try_number}"))?;

    Ok(Args {
        config: PathBuf::from(config),
        ti: TaskInstanceKey::new(dag_id, task_id, execution_date, try_number),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let config: ShipperConfig = serde_json::from_str(&raw).context("parsing shipper config")?;

    info!(
        remote_base = %config.logging.remote_base_log_folder,
        conn_id = %config.logging.remote_log_conn_id,
        "Shipping task log"
    );

    let factory = S3ClientFactory::new(config.connections);
    let mut handler = TaskLogHandler::from_config(&config.logging, factory);
    handler.set_context(&args.ti, false);
    handler.close().await;

    println!("{}", handler.read(&args.ti, args.ti.try_number).await);
    Ok(())
}
