/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod broker;
mod config;
mod gateway;

use crate::broker::BrokerReceiver;
use crate::config::{Config, ConfigError};
use crate::gateway::{HttpDispatchGateway, DEFAULT_REQUEST_TIMEOUT};
use clap::Parser;
use mq_streamer::observability::events;
use mq_streamer::{ChannelStreamer, StreamerError};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const COMPONENT: &str = "mq_streamer_daemon";

#[derive(Parser)]
#[command(version, about = "Streams MQTT measurements to ThingSpeak and Phant channels")]
struct StreamerArgs {
    #[arg(short, long, value_name = "FILE")]
    config: String,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("unable to start streamer: {0}")]
    Streamer(#[from] StreamerError),
    #[error("unable to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    let args = StreamerArgs::parse();
    init_logging(args.verbose);

    info!("Started mq-streamer-daemon");

    let setup = Config::load(&args.config)?.resolve()?;
    info!(
        event = events::DAEMON_CONFIG_LOADED,
        component = COMPONENT,
        config = args.config.as_str(),
        brokers = setup.brokers.len(),
        channels = setup.specs.len(),
        routes = setup.mapping.len(),
        "configuration loaded"
    );

    let gateway = Arc::new(HttpDispatchGateway::new(
        setup.remotes,
        DEFAULT_REQUEST_TIMEOUT,
    )?);
    let streamer = ChannelStreamer::with_tokio_timers(setup.specs, setup.mapping, gateway)?;

    let shutdown = CancellationToken::new();
    let receivers: Vec<_> = setup
        .brokers
        .into_iter()
        .map(|broker| BrokerReceiver::new(broker, streamer.listener(), shutdown.clone()).spawn())
        .collect();

    let signal = tokio::signal::ctrl_c().await;
    info!(component = COMPONENT, "shutting down");
    shutdown.cancel();
    for receiver in receivers {
        if let Err(err) = receiver.await {
            error!(component = COMPONENT, err = %err, "broker receiver task failed");
        }
    }
    streamer.shutdown().await;

    signal.map_err(DaemonError::from)
}
