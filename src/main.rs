// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;
use std::{env, process};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use zeroize::Zeroize;

use solcloak::api::router;
use solcloak::chain::SolanaRpc;
use solcloak::clock::SystemClock;
use solcloak::config::RelayerConfig;
use solcloak::coordinator::{MixingCoordinator, StrategyProfile};
use solcloak::monitor::DepositMonitor;
use solcloak::recovery::RecoveryLedger;
use solcloak::registry::Registry;
use solcloak::state::AppState;
use solcloak::storage::{FsStore, StoragePaths};
use solcloak::vault::crypto::MasterKey;
use solcloak::vault::WalletVault;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let mut config = match RelayerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            process::exit(1);
        }
    };

    let mut store = FsStore::new(StoragePaths::new(&config.data_dir));
    if let Err(e) = store.initialize() {
        error!(error = %e, "failed to initialize storage");
        process::exit(1);
    }
    let store = Arc::new(store);

    let registry = match Registry::open(&store.paths().registry_db()) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "failed to open swap registry");
            process::exit(1);
        }
    };

    let rpc = Arc::new(SolanaRpc::new(config.rpc_url.clone()));
    let master_key = MasterKey::new(config.master_key);
    config.master_key.zeroize();

    let vault = Arc::new(WalletVault::new(
        store.clone(),
        rpc.clone(),
        master_key,
        config.treasury.take(),
    ));

    let clock = Arc::new(SystemClock);
    let ledger = Arc::new(RecoveryLedger::new(
        registry.clone(),
        vault.clone(),
        clock.clone(),
    ));
    let coordinator = Arc::new(MixingCoordinator::new(
        registry.clone(),
        vault.clone(),
        clock,
        StrategyProfile::for_mode(config.privacy_mode),
        config.fee_wallet,
        StdRng::from_entropy(),
    ));

    let shutdown = CancellationToken::new();
    let monitor = DepositMonitor::new(
        registry.clone(),
        vault.clone(),
        rpc,
        coordinator,
    );
    let monitor_handle = tokio::spawn(monitor.run(shutdown.clone()));

    let state = AppState::new(
        registry,
        vault,
        ledger,
        config.network.clone(),
        config.privacy_mode,
    );
    let app = router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = match format!("{host}:{port}").parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "failed to parse bind address");
            process::exit(1);
        }
    };

    info!(
        %addr,
        network = %config.network,
        privacy_mode = config.privacy_mode.as_str(),
        "solcloak relayer listening (docs at /docs)"
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "failed to bind TCP listener");
            process::exit(1);
        }
    };

    let server_shutdown = shutdown.clone();
    let serve = axum::serve(listener, app.into_make_service()).with_graceful_shutdown(async move {
        server_shutdown.cancelled().await;
    });

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!(error = %e, "server failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    }

    shutdown.cancel();
    let _ = monitor_handle.await;
    info!("relayer stopped");
}
