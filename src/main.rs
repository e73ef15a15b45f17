use transit_network::auth::{AuthProvider, TokenTable};
use transit_network::database::{MemoryRepository, PostgresRepository, Repository};
use transit_network::routes;
use transit_network::structs::Args;
use transit_network::AppState;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use clap::Parser;
use log::{info, warn};

use std::io;
use std::sync::Arc;

fn other<E: Into<Box<dyn std::error::Error + Send + Sync>>>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    info!("Starting Transit Network Server ... ");

    let repository: Arc<dyn Repository> = if args.offline {
        warn!("[main] running offline, nothing will be persisted");
        Arc::new(MemoryRepository::new())
    } else {
        Arc::new(PostgresRepository::connect().map_err(other)?)
    };

    let auth: Arc<dyn AuthProvider> = match &args.tokens {
        Some(path) => Arc::new(TokenTable::load(path).map_err(other)?),
        None => {
            warn!("[main] no token table given, every protected route will answer 401");
            Arc::new(TokenTable::new())
        }
    };

    let state = web::Data::new(AppState::new(repository, auth));

    let prometheus = PrometheusMetricsBuilder::new("transit_network")
        .endpoint("/metrics")
        .build()
        .map_err(|e| other(e.to_string()))?;

    info!("Listening on: {}:{}", args.host, args.port);
    HttpServer::new(move || {
        App::new()
            .wrap(prometheus.clone())
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await
}
