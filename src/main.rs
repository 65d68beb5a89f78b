use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use bytes::Bytes;
use clap::Parser;
use http::StatusCode;
use http_body_util::Full;
use log::{error, info};
use vetis_ctx::{
    config::ServerConfig,
    server::http::{handler_fn, HttpServer},
    shutdown_signal,
};

#[derive(Parser)]
#[command(
    name = "vetis-ctx",
    version,
    about = "vetis-ctx - serve until told to stop, then stop gracefully"
)]
struct Args {
    #[arg(short, long, help = "YAML config file to use.")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Interface to bind to.")]
    interface: Option<String>,

    #[arg(short, long, help = "Port to bind to.")]
    port: Option<u16>,

    #[arg(long, help = "PEM certificate chain file.")]
    cert: Option<PathBuf>,

    #[arg(long, help = "PEM private key file.")]
    key: Option<PathBuf>,

    #[arg(short, long, help = "Seconds to wait for connections to drain.")]
    timeout: Option<u64>,
}

impl Args {
    fn server_config(self) -> Result<ServerConfig, Box<dyn Error>> {
        let base = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        let mut builder = ServerConfig::builder()
            .interface(
                self.interface
                    .as_deref()
                    .unwrap_or(base.interface()),
            )
            .port(
                self.port
                    .unwrap_or(base.port()),
            )
            .protocol(
                base.protocol()
                    .clone(),
            )
            .shutdown_timeout(
                self.timeout
                    .map(Duration::from_secs)
                    .unwrap_or(base.shutdown_timeout()),
            );

        if let Some(cert) = self
            .cert
            .or_else(|| {
                base.cert()
                    .map(PathBuf::from)
            })
        {
            builder = builder.cert(cert);
        }
        if let Some(key) = self
            .key
            .or_else(|| {
                base.key()
                    .map(PathBuf::from)
            })
        {
            builder = builder.key(key);
        }

        Ok(builder.build()?)
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let config = Args::parse().server_config()?;

    let server = Arc::new(HttpServer::new(
        config,
        handler_fn(|_request| async move {
            let mut response = http::Response::new(Full::new(Bytes::from_static(b"Hello, World!")));
            *response.status_mut() = StatusCode::OK;
            Ok(response)
        }),
    ));

    match server
        .run_until(shutdown_signal())
        .await
    {
        Ok(()) => info!("Server stopped gracefully"),
        Err(e) if e.is_closed() => info!("Server closed"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if let Err(e) = run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
