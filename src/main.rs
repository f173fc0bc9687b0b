use clap::Parser;
use log::info;
use rfpixels::{server, Service, ServiceConfig, Viewport};
use std::net::{IpAddr, SocketAddr};

/// Serve pixel matrices and clickable-region maps over HTTP.
#[derive(Parser, Debug)]
#[command(name = "rfpixels", version, about)]
struct Cli {
    /// Address to bind
    #[arg(long, env = "RFPIXELS_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Simultaneous fetch/decode/render operations
    #[arg(long, env = "RFPIXELS_MAX_CONCURRENCY", default_value_t = 4)]
    max_concurrency: usize,

    /// Largest accepted width * height
    #[arg(long, env = "RFPIXELS_MAX_PIXELS", default_value_t = 4_000_000)]
    max_pixels: u64,

    #[arg(long, default_value_t = 1280)]
    viewport_width: u32,

    #[arg(long, default_value_t = 720)]
    viewport_height: u32,

    /// Page navigation timeout in milliseconds
    #[arg(long, default_value_t = 15_000)]
    navigation_timeout_ms: u64,

    /// Quiet period after page load before capture, in milliseconds
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Upstream image fetch timeout in milliseconds
    #[arg(long, default_value_t = 15_000)]
    fetch_timeout_ms: u64,

    /// Launch Chrome with --no-sandbox (containers running as root)
    #[arg(long, env = "RFPIXELS_NO_SANDBOX")]
    no_sandbox: bool,
}

impl Cli {
    fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            max_concurrency: self.max_concurrency,
            max_pixels: self.max_pixels,
            viewport: Viewport { width: self.viewport_width, height: self.viewport_height },
            navigation_timeout_ms: self.navigation_timeout_ms,
            settle_ms: self.settle_ms,
            fetch_timeout_ms: self.fetch_timeout_ms,
            browser_sandbox: !self.no_sandbox,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let addr = SocketAddr::new(cli.bind, cli.port);
    let config = cli.into_config();

    let service = Service::new(&config)?;
    info!(
        "admission capacity {}, pixel ceiling {}, viewport {}x{}",
        config.max_concurrency, config.max_pixels, config.viewport.width, config.viewport.height
    );

    let handle = server::start(addr, service).await?;
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown().await?;
    Ok(())
}
