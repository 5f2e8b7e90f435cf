use std::path::PathBuf;
use std::time::{Duration, Instant};

use backstop_core::capped;
use backstop_gate::Gate;
use backstop_web::{Client, Request, RequestError, USER_AGENT_VALUE};
use clap::{Args, Parser, Subcommand};
use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderValue, Method};

mod config;

use config::BackstopConfig;

#[derive(Debug, Parser)]
#[command(name = "backstop", about = "Rate-limited greeting server and retrying client")]
struct Cli {
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the rate-limited gate until Ctrl-C.
    Serve(ServeArgs),
    /// Call a gate, backing off while throttled.
    Call(CallArgs),
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long = "window-ms")]
    window_ms: Option<u64>,
    #[arg(long)]
    capacity: Option<usize>,
    #[arg(long)]
    greeting: Option<String>,
}

#[derive(Debug, Args)]
struct CallArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long, default_value = "GET")]
    method: String,
    /// Request body to send with each call.
    #[arg(long)]
    data: Option<String>,
    #[arg(long, default_value_t = 1)]
    count: u32,
    #[arg(long = "interval-ms", default_value_t = 0)]
    interval_ms: u64,
    /// Give up after this many throttled retries. Unlimited when omitted.
    #[arg(long = "max-retries")]
    max_retries: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Call(args) => call(args).await,
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BackstopConfig, String> {
    match path {
        Some(path) => BackstopConfig::load_or_create(path),
        None => Ok(BackstopConfig::default()),
    }
}

async fn serve(args: ServeArgs) -> Result<(), String> {
    let mut gate_config = load_config(args.config.as_ref())?.gate;
    if let Some(host) = args.host {
        gate_config.listen.host = host;
    }
    if let Some(port) = args.port {
        gate_config.listen.port = port;
    }
    if let Some(window_ms) = args.window_ms {
        gate_config.limiter.window_size_ms = window_ms;
    }
    if let Some(capacity) = args.capacity {
        gate_config.limiter.capacity = capacity;
    }
    if let Some(greeting) = args.greeting {
        gate_config.greeting = greeting;
    }

    let running = Gate::new(gate_config)
        .start()
        .await
        .map_err(|err| err.to_string())?;
    println!("listening on http://{}/", running.local_addr());

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| err.to_string())?;
    running.stop().await.map_err(|err| err.to_string())
}

async fn call(args: CallArgs) -> Result<(), String> {
    let mut client_config = load_config(args.config.as_ref())?.client;
    if let Some(url) = args.url {
        client_config.url = url;
    }
    let client = Client::new(client_config).map_err(|err| err.to_string())?;
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .map_err(|err| format!("invalid method {}: {err}", args.method))?;
    let mut builder = Request::builder(client.uri().clone())
        .method(method)
        .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    if let Some(data) = args.data {
        builder = builder
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .body(data.into_bytes());
    }
    let template = builder.build();

    for call in 0..args.count {
        if call > 0 && args.interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }

        let started = Instant::now();
        let request = template.clone();
        let result = match args.max_retries {
            Some(max_retries) => {
                client
                    .request_with(request, capped(max_retries, RequestError::is_throttled))
                    .await
            }
            None => client.request(request).await,
        };
        let response = result.map_err(|err| err.to_string())?;
        println!(
            "#{}: {} ({} ms)",
            call + 1,
            String::from_utf8_lossy(&response.body),
            started.elapsed().as_millis()
        );
    }

    Ok(())
}
