use anyhow::{Context as _, Result};
use clap::Parser;
use geoapi::{Context, ContextOptions, GeoClient};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// geoapi - signed requests against the geospatial web service APIs
///
/// Credentials come from flags or the environment: either an API key
/// (GEOAPI_KEY) or an enterprise client ID and base64url secret
/// (GEOAPI_CLIENT_ID, GEOAPI_CLIENT_SECRET).
///
/// Examples:
///   geoapi get /maps/api/geocode/json -p address=Sydney
///   geoapi sign /maps/api/geocode/json -p address=Sydney
#[derive(Parser, Debug)]
#[command(author, version = env!("GEOAPI_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key (must start with "AIza")
    #[arg(long, env = "GEOAPI_KEY", global = true, hide_env_values = true)]
    key: Option<String>,

    /// Enterprise client ID
    #[arg(long, env = "GEOAPI_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Enterprise client secret, base64url encoded
    #[arg(long, env = "GEOAPI_CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    /// Combined connect and read timeout, in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_seconds, global = true)]
    timeout: Option<Duration>,

    /// Connect timeout, in seconds (requires --read-timeout)
    #[arg(long, value_name = "SECS", value_parser = parse_seconds, global = true)]
    connect_timeout: Option<Duration>,

    /// Read timeout, in seconds (requires --connect-timeout)
    #[arg(long, value_name = "SECS", value_parser = parse_seconds, global = true)]
    read_timeout: Option<Duration>,

    /// Time budget across retries of one request, in seconds [default: 60]
    #[arg(long, value_name = "SECS", value_parser = parse_seconds, global = true)]
    retry_timeout: Option<Duration>,

    /// API base URL (defaults to https://maps.googleapis.com)
    #[arg(long = "base-url", value_name = "URL", global = true)]
    base_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a signed GET request and print the JSON response
    Get(RequestArgs),

    /// Print the signed URL without sending it
    Sign(RequestArgs),
}

#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Endpoint path, e.g. /maps/api/geocode/json
    #[arg(value_name = "PATH")]
    path: String,

    /// Query parameter, repeatable
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl RequestArgs {
    fn params(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }
}

impl Cli {
    fn context_options(&self) -> ContextOptions {
        ContextOptions {
            key: self.key.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            retry_timeout: self.retry_timeout,
        }
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid duration '{}': {}", s, e))
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("'{}' is not in NAME=VALUE form", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let ctx = Context::new(cli.context_options()).context("Failed to set up credentials")?;
    let client = GeoClient::with_base_url(ctx, cli.base_url.clone())?;

    match &cli.command {
        Commands::Get(args) => {
            let cancel = CancellationToken::new();
            tokio::spawn({
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                }
            });

            let body = match client.get_with_cancel(&args.path, &args.params(), &cancel).await {
                Ok(body) => body,
                Err(e) => {
                    let context = match e.status() {
                        Some(status) => format!("Request to {} failed (status {})", args.path, status),
                        None => format!("Request to {} failed", args.path),
                    };
                    return Err(anyhow::Error::new(e).context(context));
                }
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Commands::Sign(args) => {
            println!("{}", client.signed_url(&args.path, &args.params())?);
        }
    }
    Ok(())
}
