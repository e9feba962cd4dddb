use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "lookup-cli")]
#[command(about = "Query and manage an IP lookup proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Admin API key (admin commands only)
    #[arg(short, long, env = "IPLOOKUP_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up an IP address (defaults to your own)
    Query { ip: Option<String> },
    /// Check service health
    Health,
    /// Show version and uptime
    Status,
    /// Show cache occupancy
    Cache,
    /// Drop every cached lookup
    ClearCache,
    /// Show rate limiter occupancy
    Limiter,
    /// Run a cleanup sweep now
    Sweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut admin = HeaderMap::new();
    admin.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, headers) = match &cli.command {
        Commands::Query { ip } => {
            let path = match ip {
                Some(ip) => format!("/api/query?ip={ip}"),
                None => "/api/query".to_string(),
            };
            (Method::GET, path, HeaderMap::new())
        }
        Commands::Health => (Method::GET, "/health".to_string(), HeaderMap::new()),
        Commands::Status => (Method::GET, "/admin/status".to_string(), admin),
        Commands::Cache => (Method::GET, "/admin/cache".to_string(), admin),
        Commands::ClearCache => (Method::DELETE, "/admin/cache".to_string(), admin),
        Commands::Limiter => (Method::GET, "/admin/limiter".to_string(), admin),
        Commands::Sweep => (Method::POST, "/admin/sweep".to_string(), admin),
    };

    let res = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(cache_status) = res.headers().get("x-cache-status") {
        eprintln!("Cache: {}", cache_status.to_str().unwrap_or("?"));
    }
    if let Some(remaining) = res.headers().get("x-ratelimit-remaining") {
        eprintln!("Remaining quota: {}", remaining.to_str().unwrap_or("?"));
    }

    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
