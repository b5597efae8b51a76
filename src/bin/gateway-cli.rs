use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the session gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the liveness route
    Heartbeat,
    /// Show the session bound to a cookie (or a fresh one)
    Session {
        /// Raw `Cookie` header value, e.g. `Gateway Cookie=s:...`
        #[arg(short, long)]
        cookie: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Heartbeat => {
            let res = client.get(format!("{base}/heartbeat")).send().await?;
            let status = res.status();
            println!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""));
            if !status.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Session { cookie } => {
            let mut headers = HeaderMap::new();
            if let Some(cookie) = cookie {
                headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);
            }
            let res = client
                .get(format!("{base}/v1/session"))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    for cookie in res.headers().get_all(reqwest::header::SET_COOKIE) {
        println!("Set-Cookie: {}", cookie.to_str().unwrap_or("<binary>"));
    }
    if status.is_success() {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("Error: {}", status);
        println!("{}", res.text().await?);
    }
    Ok(())
}
