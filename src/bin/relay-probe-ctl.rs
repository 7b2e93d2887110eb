use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-probe-ctl")]
#[command(about = "Query a running relay-probe sidecar's management listener", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9100")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the last health cycle and outstanding probes
    Status,
    /// Run one probe now and report the result
    Healthz,
    /// Check that the process is up
    Livez,
    /// Dump Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let healthy = match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", base)).send().await?;
            print_json(res).await?
        }
        Commands::Healthz => {
            let res = client.get(format!("{}/healthz", base)).send().await?;
            print_text(res).await?
        }
        Commands::Livez => {
            let res = client.get(format!("{}/livez", base)).send().await?;
            print_text(res).await?
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            print_text(res).await?
        }
    };

    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if status.is_success() {
        print!("{}", text);
    } else {
        eprintln!("Error: management API returned status {}", status);
        eprint!("{}", text);
    }
    Ok(status.is_success())
}

async fn print_json(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: management API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(false);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(true)
}
