use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, LOCATION};
use reqwest::redirect::Policy;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "addhandler-cli")]
#[command(about = "Submit and inspect handlers on an addhandler server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key (only needed for `list` and `status`).
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and register a handler from a source file
    Submit {
        file: PathBuf,
        /// Prepend the handler prelude to the file
        #[arg(long)]
        with_prelude: bool,
    },
    /// List registered handlers and their sources
    List,
    /// Show server status
    Status,
    /// Call a registered route and print its response
    Call { path: String },
    /// Print the handler prelude
    Prelude,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().redirect(Policy::none()).build()?;

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    match cli.command {
        Commands::Submit { file, with_prelude } => {
            let mut program = std::fs::read_to_string(&file)?;
            if with_prelude {
                program = format!("{}\n{}", addhandler::PLUGIN_PRELUDE, program);
            }
            let res = client
                .post(format!("{}/addhandler", cli.url))
                .form(&[("program", program)])
                .send()
                .await?;
            let location = res
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            match location {
                Some(route) if res.status().is_redirection() => println!("{}{}", cli.url, route),
                _ => {
                    eprintln!("Error: submission returned status {}", res.status());
                    eprintln!("{}", res.text().await?);
                    std::process::exit(1);
                }
            }
        }
        Commands::List => {
            let res = client.get(format!("{}/admin/handlers", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Call { path } => {
            let res = client.get(format!("{}{}", cli.url, path)).send().await?;
            println!("{}", res.status());
            print!("{}", res.text().await?);
        }
        Commands::Prelude => print!("{}", addhandler::PLUGIN_PRELUDE),
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
