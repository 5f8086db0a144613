use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "controlctl")]
#[command(about = "Command-line client for the VPN daemon control server", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CONTROLCTL_URL", default_value = "http://localhost:8000")]
    url: String,

    /// Basic-Auth username.
    #[arg(long, env = "CONTROLCTL_USERNAME", requires = "password", conflicts_with = "api_key")]
    username: Option<String>,

    /// Basic-Auth password.
    #[arg(long, env = "CONTROLCTL_PASSWORD", requires = "username")]
    password: Option<String>,

    /// API key sent as X-API-Key.
    #[arg(long, env = "CONTROLCTL_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the daemon version
    Version,
    /// Show the status of a loop
    Status { target: Target },
    /// Start a loop
    Start { target: Target },
    /// Stop a loop
    Stop { target: Target },
    /// Restart a loop
    Restart { target: Target },
    /// Show the public IP data
    PublicIp,
    /// Show the forwarded port
    PortForwarded,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Vpn,
    Dns,
    Updater,
}

impl Target {
    fn status_path(self) -> &'static str {
        match self {
            Target::Vpn => "/v1/vpn/status",
            Target::Dns => "/v1/dns/status",
            Target::Updater => "/v1/updater/status",
        }
    }

    fn restart_path(self) -> &'static str {
        match self {
            Target::Vpn => "/openvpn/actions/restart",
            Target::Dns => "/unbound/actions/restart",
            Target::Updater => "/updater/restart",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let url = cli.url.trim_end_matches('/');

    let request = |method: Method, path: &str| -> RequestBuilder {
        let builder = client.request(method, format!("{}{}", url, path));
        if let Some(key) = &cli.api_key {
            builder.header("x-api-key", key)
        } else if let Some(username) = &cli.username {
            builder.basic_auth(username, cli.password.as_deref())
        } else {
            builder
        }
    };

    let res = match cli.command {
        Commands::Version => request(Method::GET, "/v1/version").send().await?,
        Commands::Status { target } => request(Method::GET, target.status_path()).send().await?,
        Commands::Start { target } => {
            request(Method::PUT, target.status_path())
                .json(&json!({ "status": "running" }))
                .send()
                .await?
        }
        Commands::Stop { target } => {
            request(Method::PUT, target.status_path())
                .json(&json!({ "status": "stopped" }))
                .send()
                .await?
        }
        Commands::Restart { target } => request(Method::GET, target.restart_path()).send().await?,
        Commands::PublicIp => request(Method::GET, "/v1/publicip/ip").send().await?,
        Commands::PortForwarded => {
            request(Method::GET, "/v1/openvpn/portforwarded")
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: control server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
