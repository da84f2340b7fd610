use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "custody-cli")]
#[command(about = "Operator CLI for the credential custody service", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CUSTODY_URL", default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, env = "CUSTODY_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service health and pending updates
    Health,
    /// Wallet management
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// Status list management
    #[command(subcommand)]
    List(ListCommand),
    /// Credential lifecycle
    #[command(subcommand)]
    Credential(CredentialCommand),
    /// Finish every pending status list update
    Reconcile,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Generate a custodial wallet
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Protect the key with a custom password instead of the master password
        #[arg(long)]
        password: Option<String>,
    },
    /// Import an existing private key
    Import {
        private_key: String,
        name: String,
    },
    /// List wallets
    Ls {
        #[arg(long)]
        all: bool,
    },
    /// Show one wallet with balance and issuer role
    Show { address: String },
    /// Grant the issuer role (admin signed)
    Grant { address: String },
    /// Deactivate a wallet
    Deactivate { address: String },
}

#[derive(Subcommand)]
enum ListCommand {
    /// Create a status list
    Create {
        id: String,
        #[arg(long)]
        issuer: String,
        #[arg(long)]
        wallet: String,
        #[arg(long, default_value = "revocation")]
        purpose: String,
        #[arg(long)]
        uri: Option<String>,
    },
    /// List metadata
    Show { id: String },
    /// Check one index
    Check { id: String, index: u64 },
    /// Publish under a new URI
    Move { id: String, uri: String },
}

#[derive(Subcommand)]
enum CredentialCommand {
    /// Issue from a JSON request file
    Issue { file: std::path::PathBuf },
    Show { id: String },
    Revoke { id: String },
    Restore { id: String },
    /// Verify a token
    Verify { token: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let base = cli.url.trim_end_matches('/').to_string();
    let api = Api { client, base };

    match cli.command {
        Commands::Health => api.send(Method::GET, "/health", None).await?,
        Commands::Reconcile => api.send(Method::POST, "/reconcile", None).await?,
        Commands::Wallet(cmd) => match cmd {
            WalletCommand::Create {
                name,
                description,
                password,
            } => {
                let body = json!({ "name": name, "description": description, "password": password });
                api.send(Method::POST, "/wallets", Some(body)).await?
            }
            WalletCommand::Import { private_key, name } => {
                let body = json!({ "privateKey": private_key, "name": name });
                api.send(Method::POST, "/wallets/import", Some(body)).await?
            }
            WalletCommand::Ls { all } => {
                let path = format!("/wallets?includeInactive={}", all);
                api.send(Method::GET, &path, None).await?
            }
            WalletCommand::Show { address } => {
                api.send(Method::GET, &format!("/wallets/{}", address), None).await?;
                api.send(Method::GET, &format!("/wallets/{}/balance", address), None)
                    .await?;
                api.send(Method::GET, &format!("/wallets/{}/issuer-role", address), None)
                    .await?
            }
            WalletCommand::Grant { address } => {
                api.send(Method::POST, &format!("/wallets/{}/issuer-role", address), None)
                    .await?
            }
            WalletCommand::Deactivate { address } => {
                api.send(Method::DELETE, &format!("/wallets/{}", address), None)
                    .await?
            }
        },
        Commands::List(cmd) => match cmd {
            ListCommand::Create {
                id,
                issuer,
                wallet,
                purpose,
                uri,
            } => {
                let body = json!({
                    "statusListId": id,
                    "issuer": issuer,
                    "walletAddress": wallet,
                    "purpose": purpose,
                    "uri": uri,
                });
                api.send(Method::POST, "/status-lists", Some(body)).await?
            }
            ListCommand::Show { id } => {
                api.send(Method::GET, &format!("/status-lists/{}", id), None).await?
            }
            ListCommand::Check { id, index } => {
                let path = format!("/status-lists/{}/entries/{}", id, index);
                api.send(Method::GET, &path, None).await?
            }
            ListCommand::Move { id, uri } => {
                let path = format!("/status-lists/{}/uri", id);
                api.send(Method::PUT, &path, Some(json!({ "uri": uri }))).await?
            }
        },
        Commands::Credential(cmd) => match cmd {
            CredentialCommand::Issue { file } => {
                let body: Value = serde_json::from_str(&std::fs::read_to_string(file)?)?;
                api.send(Method::POST, "/credentials", Some(body)).await?
            }
            CredentialCommand::Show { id } => {
                api.send(Method::GET, &format!("/credentials/{}", id), None).await?;
                api.send(Method::GET, &format!("/credentials/{}/anchor", id), None)
                    .await?
            }
            CredentialCommand::Revoke { id } => {
                let path = format!("/credentials/{}/revoke", id);
                api.send(Method::POST, &path, Some(json!({}))).await?
            }
            CredentialCommand::Restore { id } => {
                let path = format!("/credentials/{}/restore", id);
                api.send(Method::POST, &path, Some(json!({}))).await?
            }
            CredentialCommand::Verify { token } => {
                let body = json!({ "token": token });
                api.send(Method::POST, "/credentials/verify", Some(body)).await?
            }
        },
    }

    Ok(())
}

struct Api {
    client: reqwest::Client,
    base: String,
}

impl Api {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut request = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        print_response(request.send().await?).await
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: custody API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
