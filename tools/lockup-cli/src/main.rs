//! lockup: command-line front end for the lockup session facade.
//!
//! Runs read calls against the lockup contract and token contracts, and
//! drives the wallet sign-in from a terminal: `login` prints the wallet URL,
//! `complete-login` takes the URL the wallet redirected back to.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

use lockup_session::{
    AccountId, EnvironmentConfig, FileAuthStore, FileKeyStore, JsonRpcConnector, LockupApi,
    Navigator, Session, SessionBackends, SessionError,
};

/// Exit status for errors raised before any network traffic (bad input,
/// configuration, unbound method, not signed in).
const EXIT_USAGE: u8 = 2;

/// Lockup session client
#[derive(Parser, Debug)]
#[command(name = "lockup", version)]
#[command(about = "Query the lockup contract and manage the wallet session")]
struct Args {
    /// Named environment (development, production, betanet, local, ...).
    /// Defaults to $LOCKUP_ENV, then "development".
    #[arg(short, long)]
    env: Option<String>,

    /// TOML file whose fields override the environment preset
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lockup contract account. Defaults to $CONTRACT_NAME.
    #[arg(long)]
    contract: Option<String>,

    /// Directory holding keys and wallet auth data
    #[arg(long, default_value = ".lockup-credentials")]
    credentials: PathBuf,

    /// RPC request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the signed-in account, empty when anonymous
    Whoami,
    /// Print the wallet URL that grants access to the lockup contract
    Login,
    /// Finish a sign-in with the URL the wallet redirected to
    CompleteLogin {
        /// Callback URL carrying `account_id`, `public_key` and `all_keys`
        url: Url,
    },
    /// Forget the signed-in account and its key
    Logout,
    /// List tokens registered with the lockup contract
    Tokens,
    /// List vesting tasks, optionally for one token
    Tasks {
        /// Token contract to filter by
        #[arg(long)]
        token: Option<String>,
    },
    /// Print a token contract's metadata
    TokenMetadata {
        /// Token contract account
        token: String,
    },
    /// Print the lockup contract's balance on a token contract
    TokenBalance {
        /// Token contract account
        token: String,
    },
    /// Run a bound lockup method by name and print the raw result
    Invoke {
        /// Method name (must be a declared view or change method)
        method: String,
        /// JSON arguments
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

/// Prints the wallet URL instead of opening it.
struct StdoutNavigator;

impl Navigator for StdoutNavigator {
    fn navigate(&self, url: &Url) {
        println!("Open this URL to sign in:\n{}", url);
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}

/// Resolved configuration with `--contract` applied last.
fn build_config<F>(
    env: Option<&str>,
    file: Option<&Path>,
    contract: Option<&str>,
    var: F,
) -> Result<EnvironmentConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = EnvironmentConfig::resolve(env, file, var)?;
    if let Some(contract) = contract {
        config.contract_name = Some(contract.to_string());
    }
    Ok(config)
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SessionError>() {
        Some(e) if e.is_local() => ExitCode::from(EXIT_USAGE),
        _ => ExitCode::FAILURE,
    }
}

fn print_raw(bytes: &[u8]) {
    println!("{}", String::from_utf8_lossy(bytes));
}

fn parse_account(id: &str) -> Result<AccountId> {
    AccountId::new(id).with_context(|| format!("`{}` is not an account id", id))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(args.verbose) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = build_config(
        args.env.as_deref(),
        args.config.as_deref(),
        args.contract.as_deref(),
        |name| std::env::var(name).ok(),
    )?;
    debug!(?config, "Resolved configuration");

    let network = config.network_id.clone().unwrap_or_default();
    let backends = SessionBackends::new(
        Arc::new(JsonRpcConnector::new().with_timeout(Duration::from_secs(args.timeout))),
        Arc::new(FileKeyStore::new(args.credentials.clone())),
        Arc::new(FileAuthStore::new(
            args.credentials.join(network).join("wallet_auth.json"),
        )),
        Arc::new(StdoutNavigator),
    );

    let mut session = Session::initialize(&config, backends)
        .await
        .context("failed to initialize session")?;

    match args.command {
        Command::Whoami => println!("{}", session.account_id()),
        Command::Login => session.login().await?,
        Command::CompleteLogin { url } => {
            let identity = session.complete_login(&url).await?;
            if identity.is_authenticated() {
                println!("Signed in as {}", identity.account_id());
            } else {
                println!("No account granted in callback URL");
            }
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        Command::Tokens => {
            for token in session.contract().get_token_list().await? {
                println!("{}", token);
            }
        }
        Command::Tasks { token } => {
            let tasks = match token {
                Some(token) => {
                    session
                        .contract()
                        .get_tasks_by_token_id(&parse_account(&token)?)
                        .await?
                }
                None => session.contract().get_tasks().await?,
            };
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        Command::TokenMetadata { token } => {
            let metadata = session.resolve_token_metadata(&parse_account(&token)?).await?;
            print_raw(metadata.raw());
        }
        Command::TokenBalance { token } => {
            let balance = session.resolve_token_balance(&parse_account(&token)?).await?;
            print_raw(balance.raw());
        }
        Command::Invoke { method, args } => {
            let args: serde_json::Value = serde_json::from_str(&args)
                .map_err(|e| SessionError::InvalidArguments(format!("--args: {}", e)))?;
            let result = session.contract().handle().invoke(&method, args).await?;
            print_raw(&result);
        }
    }

    Ok(())
}
