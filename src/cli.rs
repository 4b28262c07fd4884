use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

const DEFAULT_AUTH_COOKIE_NAME: &str = "libraryconnect_auth";

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(libraryconnect::config::AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::AuthKey) => return RunOutcome::Exit(run_auth_key()),
        Some(Command::HashPassword(ref args)) => {
            return RunOutcome::Exit(run_hash_password(args));
        }
        None => {}
    }

    let Some(data_dir) = cli.data_dir.as_ref() else {
        eprintln!("error: --data-dir is required unless using a subcommand");
        return RunOutcome::Exit(2);
    };
    if let Err(err) = std::fs::create_dir_all(data_dir) {
        eprintln!("error: failed to create data directory {}: {err}", data_dir.display());
        return RunOutcome::Exit(2);
    }
    let data_dir = match std::fs::canonicalize(data_dir) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("error: failed to resolve data directory: {err}");
            return RunOutcome::Exit(2);
        }
    };

    let auth = match resolve_auth_config(&cli) {
        Ok(auth) => auth,
        Err(err) => {
            eprintln!("error: {err}");
            return RunOutcome::Exit(2);
        }
    };

    RunOutcome::Serve(libraryconnect::config::AppConfig {
        data_dir,
        addr: cli.addr,
        app_name: cli.app_name,
        seed: cli.seed,
        auth,
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "libraryconnect",
    version,
    about = "Document portal with folder access control and trash approval"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "LIBRARYCONNECT_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "LIBRARYCONNECT_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,
    #[arg(long, default_value = "LibraryConnect")]
    app_name: String,
    #[arg(long, env = "LIBRARYCONNECT_SEED")]
    seed: Option<PathBuf>,
    #[arg(long, env = "LIBRARYCONNECT_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "LIBRARYCONNECT_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
    #[arg(long, env = "LIBRARYCONNECT_AUTH_COOKIE_NAME")]
    auth_cookie_name: Option<String>,
    #[arg(long, env = "LIBRARYCONNECT_AUTH_COOKIE_SECURE")]
    auth_cookie_secure: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a fresh session signing key.
    AuthKey,
    /// Print an argon2 hash for use in a seed file.
    HashPassword(HashPasswordArgs),
}

#[derive(Args, Debug)]
struct HashPasswordArgs {
    #[arg(long, env = "LIBRARYCONNECT_PASSWORD")]
    password: String,
}

fn run_auth_key() -> i32 {
    let secret = match libraryconnect::auth::generate_auth_key() {
        Ok(secret) => secret,
        Err(err) => {
            eprintln!("failed to generate auth key: {err}");
            return 1;
        }
    };
    println!("{secret}");
    0
}

fn run_hash_password(args: &HashPasswordArgs) -> i32 {
    if args.password.is_empty() {
        eprintln!("error: password cannot be empty");
        return 2;
    }
    match libraryconnect::users::hash_password(&args.password) {
        Ok(hash) => {
            println!("{hash}");
            0
        }
        Err(err) => {
            eprintln!("failed to hash password: {err}");
            1
        }
    }
}

fn resolve_auth_config(cli: &Cli) -> Result<libraryconnect::config::AuthConfig, String> {
    let auth_key = cli
        .auth_key
        .as_ref()
        .ok_or("--auth-key is required; generate one with `libraryconnect auth-key`")?
        .trim();
    if auth_key.is_empty() {
        return Err("auth key cannot be empty".to_string());
    }

    if let Some(name) = cli.auth_cookie_name.as_deref()
        && name.trim().is_empty()
    {
        return Err("auth cookie name cannot be empty".to_string());
    }

    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => parse_auth_token_ttl(raw)?,
        None => default_auth_token_ttl(),
    };
    let cookie_name = cli
        .auth_cookie_name
        .as_deref()
        .map(|name| name.trim().to_string())
        .unwrap_or_else(|| DEFAULT_AUTH_COOKIE_NAME.to_string());

    Ok(libraryconnect::config::AuthConfig {
        key: auth_key.to_string(),
        token_ttl,
        cookie_name,
        cookie_secure: cli.auth_cookie_secure,
    })
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(14)
}

fn parse_auth_token_ttl(raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("auth token ttl cannot be empty".to_string());
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"))?;

    if amount <= 0 {
        return Err("auth token ttl must be greater than 0".to_string());
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(format!(
            "invalid auth token ttl '{value}'; expected <number>[s|m|h|d]"
        )),
    }
}
