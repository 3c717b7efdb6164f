//! idtoken-verify: verify an OpenID Connect ID token from the command line
//!
//! Reads the token from the first argument or stdin, verifies it with the
//! configuration from `IDTOKEN_*` environment variables (or the Google preset)
//! and prints the outcome as JSON. Uses a single-threaded tokio runtime
//! (compatible with core's !Send async traits).

use std::io::Read;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use idtoken_core::{IdTokenVerifier, VerificationError, VerifierConfig};

mod platform;

use platform::{ProcessEnv, ReqwestHttpClient, SystemClock};

const EXIT_VALID: u8 = 0;
const EXIT_REJECTED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

/// Verify an OpenID Connect ID token
#[derive(Parser, Debug)]
#[command(name = "idtoken-verify", version)]
struct Cli {
    /// Token to verify; read from stdin when omitted
    token: Option<String>,

    /// Use the Google Sign-In preset for this OAuth client ID instead of IDTOKEN_* variables
    #[arg(long, value_name = "CLIENT_ID")]
    google: Option<String>,

    /// Verify as of this Unix timestamp instead of the system clock
    #[arg(long, value_name = "SECS")]
    at: Option<u64>,

    /// Fetch keys on every verification instead of caching them
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.google {
        Some(client_id) => VerifierConfig::google(client_id.clone()),
        None => match VerifierConfig::from_env(&ProcessEnv) {
            Ok(config) => config,
            Err(e) => return fail_config(&e.to_string()),
        },
    };
    if cli.no_cache {
        config.key_cache.enabled = false;
    }

    let http = match ReqwestHttpClient::new() {
        Ok(http) => Rc::new(http),
        Err(e) => return fail_config(&format!("failed to build HTTP client: {}", e)),
    };

    let verifier = match IdTokenVerifier::new(config, http) {
        Ok(verifier) => verifier,
        Err(e) => return fail_config(&e.to_string()),
    };

    let token = match read_token(cli.token, std::io::stdin().lock()) {
        Ok(token) => token,
        Err(e) => return fail_config(&format!("failed to read token: {}", e)),
    };

    let result = match cli.at {
        Some(now) => verifier.verify(&token, now).await,
        None => verifier.verify_now(&token, &SystemClock).await,
    };

    let (body, code) = report(&result);
    println!("{}", body);
    ExitCode::from(code)
}

/// Token from the argument, or else everything on `input`, trimmed
fn read_token(arg: Option<String>, mut input: impl Read) -> std::io::Result<String> {
    let raw = match arg {
        Some(token) => token,
        None => {
            let mut buf = String::new();
            input.read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(raw.trim().to_string())
}

/// JSON body and exit code for a verification outcome
fn report<T: Serialize>(result: &Result<T, VerificationError>) -> (Value, u8) {
    match result {
        Ok(claims) => (json!({ "valid": true, "claims": claims }), EXIT_VALID),
        Err(e) => (
            json!({ "valid": false, "error": e.error_key(), "message": e.to_string() }),
            EXIT_REJECTED,
        ),
    }
}

fn config_report(message: &str) -> (Value, u8) {
    (
        json!({ "valid": false, "error": "configuration", "message": message }),
        EXIT_CONFIG,
    )
}

fn fail_config(message: &str) -> ExitCode {
    tracing::error!("{}", message);
    let (body, code) = config_report(message);
    println!("{}", body);
    ExitCode::from(code)
}
