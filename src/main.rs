use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zcrm_oauth::{
    Error, RawOptions, TokenRequest, capture_grant_token, exchange, resolve, token_url,
    write_result,
};

/// Generate and refresh OAuth2 tokens for the Zoho CRM API.
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(after_help = "The options id, secret and redirect are required, \
    from the flags or from a --file that supplies them on its own.")]
struct Args {
    /// Client ID of the registered application
    #[arg(long, value_name = "id")]
    id: Option<String>,

    /// Client secret of the registered application
    #[arg(long, value_name = "secret")]
    secret: Option<String>,

    /// Registered redirect URL; must point at localhost to generate a grant token
    #[arg(long, value_name = "redirect")]
    redirect: Option<String>,

    /// Grant token; when absent one is captured through the local redirect
    #[arg(long, value_name = "grant_token")]
    code: Option<String>,

    /// Refresh token used to mint a new access token
    #[arg(long, value_name = "refresh_token")]
    refresh: Option<String>,

    /// Comma-separated scope list [default: ZohoCRM.modules.ALL]
    #[arg(long, value_name = "scopes")]
    scope: Option<String>,

    /// Accounts-server location suffix [default: eu]
    #[arg(short = 'l', long, value_name = "location")]
    location: Option<String>,

    /// Output file name [default: out-<date>T<time>.json]
    #[arg(short = 'o', long, value_name = "output")]
    output: Option<String>,

    /// JSON file supplying any of the other options
    #[arg(short = 'f', long, value_name = "file")]
    file: Option<PathBuf>,

    /// Callback port used when the redirect URL leaves it out [default: 8000]
    #[arg(short = 'p', long, value_name = "port")]
    port: Option<u16>,

    /// Give up on the grant capture after this many seconds instead of waiting forever
    #[arg(long, value_name = "seconds")]
    timeout: Option<u64>,
}

impl Args {
    fn raw_options(&self) -> RawOptions {
        RawOptions {
            id: self.id.clone(),
            secret: self.secret.clone(),
            redirect: self.redirect.clone(),
            code: self.code.clone(),
            refresh: self.refresh.clone(),
            scope: self.scope.clone(),
            location: self.location.clone(),
            output: self.output.clone(),
            port: self.port,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(err) = run(args).await {
        eprintln!("Error: {err}");
        if matches!(err, Error::Configuration(_)) {
            eprintln!("\nRun with --help to see all options.");
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> zcrm_oauth::Result<()> {
    let timeout = args.timeout.map(Duration::from_secs);
    let options = resolve(args.raw_options(), args.file.as_deref())?;
    tracing::debug!(
        location = %options.location,
        output = %options.output.display(),
        "options resolved"
    );

    // A refresh token wins over a grant token; capture only as a last resort.
    let request = if let Some(refresh_token) = &options.refresh_token {
        TokenRequest::refresh_token(&options, refresh_token.clone())
    } else if let Some(grant_token) = &options.grant_token {
        TokenRequest::authorization_code(&options, grant_token.clone())
    } else {
        let grant_token = capture_grant_token(&options, timeout).await?;
        TokenRequest::authorization_code(&options, grant_token)
    };

    let body = exchange(&request, &token_url(&options.location)).await?;
    let formatted = write_result(&body, &options.output)?;

    println!("{formatted}");
    eprintln!("\nResult successfully exported to {}.", options.output.display());
    Ok(())
}
