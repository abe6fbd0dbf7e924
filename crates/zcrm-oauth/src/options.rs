//! Option resolution: command-line flags merged with an optional JSON
//! options file, validated and filled with defaults.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Scope requested when none is given.
pub const DEFAULT_SCOPE: &str = "ZohoCRM.modules.ALL";
/// Accounts-server location suffix used when none is given.
pub const DEFAULT_LOCATION: &str = "eu";
/// Callback port used when neither the options nor the redirect URL name one.
pub const DEFAULT_PORT: u16 = 8000;

/// Options as they arrive from one source, command line or options file.
///
/// Field names match the long flag names, which is also the key format of
/// the `--file` JSON object, so a single struct covers both sources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOptions {
    pub id: Option<String>,
    pub secret: Option<String>,
    pub redirect: Option<String>,
    pub code: Option<String>,
    pub refresh: Option<String>,
    pub scope: Option<String>,
    pub location: Option<String>,
    pub output: Option<String>,
    pub port: Option<u16>,
}

impl RawOptions {
    /// Merge `self` over `fallback`, field by field. Used to lay
    /// file-sourced options over the command line.
    fn or(self, fallback: RawOptions) -> RawOptions {
        RawOptions {
            id: self.id.or(fallback.id),
            secret: self.secret.or(fallback.secret),
            redirect: self.redirect.or(fallback.redirect),
            code: self.code.or(fallback.code),
            refresh: self.refresh.or(fallback.refresh),
            scope: self.scope.or(fallback.scope),
            location: self.location.or(fallback.location),
            output: self.output.or(fallback.output),
            port: self.port.or(fallback.port),
        }
    }
}

/// Options after validation, merging and defaulting. Built once at startup
/// and handed by reference to every later stage.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub location: String,
    pub output: PathBuf,
    pub grant_token: Option<String>,
    pub refresh_token: Option<String>,
    pub port: u16,
}

/// Merge command-line options with the optional options file and validate
/// the result.
///
/// When a file is given it must satisfy the required options on its own,
/// and its fields take precedence over the command line.
pub fn resolve(cli: RawOptions, file: Option<&Path>) -> Result<ResolvedOptions> {
    let file_options = file.map(read_options_file).transpose()?;
    let source = file_options.clone().unwrap_or_else(|| cli.clone());

    let (client_id, client_secret, redirect_uri) =
        match (&source.id, &source.secret, &source.redirect) {
            (Some(id), Some(secret), Some(redirect)) => {
                (id.clone(), secret.clone(), redirect.clone())
            }
            _ => {
                return Err(Error::Configuration(format!(
                    "missing required options: {}",
                    missing_required(&source).join(", ")
                )));
            }
        };

    // Without a ready-made grant token the redirect has to land on this
    // machine, so anything but localhost cannot work.
    if source.code.is_none() && !is_localhost(&redirect_uri) {
        return Err(Error::Configuration(
            "the redirect must point at \"localhost\" to generate a grant token".into(),
        ));
    }

    let merged = match file_options {
        Some(from_file) => from_file.or(cli),
        None => cli,
    };

    Ok(ResolvedOptions {
        client_id,
        client_secret,
        redirect_uri,
        scope: normalize_scope(merged.scope.as_deref().unwrap_or(DEFAULT_SCOPE)),
        location: merged.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        output: merged
            .output
            .map(PathBuf::from)
            .unwrap_or_else(|| generate_output_name(Local::now())),
        grant_token: merged.code,
        refresh_token: merged.refresh,
        port: merged.port.unwrap_or(DEFAULT_PORT),
    })
}

/// Names of the required options absent from `options`, in flag order.
fn missing_required(options: &RawOptions) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if options.id.is_none() {
        missing.push("id");
    }
    if options.secret.is_none() {
        missing.push("secret");
    }
    if options.redirect.is_none() {
        missing.push("redirect");
    }
    missing
}

/// Whether the redirect names `localhost` as its host. Anything that does
/// not parse as a URL counts as non-local.
fn is_localhost(redirect: &str) -> bool {
    Url::parse(redirect)
        .ok()
        .and_then(|url| url.host_str().map(|host| host == "localhost"))
        .unwrap_or(false)
}

/// Trim each entry of a comma-separated scope list and rejoin. Applying
/// this twice yields the same string.
pub fn normalize_scope(scope: &str) -> String {
    scope.split(',').map(str::trim).collect::<Vec<_>>().join(",")
}

/// Output file name for a run started at `now`. Sortable and unique per
/// second, with the time colons swapped out so the name stays portable.
fn generate_output_name(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(now.format("out-%Y-%m-%dT%H-%M-%S.json").to_string())
}

fn read_options_file(path: &Path) -> Result<RawOptions> {
    let contents = fs::read_to_string(path).map_err(|err| Error::File {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    serde_json::from_str(&contents).map_err(|err| Error::File {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
