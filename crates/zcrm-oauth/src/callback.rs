//! Interactive grant capture: a one-shot localhost listener that waits for
//! the accounts server to redirect the browser back with a grant token.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use url::Url;

use crate::error::{Error, Result};
use crate::options::ResolvedOptions;

/// Query parameters the accounts server attaches to the redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Lifecycle of a grant capture.
///
/// A capture starts `Idle`, becomes `Listening` once the callback port is
/// bound, settles as `CodeReceived` or `Failed` on the first redirect that
/// carries a `code` or `error` parameter, and ends `Stopped` when the
/// listener socket is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Listening,
    CodeReceived(String),
    Failed(String),
    Stopped,
}

impl CapturePhase {
    /// Advance the phase with the query parameters of one inbound request.
    ///
    /// Only a listening capture reacts. A redirect carrying neither `code`
    /// nor `error` leaves it listening, and a settled capture ignores every
    /// later request.
    pub fn on_request(self, query: &CallbackQuery) -> CapturePhase {
        match self {
            CapturePhase::Listening => {
                if let Some(error) = &query.error {
                    CapturePhase::Failed(error.clone())
                } else if let Some(code) = &query.code {
                    CapturePhase::CodeReceived(code.clone())
                } else {
                    CapturePhase::Listening
                }
            }
            settled => settled,
        }
    }

    /// Whether a redirect has settled the capture, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, CapturePhase::CodeReceived(_) | CapturePhase::Failed(_))
    }
}

/// URL the user must open in a browser to approve the grant.
pub fn authorize_url(options: &ResolvedOptions) -> String {
    format!(
        "https://accounts.zoho.{}/oauth/v2/auth\
         ?scope={}\
         &client_id={}\
         &response_type=code\
         &access_type=offline\
         &redirect_uri={}",
        options.location,
        urlencoding::encode(&options.scope),
        urlencoding::encode(&options.client_id),
        urlencoding::encode(&options.redirect_uri),
    )
}

/// One-shot listener bound to the redirect's port.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
    path: String,
}

impl CallbackListener {
    /// Bind the callback port named by the redirect URL, falling back to
    /// the resolved `port` option when the URL leaves it out.
    pub async fn bind(options: &ResolvedOptions) -> Result<Self> {
        let redirect = Url::parse(&options.redirect_uri).map_err(|err| {
            Error::Configuration(format!(
                "the redirect {} is not a valid URL: {err}",
                options.redirect_uri
            ))
        })?;
        let port = redirect.port().unwrap_or(options.port);
        let path = match redirect.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|err| {
            Error::Network(format!(
                "could not listen on 127.0.0.1:{port} for the redirect: {err}"
            ))
        })?;
        let addr = listener.local_addr().map_err(|err| {
            Error::Network(format!("callback listener address unavailable: {err}"))
        })?;
        tracing::debug!(%addr, %path, "callback listener bound");

        Ok(CallbackListener {
            listener,
            addr,
            path,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the first settling redirect, then tear the listener down.
    ///
    /// Waits indefinitely unless a `timeout` is given. Returns the captured
    /// grant token, or the accounts server's error text as a failure.
    pub async fn capture(self, timeout: Option<Duration>) -> Result<String> {
        let CallbackListener {
            listener,
            addr,
            path,
        } = self;

        let (settle_tx, mut settle_rx) = oneshot::channel::<CapturePhase>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        // Taken by the first settling request; later requests find it empty.
        let channels = Arc::new(Mutex::new(Some((settle_tx, shutdown_tx))));

        let handler = {
            let channels = channels.clone();
            move |Query(query): Query<CallbackQuery>| {
                let channels = channels.clone();
                async move {
                    let phase = CapturePhase::Listening.on_request(&query);
                    if phase.is_settled() {
                        if let Some((settle_tx, shutdown_tx)) = channels.lock().await.take() {
                            let _ = settle_tx.send(phase.clone());
                            let _ = shutdown_tx.send(());
                        }
                    }
                    result_page(&phase)
                }
            }
        };

        let app = Router::new().route(&path, get(handler));
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        let served = match timeout {
            Some(limit) => tokio::time::timeout(limit, server.into_future())
                .await
                .map_err(|_| {
                    Error::Network(format!("no redirect arrived within {limit:?}, giving up"))
                })?,
            None => server.await,
        };
        served.map_err(|err| Error::Network(format!("callback listener failed: {err}")))?;
        tracing::debug!(%addr, phase = ?CapturePhase::Stopped, "callback listener closed");

        match settle_rx.try_recv() {
            Ok(CapturePhase::CodeReceived(code)) => Ok(code),
            Ok(CapturePhase::Failed(error)) => Err(Error::Provider(error)),
            _ => Err(Error::Network(
                "the callback listener closed before a grant token arrived".into(),
            )),
        }
    }
}

/// Capture a grant token interactively.
///
/// Binds the local listener, prints the authorization URL for the user to
/// open in a browser, and blocks until the accounts server redirects back.
pub async fn capture_grant_token(
    options: &ResolvedOptions,
    timeout: Option<Duration>,
) -> Result<String> {
    let listener = CallbackListener::bind(options).await?;
    let auth_url = authorize_url(options);

    eprintln!("\n=================================================");
    eprintln!("Zoho CRM Authorization Required");
    eprintln!("=================================================");
    eprintln!("\nPlease visit the following URL to authorize the application:\n");
    eprintln!("{auth_url}\n");
    eprintln!("Waiting for the redirect on http://{}...", listener.local_addr());
    eprintln!("=================================================\n");

    listener.capture(timeout).await
}

/// HTML shown in the browser for each capture outcome.
fn result_page(phase: &CapturePhase) -> Html<String> {
    match phase {
        CapturePhase::CodeReceived(_) => Html(
            "<html><body><h1>Authorization Successful!</h1>\
             <p>You can close this window and return to the terminal.</p></body></html>"
                .to_string(),
        ),
        CapturePhase::Failed(error) => Html(format!(
            "<html><body><h1>Authorization Failed</h1>\
             <p>Error: {error}</p>\
             <p>You can close this window.</p></body></html>"
        )),
        _ => Html(
            "<html><body><h1>Waiting for Authorization</h1>\
             <p>No grant token received yet.</p></body></html>"
                .to_string(),
        ),
    }
}
