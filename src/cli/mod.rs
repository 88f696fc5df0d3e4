//! CLI module for ticktick-mcp: subcommands plus the local OAuth callback.

pub mod commands;

pub use commands::Cli;

use eyre::{Context, Result, eyre};
use ticktick_mcp::api::client::OAUTH_STATE;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use url::Url;

const SUCCESS_PAGE: &str = "<html><body><h2>TickTick authorization complete</h2>\
    <p>You can close this window.</p></body></html>";

/// Redirect URI registered for the local callback listener.
pub fn callback_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}/callback", port)
}

/// Pull the `code` out of an HTTP request line such as
/// `GET /callback?code=abc&state=x HTTP/1.1`.
pub fn code_from_request_line(line: &str) -> Result<String> {
    let target = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| eyre!("Malformed callback request: {}", line.trim()))?;
    let url = Url::parse(&format!("http://127.0.0.1{}", target)).context("Invalid callback URL")?;

    let mut code = None;
    let mut error = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(eyre!("Authorization denied: {}", error));
    }
    if state.as_deref().is_some_and(|s| s != OAUTH_STATE) {
        return Err(eyre!("Callback state does not match this authorization request"));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| eyre!("Callback did not include an authorization code"))
}

/// Accept connections on `127.0.0.1:port` until one carries the OAuth code.
pub async fn wait_for_callback(port: u16) -> Result<String> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to listen on port {}", port))?;
    log::info!("Waiting for OAuth callback on port {}", port);

    loop {
        let (mut stream, peer) = listener.accept().await.context("Failed to accept callback")?;
        let (reader, mut writer) = stream.split();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await?;

        if !line.contains("/callback") {
            log::debug!("Ignoring request from {}: {}", peer, line.trim());
            writer.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n").await?;
            continue;
        }

        let result = code_from_request_line(&line);
        let body = match &result {
            Ok(_) => SUCCESS_PAGE.to_string(),
            Err(e) => format!("<html><body><h2>Authorization failed</h2><p>{}</p></body></html>", e),
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        writer.write_all(response.as_bytes()).await?;
        return result;
    }
}
