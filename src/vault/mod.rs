//! HashiCorp Vault client: `AppRole` login, database credentials and token renewal.

pub mod database;
pub mod renew;

use crate::{cli::globals::GlobalArgs, APP_USER_AGENT};
use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

/// Build `{scheme}://{host}:{port}{path}` from the configured login URL.
///
/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or uses an unsupported scheme.
#[instrument]
pub fn endpoint_url(url: &str, path: &str) -> Result<String> {
    let url = Url::parse(url)?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => return Err(anyhow!("Error parsing URL: unsupported scheme {}", scheme)),
        },
    };

    let endpoint_url = format!("{scheme}://{host}:{port}{path}");

    debug!("endpoint URL: {}", endpoint_url);

    Ok(endpoint_url)
}

fn client() -> Result<Client> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .context("Failed to build Vault HTTP client")
}

/// Send a request and return the JSON body, turning Vault `errors` into an error.
async fn send(request: RequestBuilder, url: &str) -> Result<Value> {
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let json_response: Value = response.json().await.unwrap_or_default();

        return Err(anyhow!(
            "{} - {}, {}",
            url,
            status,
            json_response["errors"][0].as_str().unwrap_or("")
        ));
    }

    Ok(response.json().await?)
}

/// Unwrap a wrapped Vault secret-id
/// Create wrapped token with:
/// vault write -wrap-ttl=300s -f auth/approle/role/enroll/secret-id
/// # Errors
/// Returns an error if the Vault request fails or the response has no `secret_id`.
#[instrument(skip(token))]
pub async fn unwrap(url: &str, token: &str) -> Result<String> {
    let unwrap_url = endpoint_url(url, "/v1/sys/wrapping/unwrap")?;

    let json_response = send(
        client()?
            .post(&unwrap_url)
            .header("X-Vault-Token", token),
        &unwrap_url,
    )
    .await?;

    json_response["data"]["secret_id"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no secret_id found"))
}

/// Login to Vault using `AppRole`, returns the client token and its lease duration
/// Create a secret ID with:
/// vault write -f auth/approle/role/enroll/secret-id
/// # Errors
/// Returns an error if the Vault request fails or the response has no `client_token`.
#[instrument(skip(sid))]
pub async fn approle_login(url: &str, sid: &str, rid: &str) -> Result<(String, u64)> {
    let login_payload = json!({
        "role_id": rid,
        "secret_id": sid
    });

    let json_response = send(client()?.post(url).json(&login_payload), url).await?;

    let token = json_response["auth"]["client_token"]
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing JSON response: no client_token found"))?;
    let lease_duration = json_response["auth"]["lease_duration"]
        .as_u64()
        .unwrap_or(1800);

    Ok((token.to_string(), lease_duration))
}

/// Renew the current token, returns the new lease duration
/// # Errors
/// Returns an error if the Vault request fails or the response has no `lease_duration`.
#[instrument(skip(globals))]
pub async fn renew_self(globals: &GlobalArgs) -> Result<u64> {
    let renew_url = endpoint_url(&globals.vault_url, "/v1/auth/token/renew-self")?;

    let json_response = send(
        client()?
            .post(&renew_url)
            .header("X-Vault-Token", globals.vault_token.expose_secret())
            .json(&json!({ "increment": 0 })),
        &renew_url,
    )
    .await?;

    json_response["auth"]["lease_duration"]
        .as_u64()
        .ok_or_else(|| anyhow!("Error parsing JSON response: no lease_duration found"))
}
