use crate::{cli::globals::GlobalArgs, vault};
use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

/// Get dynamic DB credentials for `role` from Vault and store them in `globals`
/// # Errors
/// Returns an error if the Vault request fails or the response is missing lease or credential fields.
#[instrument(skip(globals))]
pub async fn database_creds(globals: &mut GlobalArgs, role: &str) -> Result<()> {
    let db_creds = vault::endpoint_url(&globals.vault_url, &format!("/v1/database/creds/{role}"))?;

    let json_response = vault::send(
        vault::client()?
            .get(&db_creds)
            .header("X-Vault-Token", globals.vault_token.expose_secret()),
        &db_creds,
    )
    .await?;

    let field = |value: Option<&str>, name: &str| {
        value
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("Error parsing JSON response: no {name} found"))
    };

    globals.vault_db_lease_id = field(json_response["lease_id"].as_str(), "lease_id")?;
    globals.vault_db_lease_duration = json_response["lease_duration"]
        .as_u64()
        .ok_or_else(|| anyhow!("Error parsing JSON response: no lease_duration found"))?;
    globals.vault_db_username = field(json_response["data"]["username"].as_str(), "username")?;
    globals.vault_db_password = SecretString::from(field(
        json_response["data"]["password"].as_str(),
        "password",
    )?);

    Ok(())
}
