use crate::{
    api,
    cli::{commands::vault::Options as VaultOptions, globals::GlobalArgs},
    questions::QuestionsConfig,
    vault,
};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub questions: QuestionsConfig,
    pub vault: Option<VaultOptions>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if Vault login fails, DB credentials cannot be fetched, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();

    let dsn = match &args.vault {
        Some(options) => {
            let (globals, token_lease_duration) = vault_login(options).await?;

            // Zero means a non-expiring token, nothing to renew.
            if token_lease_duration > 0 {
                vault::renew::try_renew(&globals, token_lease_duration, tx.clone()).await?;
            }

            dsn_with_credentials(
                &args.dsn,
                &globals.vault_db_username,
                &globals.vault_db_password,
            )?
        }
        None => {
            info!("Vault not configured, using DSN credentials as given");
            args.dsn
        }
    };

    // Keep the sender alive for the server lifetime.
    let _tx = tx;

    api::new(args.port, dsn, args.questions, rx).await
}

/// Login and fetch database credentials, returns the state and the token lease duration.
async fn vault_login(options: &VaultOptions) -> Result<(GlobalArgs, u64)> {
    let mut globals = GlobalArgs::new(options.url.clone());

    // If vault wrapped token try to unwrap, otherwise use secret-id.
    let secret_id = match (&options.wrapped_token, &options.secret_id) {
        (Some(wrapped), _) => vault::unwrap(&globals.vault_url, wrapped).await?,
        (None, Some(secret_id)) => secret_id.clone(),
        (None, None) => return Err(anyhow!("Vault secret-id is required")),
    };

    let (token, lease_duration) =
        vault::approle_login(&globals.vault_url, &secret_id, &options.role_id)
            .await
            .context("Vault login failed")?;

    globals.set_token(SecretString::from(token));

    vault::database::database_creds(&mut globals, &options.db_role)
        .await
        .context("Could not get database username and password")?;

    debug!("Global args: {:?}", globals);

    Ok((globals, lease_duration))
}

fn dsn_with_credentials(dsn: &str, username: &str, password: &SecretString) -> Result<String> {
    let mut dsn = Url::parse(dsn).context("Invalid DSN")?;

    dsn.set_username(username)
        .map_err(|()| anyhow!("Error setting username"))?;

    dsn.set_password(Some(password.expose_secret()))
        .map_err(|()| anyhow!("Error setting password"))?;

    Ok(dsn.to_string())
}
