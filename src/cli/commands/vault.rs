use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_VAULT_URL: &str = "vault-url";
pub const ARG_VAULT_ROLE_ID: &str = "vault-role-id";
pub const ARG_VAULT_SECRET_ID: &str = "vault-secret-id";
pub const ARG_VAULT_WRAPPED_TOKEN: &str = "vault-wrapped-token";
pub const ARG_VAULT_DB_ROLE: &str = "vault-db-role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub url: String,
    pub role_id: String,
    pub secret_id: Option<String>,
    pub wrapped_token: Option<String>,
    pub db_role: String,
}

impl Options {
    /// Vault options, or `None` when no Vault URL was given.
    ///
    /// # Errors
    /// Returns an error if the role id or a secret is missing while a Vault URL is set.
    pub fn parse(matches: &ArgMatches) -> Result<Option<Self>> {
        let Some(url) = matches.get_one::<String>(ARG_VAULT_URL).cloned() else {
            return Ok(None);
        };

        let role_id = matches
            .get_one::<String>(ARG_VAULT_ROLE_ID)
            .cloned()
            .ok_or_else(|| anyhow!("missing required argument: --{ARG_VAULT_ROLE_ID}"))?;
        let secret_id = matches.get_one::<String>(ARG_VAULT_SECRET_ID).cloned();
        let wrapped_token = matches.get_one::<String>(ARG_VAULT_WRAPPED_TOKEN).cloned();

        if secret_id.is_none() && wrapped_token.is_none() {
            return Err(anyhow!(
                "missing required argument: --{ARG_VAULT_SECRET_ID} or --{ARG_VAULT_WRAPPED_TOKEN}"
            ));
        }

        let db_role = matches
            .get_one::<String>(ARG_VAULT_DB_ROLE)
            .cloned()
            .unwrap_or_else(|| "enroll".to_string());

        Ok(Some(Self {
            url,
            role_id,
            secret_id,
            wrapped_token,
            db_role,
        }))
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VAULT_URL)
                .long(ARG_VAULT_URL)
                .help("Vault approle login URL, example: https://vault.tld:8200/v1/auth/<approle>/login")
                .long_help("Vault approle login URL. When set, database credentials are requested from Vault and injected into the DSN.")
                .env("ENROLL_VAULT_URL"),
        )
        .arg(
            Arg::new(ARG_VAULT_ROLE_ID)
                .long(ARG_VAULT_ROLE_ID)
                .help("Vault role id")
                .env("ENROLL_VAULT_ROLE_ID")
                .requires(ARG_VAULT_URL),
        )
        .arg(
            Arg::new(ARG_VAULT_SECRET_ID)
                .long(ARG_VAULT_SECRET_ID)
                .help("Vault secret id")
                .env("ENROLL_VAULT_SECRET_ID")
                .conflicts_with(ARG_VAULT_WRAPPED_TOKEN),
        )
        .arg(
            Arg::new(ARG_VAULT_WRAPPED_TOKEN)
                .long(ARG_VAULT_WRAPPED_TOKEN)
                .help("Vault wrapped token")
                .env("ENROLL_VAULT_WRAPPED_TOKEN"),
        )
        .arg(
            Arg::new(ARG_VAULT_DB_ROLE)
                .long(ARG_VAULT_DB_ROLE)
                .help("Vault database secrets engine role")
                .env("ENROLL_VAULT_DB_ROLE")
                .default_value("enroll"),
        )
}
