use crate::{cli::globals::GlobalArgs, vault};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::{debug, error, instrument, warn};

const MAX_ATTEMPTS: u32 = 3;

/// Keep the Vault token alive in the background.
///
/// Renewal happens at 70-90% of the lease. After `MAX_ATTEMPTS` consecutive
/// failures a message is sent on `tx` so the server can shut down gracefully.
/// # Errors
/// Currently infallible; kept fallible for callers that chain setup steps.
#[instrument(skip(globals, tx))]
pub async fn try_renew(
    globals: &GlobalArgs,
    lease_duration: u64,
    tx: mpsc::UnboundedSender<()>,
) -> Result<()> {
    let globals = globals.clone();

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut jittered_lease_duration = jitter(&mut rng, lease_duration);

        loop {
            debug!(
                "Will renew token in {} seconds",
                jittered_lease_duration.as_secs()
            );

            sleep(jittered_lease_duration).await;

            for attempt in 1..=MAX_ATTEMPTS {
                if attempt > 1 {
                    let backoff_time = 2u64.pow(attempt - 1);
                    warn!("Backing off for {} seconds", backoff_time);
                    sleep(Duration::from_secs(backoff_time)).await;
                }

                match vault::renew_self(&globals).await {
                    Ok(lease_duration) => {
                        jittered_lease_duration = jitter(&mut rng, lease_duration);
                        break;
                    }
                    Err(e) => {
                        error!("Failed to renew token: {}", e);

                        if attempt == MAX_ATTEMPTS {
                            error!("Failed to renew token after {} attempts", MAX_ATTEMPTS);
                            let _ = tx.send(());
                            return;
                        }
                    }
                }
            }
        }
    });

    Ok(())
}

fn jitter(rng: &mut impl Rng, lease_duration: u64) -> Duration {
    let factor = rng.gen_range(70..90);
    Duration::from_secs(lease_duration * factor / 100)
}
