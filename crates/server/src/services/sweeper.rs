//! Background expiry of priced quotes whose validity has passed.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::db::QuoteRepository;

/// Spawn the sweep loop. It runs once immediately, then every `period`, and
/// exits when `shutdown` flips to `true` or its sender is dropped.
pub fn spawn(pool: PgPool, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "Starting quote expiry sweeper");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_once(&pool).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Quote expiry sweeper stopped");
    })
}

/// Expire stale quotes once, logging the outcome. Returns how many expired.
pub async fn sweep_once(pool: &PgPool) -> usize {
    match QuoteRepository::new(pool).expire_stale().await {
        Ok(references) if references.is_empty() => 0,
        Ok(references) => {
            info!(count = references.len(), references = ?references, "Expired stale quotes");
            references.len()
        }
        Err(e) => {
            error!(error = %e, "Quote expiry sweep failed");
            0
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        // Never connects: the first sweep fails fast and is only logged.
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(50))
            .connect_lazy("postgres://spareline@127.0.0.1:1/spareline")
            .unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = spawn(pool, Duration::from_secs(3600), rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires a migrated database in DATABASE_URL"]
    async fn test_sweep_expires_out_of_date_priced_quotes() {
        let pool = PgPool::connect(&std::env::var("DATABASE_URL").unwrap())
            .await
            .unwrap();
        let stale = format!("Q-SWEEP-{}", uuid::Uuid::new_v4().simple());
        let fresh = format!("Q-SWEEP-{}", uuid::Uuid::new_v4().simple());
        for (reference, valid_for) in [(&stale, "-1 hour"), (&fresh, "1 day")] {
            sqlx::query(
                r"
                INSERT INTO shop.quotes
                    (reference, contact_name, contact_email, status, total_amount, valid_until)
                VALUES ($1, 'Sweep Test', 'sweep@example.com', 'price_ready', 10.00,
                        NOW() + $2::interval)
                ",
            )
            .bind(reference)
            .bind(valid_for)
            .execute(&pool)
            .await
            .unwrap();
        }

        assert!(sweep_once(&pool).await >= 1);

        for (reference, expected) in [(&stale, "expired"), (&fresh, "price_ready")] {
            let status: String =
                sqlx::query_scalar("SELECT status::text FROM shop.quotes WHERE reference = $1")
                    .bind(reference)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(status, expected, "{reference}");
        }

        sqlx::query("DELETE FROM shop.quotes WHERE reference = ANY($1)")
            .bind(vec![stale, fresh])
            .execute(&pool)
            .await
            .unwrap();
    }
}
