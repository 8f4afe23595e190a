/// Scoped database transactions
///
/// [`scoped`] begins a transaction, hands the unit of work a connection bound
/// to it, and then commits if the work returned `Ok` or rolls back if it
/// returned `Err`. If the work panics or the future is dropped mid-flight, the
/// `sqlx::Transaction` is dropped without a commit and Postgres rolls it back.
///
/// The closure must return a boxed future so the borrow of the connection can
/// be expressed; capture owned values (or `Arc`s) rather than references.
///
/// # Example
///
/// ```no_run
/// use campaign_shared::db::transaction::scoped;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let id: i64 = scoped(&pool, |conn| {
///     Box::pin(async move {
///         sqlx::query_scalar("SELECT 1::BIGINT").fetch_one(&mut *conn).await
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};

/// Runs `work` inside a transaction, committing on success and rolling back on error
pub async fn scoped<T, E, F>(pool: &PgPool, work: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, E>>,
    E: From<sqlx::Error>,
{
    let mut tx = pool.begin().await?;

    match work(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            debug!("Transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                // The connection is discarded by the pool either way.
                warn!(error = %rollback_err, "Transaction rollback failed");
            } else {
                debug!("Transaction rolled back");
            }
            Err(err)
        }
    }
}
