use sqlx::{PgPool, Row};

/// Thin wrapper over the relational store holding `(key, broker, is_master)`
/// rows. This is the coordinator's directory, not a message log: routing
/// decisions read from it, not from broker state, so when the two diverge
/// (mid-failover, mid-migration, after a partial `AddKey`) the store wins.
#[derive(Clone)]
pub struct PlacementStore {
    pool: PgPool,
}

impl PlacementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The broker name with `is_master = true` for `key`, if any.
    pub async fn master_of(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT broker FROM placements WHERE key = $1 AND is_master = true")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("broker")))
    }

    /// Replica brokers for `key`. Strictly filtered to `is_master = false`
    /// so a replica list can never accidentally contain the master (a
    /// legacy variant of this query dropped that filter; tests assert it is
    /// present here).
    pub async fn replicas_of(&self, key: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT broker FROM placements WHERE key = $1 AND is_master = false")
                .bind(key)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.get("broker")).collect())
    }

    /// Union of master and replicas for `key`, replicas first then master.
    /// Order carries no correctness meaning, only a stable iteration order
    /// for logging.
    pub async fn all_of(&self, key: &str) -> Result<Vec<String>, sqlx::Error> {
        let mut brokers = self.replicas_of(key).await?;
        if let Some(master) = self.master_of(key).await? {
            brokers.push(master);
        }
        Ok(brokers)
    }

    /// Keys `broker` masters.
    pub async fn master_keys_on(&self, broker: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT key FROM placements WHERE broker = $1 AND is_master = true")
                .bind(broker)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.get("key")).collect())
    }

    /// Keys resident on `from_broker` that are not also resident on
    /// `excluding_broker` — used by the load balancer to avoid migrating a
    /// key onto a broker that already holds a copy of it.
    pub async fn keys_on_excluding(
        &self,
        from_broker: &str,
        excluding_broker: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT key FROM placements WHERE broker = $1 \
             AND key NOT IN (SELECT key FROM placements WHERE broker = $2)",
        )
        .bind(from_broker)
        .bind(excluding_broker)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("key")).collect())
    }

    pub async fn insert(&self, key: &str, broker: &str, is_master: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO placements (key, broker, is_master) VALUES ($1, $2, $3)",
        )
        .bind(key)
        .bind(broker)
        .bind(is_master)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets `is_master = true` for `(key, broker)`, atomically clearing any
    /// prior master row for `key`. Idempotent: calling this twice in a row
    /// leaves the same single-master state.
    pub async fn promote(&self, key: &str, broker: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE placements SET is_master = false WHERE key = $1 AND is_master = true")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE placements SET is_master = true WHERE key = $1 AND broker = $2")
            .bind(key)
            .bind(broker)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// Changes the owning broker for a single `(key, from)` row, preserving
    /// its `is_master` bit.
    pub async fn reassign(&self, key: &str, from: &str, to: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE placements SET broker = $1 WHERE key = $2 AND broker = $3")
            .bind(to)
            .bind(key)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes all rows referencing `broker`.
    pub async fn drop_broker(&self, broker: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM placements WHERE broker = $1")
            .bind(broker)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
