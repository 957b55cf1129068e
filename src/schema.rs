//! Development schema bootstrap for `noc-monitor`.
//!
//! Production stores are provisioned by the sensor gateways and the door
//! controller, so this only runs when `SCHEMA_BOOTSTRAP` is set. Applied once
//! on startup from `main.rs` (EMBP: single gateway call per store).
//!
//! MySQL commits DDL implicitly, so statements run one by one on the pool.

use anyhow::Result;
use sqlx::MySqlPool;

use crate::models::Zone;

// ---

const ELECTRICAL_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS listrik_noc (
        id             BIGINT AUTO_INCREMENT PRIMARY KEY,
        phase_r        DOUBLE   NOT NULL,
        phase_s        DOUBLE   NOT NULL,
        phase_t        DOUBLE   NOT NULL,
        power_3ph      DOUBLE   NOT NULL,
        frequency_3ph  DOUBLE   NOT NULL,
        pf_3ph         DOUBLE   NOT NULL,
        energy_3ph     DOUBLE   NOT NULL,
        waktu          DATETIME NOT NULL,
        INDEX idx_listrik_noc_waktu (waktu)
    )
"#;

const FIRE_SMOKE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS api_asap_data (
        id          BIGINT AUTO_INCREMENT PRIMARY KEY,
        api_value   INT      NOT NULL,
        asap_value  INT      NOT NULL,
        waktu       DATETIME NOT NULL
    )
"#;

const USERS_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id        BIGINT AUTO_INCREMENT PRIMARY KEY,
        username  VARCHAR(64)  NOT NULL UNIQUE,
        password  VARCHAR(255) NOT NULL
    )
"#;

const ACCESS_DDL: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id   BIGINT AUTO_INCREMENT PRIMARY KEY,
        username  VARCHAR(64) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS doors (
        door_id    BIGINT AUTO_INCREMENT PRIMARY KEY,
        door_name  VARCHAR(64) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS access_logs (
        log_id          BIGINT AUTO_INCREMENT PRIMARY KEY,
        user_id         BIGINT,
        door_id         BIGINT,
        access_time     DATETIME NOT NULL,
        access_granted  BOOLEAN  NOT NULL,
        INDEX idx_access_logs_time (access_time)
    )
    "#,
];

/// DDL of one zone's climate table.
fn climate_ddl(zone: Zone) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id          BIGINT AUTO_INCREMENT PRIMARY KEY,
            suhu        DOUBLE   NOT NULL,
            kelembapan  DOUBLE   NOT NULL,
            waktu       DATETIME NOT NULL,
            INDEX idx_{table}_waktu (waktu)
        )
        "#,
        table = zone.table()
    )
}

/// Create the telemetry tables (idempotent).
///
/// Creates the three zone climate tables, the electrical and fire/smoke feeds
/// and the login `users` table. Safe to call on every startup.
pub async fn create_schema(pool: &MySqlPool) -> Result<()> {
    // ---
    for zone in Zone::ALL {
        sqlx::query(&climate_ddl(zone)).execute(pool).await?;
    }
    sqlx::query(ELECTRICAL_DDL).execute(pool).await?;
    sqlx::query(FIRE_SMOKE_DDL).execute(pool).await?;
    sqlx::query(USERS_DDL).execute(pool).await?;

    tracing::info!("Telemetry schema ready");
    Ok(())
}

/// Create the access-control tables (idempotent).
pub async fn create_access_schema(pool: &MySqlPool) -> Result<()> {
    // ---
    for ddl in ACCESS_DDL {
        sqlx::query(ddl).execute(pool).await?;
    }

    tracing::info!("Access-control schema ready");
    Ok(())
}
