//! Price-alert repository and trigger evaluation.
//!
//! Alerts are one-shot: once a price crossing marks an alert triggered, it
//! stays triggered until deleted. Evaluation runs against whatever asset
//! snapshot the caller passes in, typically the latest listing fetched by
//! the streaming broadcaster.

use chrono::Utc;
use log::info;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::Serialize;

use coinwatch_market_data::Asset;

use crate::errors::StorageError;
use crate::SqliteStore;

/// Direction a price must cross to fire an alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl AlertCondition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            _ => None,
        }
    }
}

/// A one-shot price threshold alert.
#[derive(Clone, Debug, Serialize)]
pub struct PriceAlert {
    pub id: i64,
    pub asset_id: String,
    pub target_price: f64,
    pub condition: AlertCondition,
    pub triggered: bool,
    pub triggered_at: Option<String>,
    pub created_at: String,
}

impl SqliteStore {
    /// Create an alert and return the stored row.
    ///
    /// Input validation (well-formed id, positive target price) is the
    /// boundary layer's job; this repository stores what it is given.
    pub fn create_alert(
        &self,
        asset_id: &str,
        target_price: f64,
        condition: AlertCondition,
    ) -> Result<PriceAlert, StorageError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO price_alerts (asset_id, target_price, condition) VALUES (?1, ?2, ?3)",
            params![asset_id, target_price, condition.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        let alert = conn.query_row(
            &format!("SELECT {} FROM price_alerts WHERE id = ?1", ALERT_COLUMNS),
            params![id],
            row_to_alert,
        )?;
        Ok(alert)
    }

    /// All alerts, newest first.
    pub fn alerts(&self) -> Result<Vec<PriceAlert>, StorageError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM price_alerts ORDER BY created_at DESC, id DESC",
            ALERT_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_alert)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete an alert. Returns false when the id does not exist.
    pub fn delete_alert(&self, id: i64) -> Result<bool, StorageError> {
        let conn = self.lock_conn();
        let changed = conn.execute("DELETE FROM price_alerts WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Evaluate every untriggered alert against the given asset snapshot.
    ///
    /// An alert fires when its asset is present with a price at or past the
    /// target in the alert's direction. Fired alerts are marked in the
    /// database and returned. Assets without a current price never fire.
    pub fn check_alerts(&self, assets: &[Asset]) -> Result<Vec<PriceAlert>, StorageError> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM price_alerts WHERE triggered = 0",
            ALERT_COLUMNS
        ))?;
        let pending = stmt
            .query_map([], row_to_alert)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let mut fired = Vec::new();
        for mut alert in pending {
            let Some(price) = assets
                .iter()
                .find(|asset| asset.id == alert.asset_id)
                .and_then(|asset| asset.current_price)
            else {
                continue;
            };

            let crossed = match alert.condition {
                AlertCondition::Above => price >= alert.target_price,
                AlertCondition::Below => price <= alert.target_price,
            };

            if crossed {
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "UPDATE price_alerts SET triggered = 1, triggered_at = ?1 WHERE id = ?2",
                    params![now, alert.id],
                )?;
                info!(
                    "Alert {} fired: {} {} {}",
                    alert.id,
                    alert.asset_id,
                    alert.condition.as_str(),
                    alert.target_price
                );
                alert.triggered = true;
                alert.triggered_at = Some(now);
                fired.push(alert);
            }
        }

        Ok(fired)
    }
}

const ALERT_COLUMNS: &str =
    "id, asset_id, target_price, condition, triggered, triggered_at, created_at";

fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<PriceAlert> {
    let condition: String = row.get(3)?;
    let condition = AlertCondition::parse(&condition).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown alert condition: {}", condition).into(),
        )
    })?;

    Ok(PriceAlert {
        id: row.get(0)?,
        asset_id: row.get(1)?,
        target_price: row.get(2)?,
        condition,
        triggered: row.get(4)?,
        triggered_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced_asset(id: &str, price: f64) -> Asset {
        let mut asset = Asset::new(id, id.to_uppercase(), id);
        asset.current_price = Some(price);
        asset
    }

    #[test]
    fn test_create_and_list() {
        let store = SqliteStore::open_in_memory().unwrap();

        let alert = store
            .create_alert("bitcoin", 50000.0, AlertCondition::Above)
            .unwrap();
        assert_eq!(alert.asset_id, "bitcoin");
        assert_eq!(alert.condition, AlertCondition::Above);
        assert!(!alert.triggered);
        assert!(alert.triggered_at.is_none());

        assert_eq!(store.alerts().unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alert = store
            .create_alert("bitcoin", 50000.0, AlertCondition::Above)
            .unwrap();

        assert!(store.delete_alert(alert.id).unwrap());
        assert!(!store.delete_alert(alert.id).unwrap());
        assert!(store.alerts().unwrap().is_empty());
    }

    #[test]
    fn test_above_alert_fires_at_or_past_target() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_alert("bitcoin", 50000.0, AlertCondition::Above)
            .unwrap();

        let quiet = store.check_alerts(&[priced_asset("bitcoin", 49999.0)]).unwrap();
        assert!(quiet.is_empty());

        let fired = store.check_alerts(&[priced_asset("bitcoin", 50000.0)]).unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0].triggered);
        assert!(fired[0].triggered_at.is_some());
    }

    #[test]
    fn test_below_alert_fires_at_or_past_target() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_alert("ethereum", 2000.0, AlertCondition::Below)
            .unwrap();

        assert!(store
            .check_alerts(&[priced_asset("ethereum", 2100.0)])
            .unwrap()
            .is_empty());

        let fired = store
            .check_alerts(&[priced_asset("ethereum", 1950.0)])
            .unwrap();
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn test_triggered_alert_does_not_fire_again() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_alert("bitcoin", 50000.0, AlertCondition::Above)
            .unwrap();

        let snapshot = [priced_asset("bitcoin", 51000.0)];
        assert_eq!(store.check_alerts(&snapshot).unwrap().len(), 1);
        assert_eq!(store.check_alerts(&snapshot).unwrap().len(), 0);
    }

    #[test]
    fn test_asset_without_price_never_fires() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_alert("bitcoin", 50000.0, AlertCondition::Above)
            .unwrap();

        let unpriced = Asset::new("bitcoin", "BTC", "Bitcoin");
        assert!(store.check_alerts(&[unpriced]).unwrap().is_empty());
    }

    #[test]
    fn test_absent_asset_leaves_alert_pending() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_alert("bitcoin", 50000.0, AlertCondition::Above)
            .unwrap();

        assert!(store
            .check_alerts(&[priced_asset("ethereum", 2280.0)])
            .unwrap()
            .is_empty());

        // Still pending for the next snapshot that includes the asset
        let fired = store
            .check_alerts(&[priced_asset("bitcoin", 60000.0)])
            .unwrap();
        assert_eq!(fired.len(), 1);
    }
}
