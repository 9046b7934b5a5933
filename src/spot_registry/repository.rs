//! Spot registry repository
//!
//! Database access layer for parking spots

use super::types::*;
use crate::error::{Error, Result};
use sqlx::SqlitePool;

/// Parking spot repository for database operations
#[derive(Clone)]
pub struct SpotRepository {
    pool: SqlitePool,
}

impl SpotRepository {
    /// Spot SELECT columns
    const SPOT_COLUMNS: &'static str = r#"
        id, label, status, distance_raw, floor, section,
        plate_number, parked_time, abnormal_reason
    "#;

    /// Create new repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get all spots ordered by id
    pub async fn get_all(&self) -> Result<Vec<ParkingSpot>> {
        let query = format!(
            "SELECT {} FROM parking_spots ORDER BY id ASC",
            Self::SPOT_COLUMNS
        );
        let spots = sqlx::query_as::<_, ParkingSpot>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(spots)
    }

    /// Get spot by id
    pub async fn get(&self, id: &str) -> Result<Option<ParkingSpot>> {
        let query = format!(
            "SELECT {} FROM parking_spots WHERE id = ?",
            Self::SPOT_COLUMNS
        );
        let spot = sqlx::query_as::<_, ParkingSpot>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(spot)
    }

    /// Insert a new spot
    pub async fn insert(&self, spot: &ParkingSpot) -> Result<ParkingSpot> {
        sqlx::query(
            r#"
            INSERT INTO parking_spots (
                id, label, status, distance_raw, floor, section,
                plate_number, parked_time, abnormal_reason
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&spot.id)
        .bind(&spot.label)
        .bind(spot.status)
        .bind(spot.distance_raw)
        .bind(spot.floor)
        .bind(&spot.section)
        .bind(&spot.plate_number)
        .bind(spot.parked_time)
        .bind(&spot.abnormal_reason)
        .execute(&self.pool)
        .await?;

        self.get(&spot.id)
            .await?
            .ok_or(Error::NotFound("Spot not found after insert".to_string()))
    }

    /// Write every mutable column of an existing spot
    pub async fn save(&self, spot: &ParkingSpot) -> Result<ParkingSpot> {
        let result = sqlx::query(
            r#"
            UPDATE parking_spots SET
                label = ?, status = ?, distance_raw = ?, floor = ?, section = ?,
                plate_number = ?, parked_time = ?, abnormal_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(&spot.label)
        .bind(spot.status)
        .bind(spot.distance_raw)
        .bind(spot.floor)
        .bind(&spot.section)
        .bind(&spot.plate_number)
        .bind(spot.parked_time)
        .bind(&spot.abnormal_reason)
        .bind(&spot.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Spot {} not found", spot.id)));
        }

        Ok(spot.clone())
    }

    /// Delete a spot; returns whether a row was removed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM parking_spots WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reset every spot to AVAILABLE and clear occupancy fields
    pub async fn reset_all(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE parking_spots SET
                status = ?, plate_number = NULL, parked_time = NULL, abnormal_reason = NULL
            "#,
        )
        .bind(SpotStatus::Available)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
