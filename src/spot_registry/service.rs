//! Spot registry service
//!
//! State transitions and CRUD on top of the repository. Every write path
//! normalizes the spot first, and status transitions append to the event log.

use super::repository::SpotRepository;
use super::types::*;
use crate::error::{Error, Result};
use crate::log_recorder::{log_types, LogRecorder};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Parking spot service
pub struct SpotService {
    repo: SpotRepository,
    logs: Arc<LogRecorder>,
}

impl SpotService {
    /// Create new service
    pub fn new(pool: SqlitePool, logs: Arc<LogRecorder>) -> Self {
        Self {
            repo: SpotRepository::new(pool),
            logs,
        }
    }

    /// All spots ordered by id
    pub async fn list(&self) -> Result<Vec<ParkingSpot>> {
        self.repo.get_all().await
    }

    /// Get spot by id
    pub async fn get(&self, id: &str) -> Result<ParkingSpot> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Spot {} not found", id)))
    }

    /// Create a spot
    pub async fn create(&self, req: CreateSpotRequest) -> Result<ParkingSpot> {
        if self.repo.get(&req.id).await?.is_some() {
            return Err(Error::Conflict(format!("Spot {} already exists", req.id)));
        }

        let mut spot = ParkingSpot::from_fields(req.id, req.label, req.fields);
        spot.normalize(Utc::now())?;

        let spot = self.repo.insert(&spot).await?;
        info!(spot_id = %spot.id, status = %spot.status, "Spot created");
        Ok(spot)
    }

    /// Replace every mutable field (PUT)
    pub async fn replace(&self, id: &str, req: ReplaceSpotRequest) -> Result<ParkingSpot> {
        let before = self.get(id).await?;

        let mut spot = ParkingSpot::from_fields(id.to_string(), req.label, req.fields);
        if spot.status == SpotStatus::Occupied
            && before.status == SpotStatus::Occupied
            && spot.parked_time.is_none()
        {
            spot.parked_time = before.parked_time;
        }

        self.write(before, spot).await
    }

    /// Apply a partial update (PATCH)
    pub async fn patch(&self, id: &str, req: UpdateSpotRequest) -> Result<ParkingSpot> {
        let before = self.get(id).await?;

        let mut spot = before.clone();
        spot.apply(req);

        self.write(before, spot).await
    }

    /// Delete a spot; log entries keep existing with a null spot reference
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(Error::NotFound(format!("Spot {} not found", id)));
        }
        info!(spot_id = %id, "Spot deleted");
        Ok(())
    }

    /// Mark a spot occupied by `plate_number`
    ///
    /// The plate is stored as given, without format or length checks.
    /// Nothing changes when the plate is empty or the spot is unknown.
    pub async fn occupy(&self, id: &str, plate_number: &str) -> Result<ParkingSpot> {
        if plate_number.is_empty() {
            return Err(Error::Validation("plate_number is required".to_string()));
        }

        let mut spot = self.get(id).await?;
        spot.status = SpotStatus::Occupied;
        spot.plate_number = Some(plate_number.to_string());
        spot.parked_time = Some(Utc::now());
        spot.abnormal_reason = None;
        spot.normalize(Utc::now())?;

        let spot = self.repo.save(&spot).await?;

        self.logs
            .append(
                log_types::ENTRY,
                &format!("Vehicle {} parked at {}", plate_number, spot.label),
                Some(&spot.id),
            )
            .await?;

        info!(spot_id = %spot.id, plate_number = %plate_number, "Spot occupied");
        Ok(spot)
    }

    /// Set every spot AVAILABLE and clear occupancy fields
    pub async fn reset_all(&self) -> Result<u64> {
        let count = self.repo.reset_all().await?;
        info!(spots = count, "All spots reset");
        Ok(count)
    }

    async fn write(&self, before: ParkingSpot, mut spot: ParkingSpot) -> Result<ParkingSpot> {
        spot.normalize(Utc::now())?;
        let spot = self.repo.save(&spot).await?;

        if before.status != spot.status {
            info!(
                spot_id = %spot.id,
                from = %before.status,
                to = %spot.status,
                "Spot status changed"
            );
            self.record_transition(&before, &spot).await?;
        }

        Ok(spot)
    }

    async fn record_transition(&self, before: &ParkingSpot, after: &ParkingSpot) -> Result<()> {
        match (before.status, after.status) {
            (SpotStatus::Occupied, SpotStatus::Available) => {
                let plate = before.plate_number.as_deref().unwrap_or("unknown");
                self.logs
                    .append(
                        log_types::EXIT,
                        &format!("Vehicle {} left {}", plate, after.label),
                        Some(&after.id),
                    )
                    .await?;
            }
            (_, SpotStatus::Abnormal) => {
                let reason = after.abnormal_reason.as_deref().unwrap_or("unspecified");
                self.logs
                    .append(
                        log_types::ABNORMAL,
                        &format!("{} flagged abnormal: {}", after.label, reason),
                        Some(&after.id),
                    )
                    .await?;
            }
            (_, SpotStatus::Occupied) => {
                let plate = after.plate_number.as_deref().unwrap_or("unknown");
                self.logs
                    .append(
                        log_types::ENTRY,
                        &format!("Vehicle {} parked at {}", plate, after.label),
                        Some(&after.id),
                    )
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    async fn service() -> (SpotService, Arc<LogRecorder>) {
        let pool = memory_pool().await;
        let logs = Arc::new(LogRecorder::new(pool.clone()));
        (SpotService::new(pool, logs.clone()), logs)
    }

    #[tokio::test]
    async fn test_list_seeded_in_id_order() {
        let (spots, _) = service().await;
        let all = spots.list().await.unwrap();

        let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A-1", "A-2", "A-3", "A-4"]);
        assert_eq!(all[1].status, SpotStatus::Occupied);
        assert_eq!(all[1].plate_number.as_deref(), Some("ABC-5678"));
        assert!(all[1].parked_time.is_some());
        assert_eq!(all[3].status, SpotStatus::Abnormal);
    }

    #[tokio::test]
    async fn test_occupy_sets_state_and_logs_entry() {
        let (spots, logs) = service().await;
        let before = Utc::now();

        let spot = spots.occupy("A-1", "XYZ-1234").await.unwrap();
        assert_eq!(spot.status, SpotStatus::Occupied);
        assert_eq!(spot.plate_number.as_deref(), Some("XYZ-1234"));
        assert!(spot.parked_time.unwrap() >= before);

        let stored = spots.get("A-1").await.unwrap();
        assert_eq!(stored.status, SpotStatus::Occupied);
        assert_eq!(stored.plate_number, spot.plate_number);
        assert!(stored.parked_time.is_some());

        let entries = logs.list_recent().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, log_types::ENTRY);
        assert_eq!(entries[0].spot_id.as_deref(), Some("A-1"));
    }

    #[tokio::test]
    async fn test_occupy_abnormal_spot_clears_reason() {
        let (spots, _) = service().await;
        let spot = spots.occupy("A-4", "NEW1").await.unwrap();
        assert!(spot.abnormal_reason.is_none());
    }

    #[tokio::test]
    async fn test_occupy_long_plate() {
        let (spots, _) = service().await;
        let plate = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789WXYZ";
        assert_eq!(plate.len(), 40);

        let spot = spots.occupy("A-1", plate).await.unwrap();
        assert_eq!(spot.status, SpotStatus::Occupied);

        let stored = spots.get("A-1").await.unwrap();
        assert_eq!(stored.status, SpotStatus::Occupied);
        assert_eq!(stored.plate_number.as_deref(), Some(plate));
    }

    #[tokio::test]
    async fn test_occupy_whitespace_plate_is_stored() {
        let (spots, _) = service().await;
        let spot = spots.occupy("A-3", " ").await.unwrap();
        assert_eq!(spot.status, SpotStatus::Occupied);
        assert_eq!(spot.plate_number.as_deref(), Some(" "));
    }

    #[tokio::test]
    async fn test_occupy_empty_plate_changes_nothing() {
        let (spots, logs) = service().await;
        let before = spots.get("A-1").await.unwrap();

        assert!(matches!(spots.occupy("A-1", "").await, Err(Error::Validation(_))));

        assert_eq!(spots.get("A-1").await.unwrap(), before);
        assert_eq!(logs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_occupy_unknown_spot() {
        let (spots, logs) = service().await;
        assert!(matches!(spots.occupy("Z-9", "ABC").await, Err(Error::NotFound(_))));
        assert_eq!(logs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_all_is_idempotent() {
        let (spots, _) = service().await;

        assert_eq!(spots.reset_all().await.unwrap(), 4);
        let first = spots.list().await.unwrap();
        spots.reset_all().await.unwrap();
        let second = spots.list().await.unwrap();

        assert_eq!(first, second);
        for spot in second {
            assert_eq!(spot.status, SpotStatus::Available);
            assert!(spot.plate_number.is_none());
            assert!(spot.parked_time.is_none());
            assert!(spot.abnormal_reason.is_none());
        }
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let (spots, _) = service().await;
        let req = CreateSpotRequest {
            id: "B-1".to_string(),
            label: "B-1".to_string(),
            fields: SpotFields::default(),
        };

        let created = spots.create(req.clone()).await.unwrap();
        assert_eq!(created.floor, 1);
        assert_eq!(created.section, "A");
        assert!(matches!(spots.create(req).await, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_occupied_without_plate_rejected() {
        let (spots, _) = service().await;
        let req = CreateSpotRequest {
            id: "B-2".to_string(),
            label: "B-2".to_string(),
            fields: SpotFields {
                status: SpotStatus::Occupied,
                ..Default::default()
            },
        };
        assert!(matches!(spots.create(req).await, Err(Error::Validation(_))));
        assert!(matches!(spots.get("B-2").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_patch_to_available_logs_exit() {
        let (spots, logs) = service().await;
        let spot = spots
            .patch(
                "A-2",
                UpdateSpotRequest {
                    status: Some(SpotStatus::Available),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(spot.plate_number.is_none());
        assert!(spot.parked_time.is_none());

        let entries = logs.list_recent().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, log_types::EXIT);
        assert!(entries[0].message.contains("ABC-5678"));
    }

    #[tokio::test]
    async fn test_patch_to_abnormal_logs_reason() {
        let (spots, logs) = service().await;
        spots
            .patch(
                "A-3",
                UpdateSpotRequest {
                    status: Some(SpotStatus::Abnormal),
                    abnormal_reason: Some("Blocked by cones".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let entries = logs.list_recent().await.unwrap();
        assert_eq!(entries[0].entry_type, log_types::ABNORMAL);
        assert!(entries[0].message.contains("Blocked by cones"));
    }

    #[tokio::test]
    async fn test_patch_label_only_keeps_status() {
        let (spots, logs) = service().await;
        let spot = spots
            .patch(
                "A-2",
                UpdateSpotRequest {
                    label: Some("Visitor 2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(spot.status, SpotStatus::Occupied);
        assert_eq!(spot.plate_number.as_deref(), Some("ABC-5678"));
        assert_eq!(logs.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_keeps_parked_time_while_occupied() {
        let (spots, _) = service().await;
        let before = spots.get("A-2").await.unwrap();

        let spot = spots
            .replace(
                "A-2",
                ReplaceSpotRequest {
                    label: "A-2".to_string(),
                    fields: SpotFields {
                        status: SpotStatus::Occupied,
                        plate_number: Some("ABC-5678".to_string()),
                        distance_raw: 3,
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();

        assert_eq!(spot.parked_time, before.parked_time);
        assert_eq!(spot.distance_raw, 3);
    }

    #[tokio::test]
    async fn test_delete_spot() {
        let (spots, logs) = service().await;
        spots.occupy("A-1", "DEL1").await.unwrap();

        spots.delete("A-1").await.unwrap();
        assert!(matches!(spots.delete("A-1").await, Err(Error::NotFound(_))));

        let entries = logs.list_recent().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].spot_id.is_none());
    }
}
