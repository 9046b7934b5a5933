//! Spot registry data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{Error, Result};

/// Column length limits
pub const MAX_ID_LEN: usize = 32;
pub const MAX_LABEL_LEN: usize = 32;
pub const MAX_SECTION_LEN: usize = 8;

/// Spot occupancy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum SpotStatus {
    #[default]
    Available,
    Occupied,
    Abnormal,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Occupied => "OCCUPIED",
            Self::Abnormal => "ABNORMAL",
        }
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parking spot entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ParkingSpot {
    pub id: String,
    pub label: String,
    pub status: SpotStatus,
    pub distance_raw: i64,
    pub floor: i64,
    pub section: String,
    pub plate_number: Option<String>,
    pub parked_time: Option<DateTime<Utc>>,
    pub abnormal_reason: Option<String>,
}

impl ParkingSpot {
    /// Enforce the status invariants before a write
    ///
    /// - `OCCUPIED`: plate required; parked time kept or set to `now`
    /// - otherwise: plate and parked time cleared
    /// - abnormal reason only survives on `ABNORMAL`
    pub fn normalize(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.status {
            SpotStatus::Occupied => {
                // Plates are stored as given; only absence is rejected
                let plate = self.plate_number.as_deref().unwrap_or_default();
                if plate.is_empty() {
                    return Err(Error::Validation(format!(
                        "plate_number required for OCCUPIED spot {}",
                        self.id
                    )));
                }
                if self.parked_time.is_none() {
                    self.parked_time = Some(now);
                }
                self.abnormal_reason = None;
            }
            SpotStatus::Available => {
                self.plate_number = None;
                self.parked_time = None;
                self.abnormal_reason = None;
            }
            SpotStatus::Abnormal => {
                self.plate_number = None;
                self.parked_time = None;
            }
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        check_len("id", &self.id, 1, MAX_ID_LEN)?;
        check_len("label", &self.label, 1, MAX_LABEL_LEN)?;
        check_len("section", &self.section, 0, MAX_SECTION_LEN)
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(Error::Validation(format!(
            "{} must be {}-{} characters",
            field, min, max
        )));
    }
    Ok(())
}

fn default_floor() -> i64 {
    1
}

fn default_section() -> String {
    "A".to_string()
}

/// Spot creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpotRequest {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub fields: SpotFields,
}

/// Full mutable field set (creation and PUT)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotFields {
    #[serde(default)]
    pub status: SpotStatus,
    #[serde(default)]
    pub distance_raw: i64,
    #[serde(default = "default_floor")]
    pub floor: i64,
    #[serde(default = "default_section")]
    pub section: String,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default)]
    pub parked_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub abnormal_reason: Option<String>,
}

impl Default for SpotFields {
    fn default() -> Self {
        Self {
            status: SpotStatus::Available,
            distance_raw: 0,
            floor: default_floor(),
            section: default_section(),
            plate_number: None,
            parked_time: None,
            abnormal_reason: None,
        }
    }
}

/// Spot replacement request (PUT)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceSpotRequest {
    pub label: String,
    #[serde(flatten)]
    pub fields: SpotFields,
}

/// Spot partial update request (PATCH)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpotRequest {
    pub label: Option<String>,
    pub status: Option<SpotStatus>,
    pub distance_raw: Option<i64>,
    pub floor: Option<i64>,
    pub section: Option<String>,
    pub plate_number: Option<String>,
    pub parked_time: Option<DateTime<Utc>>,
    pub abnormal_reason: Option<String>,
}

impl ParkingSpot {
    pub fn from_fields(id: String, label: String, fields: SpotFields) -> Self {
        Self {
            id,
            label,
            status: fields.status,
            distance_raw: fields.distance_raw,
            floor: fields.floor,
            section: fields.section,
            plate_number: fields.plate_number,
            parked_time: fields.parked_time,
            abnormal_reason: fields.abnormal_reason,
        }
    }

    /// Apply a PATCH on top of the current record
    pub fn apply(&mut self, req: UpdateSpotRequest) {
        if let Some(label) = req.label {
            self.label = label;
        }
        if let Some(status) = req.status {
            if status != self.status && status == SpotStatus::Occupied {
                // A fresh occupancy starts a new parked time
                self.parked_time = None;
            }
            self.status = status;
        }
        if let Some(distance_raw) = req.distance_raw {
            self.distance_raw = distance_raw;
        }
        if let Some(floor) = req.floor {
            self.floor = floor;
        }
        if let Some(section) = req.section {
            self.section = section;
        }
        if let Some(plate_number) = req.plate_number {
            self.plate_number = Some(plate_number);
        }
        if let Some(parked_time) = req.parked_time {
            self.parked_time = Some(parked_time);
        }
        if let Some(abnormal_reason) = req.abnormal_reason {
            self.abnormal_reason = Some(abnormal_reason);
        }
    }
}
