//! SpotRegistry - Durable parking spot collection
//!
//! ## Responsibilities
//!
//! - Spot CRUD
//! - Occupy transition with ENTRY logging
//! - Reset every spot to AVAILABLE
//!
//! `plate_number` and `parked_time` are set exactly when a spot is
//! OCCUPIED; `abnormal_reason` only survives on ABNORMAL spots.

mod repository;
mod service;
mod types;

pub use repository::SpotRepository;
pub use service::SpotService;
pub use types::*;
