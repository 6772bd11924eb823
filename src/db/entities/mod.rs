//! SeaORM entities for the attendance ingestion tables.
//!
//! `employee_code` belongs to the HR directory; ingestion only reads it.

pub mod attendance_punch;
pub mod batch_load;
pub mod device;
pub mod employee_code;

