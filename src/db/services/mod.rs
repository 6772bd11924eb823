//! Data access for the ingestion core. Each sub-module owns one concern;
//! the commonly used items are re-exported here.

pub mod batch_service;
pub mod device_service;
pub mod employee_service;
pub mod ingest_service;

pub use batch_service::*;
pub use device_service::*;
pub use employee_service::{DbEmployeeDirectory, EmployeeDirectory, EmployeeRef, EmployeeResolver};
pub use ingest_service::{BatchIngestor, BatchInput, BatchOutcome, IngestError};
