//! Fixtures shared by the in-crate tests.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::db::entities::{device, employee_code};
use crate::db::schema;
use crate::db::services::employee_service::{self, DbEmployeeDirectory, EmployeeResolver};
use crate::db::services::ingest_service::{BatchIngestor, BatchInput};
use crate::terminal::{
    AttendanceRecord, DeviceAddress, DeviceInfo, TerminalConnector, TerminalError, TerminalSession,
};

/// Fresh in-memory SQLite database with the production schema. A single
/// pooled connection keeps every query on the same in-memory database.
pub async fn memory_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    schema::create_schema(&db).await.unwrap();
    db
}

/// File-backed SQLite database served by a pool of `max_connections`, so
/// concurrent tasks really run on separate connections. Keep the directory
/// alive for as long as the connection is used.
pub async fn file_db(max_connections: u32) -> (tempfile::TempDir, DatabaseConnection) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ingest.db").display());
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(max_connections)
        .min_connections(max_connections)
        .sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    schema::create_schema(&db).await.unwrap();
    (dir, db)
}

pub async fn insert_device(db: &DatabaseConnection, serial: &str, is_active: bool) -> device::Model {
    insert_device_at(db, serial, is_active, 4370).await
}

pub async fn insert_device_at(
    db: &DatabaseConnection,
    serial: &str,
    is_active: bool,
    port: u16,
) -> device::Model {
    let now = Utc::now();
    device::ActiveModel {
        name: Set(format!("Terminal {serial}")),
        ip_address: Set("127.0.0.1".to_string()),
        port: Set(i32::from(port)),
        location: Set(Some("Main entrance".to_string())),
        serial_number: Set(Some(serial.to_string())),
        model_name: Set(None),
        is_active: Set(is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn register_employee(db: &DatabaseConnection, employee_id: i32, code: &str) {
    let code = employee_service::normalize_code(code).unwrap();
    employee_code::ActiveModel {
        employee_id: Set(employee_id),
        code: Set(code),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

/// Ingestor reading terminal clocks as UTC.
pub fn ingestor(db: &DatabaseConnection) -> BatchIngestor {
    let resolver = EmployeeResolver::new(Arc::new(DbEmployeeDirectory::new(db.clone())));
    BatchIngestor::new(db.clone(), resolver, chrono_tz::UTC, tracing::Span::none())
}

pub fn lines(lines: &[&str]) -> BatchInput {
    BatchInput::Lines(lines.iter().map(|l| l.to_string()).collect())
}

pub fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

/// A closed port on localhost: probes against it are refused.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Debug, Default)]
struct FakeState {
    connect_error: Option<TerminalError>,
    operation_error: Option<TerminalError>,
    records: Vec<AttendanceRecord>,
    clock: Option<NaiveDateTime>,
    connects: usize,
    disconnects: usize,
    clears: usize,
    voices: usize,
}

/// Scripted terminal driver. Clones share state, so a test can keep one
/// handle and give another to the code under test.
#[derive(Debug, Default, Clone)]
pub struct FakeTerminal {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTerminal {
    pub fn refusing_connect(self, error: TerminalError) -> Self {
        self.state.lock().unwrap().connect_error = Some(error);
        self
    }

    pub fn failing_operations(self, error: TerminalError) -> Self {
        self.state.lock().unwrap().operation_error = Some(error);
        self
    }

    pub fn with_records(self, records: Vec<AttendanceRecord>) -> Self {
        self.state.lock().unwrap().records = records;
        self
    }

    pub fn with_clock(self, clock: NaiveDateTime) -> Self {
        self.state.lock().unwrap().clock = Some(clock);
        self
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    pub fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }

    pub fn voices(&self) -> usize {
        self.state.lock().unwrap().voices
    }

    pub fn clock(&self) -> Option<NaiveDateTime> {
        self.state.lock().unwrap().clock
    }

    pub fn buffered(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

impl TerminalConnector for FakeTerminal {
    fn connect(
        &self,
        _address: &DeviceAddress,
        _timeout: Duration,
    ) -> Result<Box<dyn TerminalSession>, TerminalError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.connect_error.clone() {
            return Err(error);
        }
        state.connects += 1;
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    fn check(&self) -> Result<std::sync::MutexGuard<'_, FakeState>, TerminalError> {
        let state = self.state.lock().unwrap();
        match state.operation_error.clone() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl TerminalSession for FakeSession {
    fn get_time(&mut self) -> Result<NaiveDateTime, TerminalError> {
        let state = self.check()?;
        Ok(state.clock.unwrap_or_else(|| local(2025, 1, 10, 8, 0, 0)))
    }

    fn set_time(&mut self, local: NaiveDateTime) -> Result<(), TerminalError> {
        let mut state = self.check()?;
        state.clock = Some(local);
        Ok(())
    }

    fn get_attendance(&mut self) -> Result<Vec<AttendanceRecord>, TerminalError> {
        let state = self.check()?;
        Ok(state.records.clone())
    }

    fn clear_attendance(&mut self) -> Result<(), TerminalError> {
        let mut state = self.check()?;
        state.records.clear();
        state.clears += 1;
        Ok(())
    }

    fn device_info(&mut self) -> Result<DeviceInfo, TerminalError> {
        let state = self.check()?;
        Ok(DeviceInfo {
            serial_number: Some("FAKE-0001".to_string()),
            device_name: Some("Fake terminal".to_string()),
            firmware: Some("1.0".to_string()),
            platform: None,
            user_count: Some(state.records.len()),
        })
    }

    fn test_voice(&mut self) -> Result<(), TerminalError> {
        let mut state = self.check()?;
        state.voices += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TerminalError> {
        self.state.lock().unwrap().disconnects += 1;
        Ok(())
    }
}
