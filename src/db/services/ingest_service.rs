//! Batch ingestion shared by push delivery, pull sync and manual file loads.
//!
//! A batch is parsed and its employee codes resolved first; then one
//! transaction creates the `BatchLoad`, inserts the new punches and writes the
//! final `record_count`. Per-line defects (malformed line, unknown code, bad
//! timestamp, duplicate) only lower the count. A database error rolls the
//! whole batch back and is the only error returned.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set, TransactionTrait};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::db::entities::{attendance_punch, batch_load, device};
use crate::db::enums::LoadType;
use crate::db::services::employee_service::{EmployeeRef, EmployeeResolver};
use crate::terminal::AttendanceRecord;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// What a batch is made of: ADMS text lines or records already decoded by a
/// terminal driver.
#[derive(Debug, Clone)]
pub enum BatchInput {
    Lines(Vec<String>),
    Records(Vec<AttendanceRecord>),
}

impl BatchInput {
    /// Splits a request body into its non-empty lines.
    pub fn from_text(body: &str) -> Self {
        BatchInput::Lines(
            body.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            BatchInput::Lines(lines) => lines.len(),
            BatchInput::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_candidates(self) -> Vec<Candidate> {
        match self {
            BatchInput::Lines(lines) => lines.iter().filter_map(|l| Candidate::from_line(l)).collect(),
            BatchInput::Records(records) => records
                .into_iter()
                .map(|r| Candidate {
                    raw_code: r.user_code.trim().to_owned(),
                    local_time: Some(r.timestamp),
                })
                .collect(),
        }
    }
}

/// A line that had enough fields to be considered. `local_time` is `None`
/// when the timestamp field did not parse.
#[derive(Debug)]
struct Candidate {
    raw_code: String,
    local_time: Option<NaiveDateTime>,
}

impl Candidate {
    /// `code \t timestamp \t ...`; anything with fewer than two fields is dropped.
    fn from_line(line: &str) -> Option<Self> {
        let mut fields = line.trim().split('\t');
        let raw_code = fields.next()?.trim();
        let time_str = fields.next()?.trim();
        Some(Candidate {
            raw_code: raw_code.to_owned(),
            local_time: parse_device_timestamp(time_str),
        })
    }
}

pub fn parse_device_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
}

/// Interprets a terminal wall-clock reading in `tz`. Local times inside a DST
/// gap have no instant; times inside an overlap take the earlier one.
pub fn local_to_instant(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// `None` when the batch was ignored and no `BatchLoad` was written.
    pub batch_id: Option<i32>,
    pub received: usize,
    pub record_count: u32,
    pub skipped: usize,
    /// Lines that could not become a punch: malformed, unknown code or no
    /// usable timestamp. Punches already stored are not counted here.
    pub unusable: usize,
}

impl BatchOutcome {
    fn ignored(received: usize) -> Self {
        Self {
            batch_id: None,
            received,
            record_count: 0,
            skipped: received,
            unusable: received,
        }
    }
}

struct PendingPunch {
    employee: EmployeeRef,
    raw_code: String,
    punched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct BatchIngestor {
    db: DatabaseConnection,
    resolver: EmployeeResolver,
    timezone: Tz,
    span: Span,
}

impl BatchIngestor {
    /// `span` is the logging context every batch span is parented to.
    pub fn new(db: DatabaseConnection, resolver: EmployeeResolver, timezone: Tz, span: Span) -> Self {
        Self {
            db,
            resolver,
            timezone,
            span,
        }
    }

    pub async fn ingest(
        &self,
        device: Option<&device::Model>,
        load_type: LoadType,
        reason: &str,
        input: BatchInput,
    ) -> Result<BatchOutcome, IngestError> {
        let received = input.len();
        let device = match device {
            Some(device) if device.is_active => device,
            Some(device) => {
                warn!(
                    parent: &self.span,
                    device_id = device.id,
                    serial = ?device.serial_number,
                    lines = received,
                    %load_type,
                    "Ignoring batch from inactive device."
                );
                return Ok(BatchOutcome::ignored(received));
            }
            None => {
                warn!(
                    parent: &self.span,
                    lines = received,
                    %load_type,
                    "Ignoring batch from unregistered device."
                );
                return Ok(BatchOutcome::ignored(received));
            }
        };

        let span = info_span!(
            parent: &self.span,
            "batch",
            device_id = device.id,
            serial = ?device.serial_number,
            %load_type
        );
        self.ingest_for_device(device, load_type, reason, input, received)
            .instrument(span)
            .await
    }

    async fn ingest_for_device(
        &self,
        device: &device::Model,
        load_type: LoadType,
        reason: &str,
        input: BatchInput,
        received: usize,
    ) -> Result<BatchOutcome, IngestError> {
        // Directory lookups happen before the transaction so it holds a
        // connection only for the writes.
        let pending = self.prepare(input).await?;
        let unusable = received.saturating_sub(pending.len());

        let txn = self.db.begin().await?;
        let now = Utc::now();

        let load = batch_load::ActiveModel {
            device_id: Set(device.id),
            load_type: Set(load_type),
            reason: Set(Some(reason.to_owned())),
            record_count: Set(None),
            created_at: Set(now),
            closed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut record_count: u32 = 0;
        let mut seen = HashSet::new();
        for punch in pending {
            if !seen.insert((punch.employee, punch.punched_at)) {
                continue;
            }
            // The unique index decides whether the punch already exists; a
            // conflicting insert affects zero rows.
            let inserted = attendance_punch::Entity::insert(attendance_punch::ActiveModel {
                employee_id: Set(punch.employee.employee_id),
                batch_load_id: Set(load.id),
                raw_code: Set(punch.raw_code),
                punched_at: Set(punch.punched_at),
                created_at: Set(now),
                ..Default::default()
            })
            .on_conflict(
                OnConflict::columns([
                    attendance_punch::Column::EmployeeId,
                    attendance_punch::Column::PunchedAt,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
            if inserted > 0 {
                record_count += 1;
            }
        }

        let batch_id = load.id;
        let mut closing: batch_load::ActiveModel = load.into();
        closing.record_count = Set(Some(record_count as i32));
        closing.closed_at = Set(Some(Utc::now()));
        closing.update(&txn).await?;

        txn.commit().await?;

        let outcome = BatchOutcome {
            batch_id: Some(batch_id),
            received,
            record_count,
            skipped: received.saturating_sub(record_count as usize),
            unusable,
        };
        info!(
            batch_id,
            received,
            saved = record_count,
            skipped = outcome.skipped,
            unusable,
            "Batch committed."
        );
        Ok(outcome)
    }

    async fn prepare(&self, input: BatchInput) -> Result<Vec<PendingPunch>, DbErr> {
        let mut resolved: HashMap<String, Option<EmployeeRef>> = HashMap::new();
        let mut pending = Vec::new();

        for candidate in input.into_candidates() {
            let employee = match resolved.get(&candidate.raw_code) {
                Some(employee) => *employee,
                None => {
                    let employee = self.resolver.resolve(&candidate.raw_code).await?;
                    resolved.insert(candidate.raw_code.clone(), employee);
                    employee
                }
            };
            let Some(employee) = employee else {
                debug!(code = %candidate.raw_code, "Skipping punch for unknown code.");
                continue;
            };
            let Some(punched_at) = candidate
                .local_time
                .and_then(|local| local_to_instant(self.timezone, local))
            else {
                debug!(code = %candidate.raw_code, "Skipping punch with unusable timestamp.");
                continue;
            };
            pending.push(PendingPunch {
                employee,
                raw_code: candidate.raw_code,
                punched_at,
            });
        }
        Ok(pending)
    }
}
