//! Device-initiated ADMS delivery.
//!
//! Terminals retry anything other than a success acknowledgment on a short
//! loop, so every outcome except a database failure is acknowledged.

use sea_orm::DatabaseConnection;
use tracing::{Span, debug, info};

use crate::db::enums::LoadType;
use crate::db::services::device_service;
use crate::db::services::ingest_service::{BatchIngestor, BatchInput, BatchOutcome, IngestError};

/// Reply to the handshake: the server accepts the attendance log table.
pub const HANDSHAKE_BANNER: &str = "OK\nC:99:ATTLOG";

/// Plain-text acknowledgment for a delivery.
pub const ACK: &str = "OK";

/// Tables a terminal may name in `table=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKind {
    AttLog,
    /// Operation logs, user records and other uploads unrelated to punches.
    Housekeeping(String),
    Unknown(Option<String>),
}

impl TableKind {
    pub fn parse(table: Option<&str>) -> Self {
        match table.map(str::trim) {
            Some(t) if t.eq_ignore_ascii_case("ATTLOG") => TableKind::AttLog,
            Some(t)
                if ["options", "INFO", "OPERLOG", "USERINFO", "FINGERTMP", "ATTPHOTO", "BIODATA"]
                    .iter()
                    .any(|known| t.eq_ignore_ascii_case(known)) =>
            {
                TableKind::Housekeeping(t.to_owned())
            }
            other => TableKind::Unknown(other.filter(|t| !t.is_empty()).map(str::to_owned)),
        }
    }
}

#[derive(Clone)]
pub struct PushReceiver {
    db: DatabaseConnection,
    ingestor: BatchIngestor,
    span: Span,
}

impl PushReceiver {
    pub fn new(db: DatabaseConnection, ingestor: BatchIngestor, span: Span) -> Self {
        Self { db, ingestor, span }
    }

    /// Handshake. Touches no storage, known serial or not.
    pub fn handshake(&self, serial: Option<&str>) -> &'static str {
        debug!(parent: &self.span, serial = ?serial, "ADMS handshake.");
        HANDSHAKE_BANNER
    }

    /// Handles one POST. `Ok(None)` means nothing was ingested (non-attendance
    /// table or empty body); `Ok(Some(_))` carries the batch outcome, which is
    /// an ignored outcome for unknown or inactive devices.
    pub async fn receive(
        &self,
        serial: Option<&str>,
        table: TableKind,
        body: &[u8],
    ) -> Result<Option<BatchOutcome>, IngestError> {
        match table {
            TableKind::AttLog => {}
            TableKind::Housekeeping(name) => {
                debug!(parent: &self.span, serial = ?serial, table = %name, "Acknowledged housekeeping upload.");
                return Ok(None);
            }
            TableKind::Unknown(name) => {
                debug!(parent: &self.span, serial = ?serial, table = ?name, "Acknowledged upload for unhandled table.");
                return Ok(None);
            }
        }

        let input = BatchInput::from_text(&String::from_utf8_lossy(body));
        if input.is_empty() {
            return Ok(None);
        }

        let serial = serial.map(str::trim).unwrap_or_default();
        let device = device_service::lookup(&self.db, serial).await?;
        let reason = format!("Automatic push from SN: {serial}");
        let outcome = self
            .ingestor
            .ingest(device.as_ref(), LoadType::Push, &reason, input)
            .await?;
        if outcome.batch_id.is_some() {
            info!(
                parent: &self.span,
                serial,
                received = outcome.received,
                saved = outcome.record_count,
                "Push delivery processed."
            );
        }
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{attendance_punch, batch_load};
    use crate::test_support;
    use sea_orm::{EntityTrait, PaginatorTrait};

    fn receiver(db: &DatabaseConnection) -> PushReceiver {
        PushReceiver::new(db.clone(), test_support::ingestor(db), Span::none())
    }

    #[test]
    fn test_table_kind_dispatch() {
        assert_eq!(TableKind::parse(Some("ATTLOG")), TableKind::AttLog);
        assert_eq!(TableKind::parse(Some("attlog")), TableKind::AttLog);
        assert_eq!(
            TableKind::parse(Some("OPERLOG")),
            TableKind::Housekeeping("OPERLOG".to_string())
        );
        assert_eq!(
            TableKind::parse(Some("options")),
            TableKind::Housekeeping("options".to_string())
        );
        assert_eq!(
            TableKind::parse(Some("SOMETHING")),
            TableKind::Unknown(Some("SOMETHING".to_string()))
        );
        assert_eq!(TableKind::parse(None), TableKind::Unknown(None));
        assert_eq!(TableKind::parse(Some(" ")), TableKind::Unknown(None));
    }

    #[tokio::test]
    async fn test_handshake_is_side_effect_free() {
        let db = test_support::memory_db().await;
        let receiver = receiver(&db);
        assert_eq!(receiver.handshake(Some("UNKNOWN-SN")), HANDSHAKE_BANNER);
        assert_eq!(receiver.handshake(None), HANDSHAKE_BANNER);
        assert_eq!(batch_load::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_attlog_delivery_is_ingested_as_push() {
        let db = test_support::memory_db().await;
        test_support::insert_device(&db, "SN123", true).await;
        test_support::register_employee(&db, 42, "7").await;

        let body = b"0007\t2025-01-10 08:00:00\t1\t0\n0007\t2025-01-10 17:00:00\t1\t1\n\n";
        let outcome = receiver(&db)
            .receive(Some("SN123"), TableKind::AttLog, body)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.received, 2);
        assert_eq!(outcome.record_count, 2);
        let load = batch_load::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(load.load_type, LoadType::Push);
        assert_eq!(load.reason.as_deref(), Some("Automatic push from SN: SN123"));
    }

    #[tokio::test]
    async fn test_housekeeping_tables_are_not_processed() {
        let db = test_support::memory_db().await;
        test_support::insert_device(&db, "SN123", true).await;
        test_support::register_employee(&db, 42, "7").await;

        let outcome = receiver(&db)
            .receive(
                Some("SN123"),
                TableKind::parse(Some("OPERLOG")),
                b"0007\t2025-01-10 08:00:00",
            )
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(batch_load::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_serial_is_acknowledged_without_state() {
        let db = test_support::memory_db().await;
        test_support::register_employee(&db, 42, "7").await;

        let outcome = receiver(&db)
            .receive(Some("NOPE"), TableKind::AttLog, b"7\t2025-01-10 08:00:00")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.batch_id, None);
        assert_eq!(outcome.record_count, 0);
        assert_eq!(batch_load::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(attendance_punch::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_creates_no_batch() {
        let db = test_support::memory_db().await;
        test_support::insert_device(&db, "SN123", true).await;

        let outcome = receiver(&db)
            .receive(Some("SN123"), TableKind::AttLog, b"\n \n")
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(batch_load::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let db = test_support::memory_db().await;
        test_support::insert_device(&db, "SN123", true).await;
        test_support::register_employee(&db, 42, "7").await;

        let body = b"7\t2025-01-10 08:00:00\t\xff\xfe\n";
        let outcome = receiver(&db)
            .receive(Some("SN123"), TableKind::AttLog, body)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.record_count, 1);
    }
}
