use chrono::{DateTime, Days, Utc};
use chrono_tz::Tz;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;

use crate::db::entities::{attendance_punch, batch_load, device};
use crate::db::services::ingest_service::local_to_instant;

/// Batch loads, newest first, optionally for a single device.
pub async fn list_batch_loads(
    db: &DatabaseConnection,
    device_id: Option<i32>,
    limit: u64,
) -> Result<Vec<batch_load::Model>, DbErr> {
    let mut query = batch_load::Entity::find();
    if let Some(device_id) = device_id {
        query = query.filter(batch_load::Column::DeviceId.eq(device_id));
    }
    query
        .order_by_desc(batch_load::Column::CreatedAt)
        .order_by_desc(batch_load::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmsStats {
    pub records_today: u64,
    pub active_devices: u64,
}

/// Punches whose instant falls on `now`'s calendar day in the device time
/// zone, plus the number of devices accepting ingestion.
pub async fn dashboard_stats(
    db: &DatabaseConnection,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<AdmsStats, DbErr> {
    let (start, end) = local_day_bounds(timezone, now);

    let records_today = attendance_punch::Entity::find()
        .filter(attendance_punch::Column::PunchedAt.gte(start))
        .filter(attendance_punch::Column::PunchedAt.lt(end))
        .count(db)
        .await?;
    let active_devices = device::Entity::find()
        .filter(device::Column::IsActive.eq(true))
        .count(db)
        .await?;

    Ok(AdmsStats {
        records_today,
        active_devices,
    })
}

fn local_day_bounds(timezone: Tz, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.with_timezone(&timezone).date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let bound = |day: chrono::NaiveDate| {
        let midnight = day.and_time(chrono::NaiveTime::MIN);
        local_to_instant(timezone, midnight).unwrap_or_else(|| midnight.and_utc())
    };
    (bound(today), bound(tomorrow))
}
