use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;

use crate::db::entities::device;

// --- Device Registry ---

/// Looks a terminal up by the serial number it reports in push requests.
/// Inactive devices are returned as well; callers decide what `is_active` means.
pub async fn lookup(
    db: &DatabaseConnection,
    serial_number: &str,
) -> Result<Option<device::Model>, DbErr> {
    let serial_number = serial_number.trim();
    if serial_number.is_empty() {
        return Ok(None);
    }
    device::Entity::find()
        .filter(device::Column::SerialNumber.eq(serial_number))
        .one(db)
        .await
}

pub async fn lookup_by_ip(
    db: &DatabaseConnection,
    ip_address: &str,
) -> Result<Option<device::Model>, DbErr> {
    device::Entity::find()
        .filter(device::Column::IpAddress.eq(ip_address.trim()))
        .one(db)
        .await
}

pub async fn get_device(db: &DatabaseConnection, id: i32) -> Result<Option<device::Model>, DbErr> {
    device::Entity::find_by_id(id).one(db).await
}

pub async fn list_devices(db: &DatabaseConnection) -> Result<Vec<device::Model>, DbErr> {
    device::Entity::find()
        .order_by_asc(device::Column::Name)
        .all(db)
        .await
}

pub async fn list_active_devices(db: &DatabaseConnection) -> Result<Vec<device::Model>, DbErr> {
    device::Entity::find()
        .filter(device::Column::IsActive.eq(true))
        .order_by_asc(device::Column::Name)
        .all(db)
        .await
}

// --- Administration ---

#[derive(Debug, Clone, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub ip_address: String,
    #[serde(default = "default_port")]
    pub port: i32,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub model_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_port() -> i32 {
    4370
}

fn default_active() -> bool {
    true
}

pub async fn create_device(db: &DatabaseConnection, new: NewDevice) -> Result<device::Model, DbErr> {
    let now = Utc::now();
    let serial_number = new
        .serial_number
        .map(|sn| sn.trim().to_owned())
        .filter(|sn| !sn.is_empty());

    device::ActiveModel {
        name: Set(new.name.trim().to_owned()),
        ip_address: Set(new.ip_address.trim().to_owned()),
        port: Set(new.port),
        location: Set(new.location),
        serial_number: Set(serial_number),
        model_name: Set(new.model_name),
        is_active: Set(new.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Returns `None` when no device has this id.
pub async fn set_device_active(
    db: &DatabaseConnection,
    id: i32,
    is_active: bool,
) -> Result<Option<device::Model>, DbErr> {
    let Some(existing) = get_device(db, id).await? else {
        return Ok(None);
    };
    let mut active: device::ActiveModel = existing.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map(Some)
}
