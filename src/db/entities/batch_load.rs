use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::LoadType;

/// One row per ingestion event. `record_count` stays NULL until the batch
/// transaction writes its final count.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "biometric_loads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub device_id: i32,
    pub load_type: LoadType,
    pub reason: Option<String>,
    pub record_count: Option<i32>,
    pub created_at: ChronoDateTimeUtc,
    pub closed_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device::Entity",
        from = "Column::DeviceId",
        to = "super::device::Column::Id",
        on_delete = "Restrict",
        on_update = "Cascade"
    )]
    Device,
    #[sea_orm(has_many = "super::attendance_punch::Entity")]
    AttendancePunch,
}

impl Related<super::device::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Device.def()
    }
}

impl Related<super::attendance_punch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendancePunch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
