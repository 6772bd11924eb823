use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "biometric_devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub ip_address: String,
    pub port: i32,
    pub location: Option<String>,
    #[sea_orm(unique, nullable)]
    pub serial_number: Option<String>,
    pub model_name: Option<String>,
    pub is_active: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::batch_load::Entity")]
    BatchLoad,
}

impl Related<super::batch_load::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchLoad.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
