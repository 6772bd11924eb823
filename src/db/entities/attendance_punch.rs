use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single clock event. `(employee_id, punched_at)` is unique; see
/// `db::schema` for the index.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance_punches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub employee_id: i32,
    #[sea_orm(indexed)]
    pub batch_load_id: i32,
    /// The terminal's code exactly as delivered, before normalization.
    pub raw_code: String,
    pub punched_at: ChronoDateTimeUtc,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batch_load::Entity",
        from = "Column::BatchLoadId",
        to = "super::batch_load::Column::Id",
        on_delete = "Restrict",
        on_update = "Cascade"
    )]
    BatchLoad,
}

impl Related<super::batch_load::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchLoad.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
