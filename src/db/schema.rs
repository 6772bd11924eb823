//! Table bootstrap. Safe to run on every start-up: every statement is
//! `IF NOT EXISTS`.

use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::db::entities::{attendance_punch, batch_load, device, employee_code};

pub const PUNCH_UNIQUE_INDEX: &str = "ux_attendance_punches_employee_instant";

pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_entity_table(db, &schema, device::Entity).await?;
    create_entity_table(db, &schema, employee_code::Entity).await?;
    create_entity_table(db, &schema, batch_load::Entity).await?;
    create_entity_table(db, &schema, attendance_punch::Entity).await?;

    // Storage-level backstop against concurrent re-delivery of the same punch.
    create_index(
        db,
        Index::create()
            .name(PUNCH_UNIQUE_INDEX)
            .table(attendance_punch::Entity)
            .col(attendance_punch::Column::EmployeeId)
            .col(attendance_punch::Column::PunchedAt)
            .unique()
            .if_not_exists()
            .to_owned(),
    )
    .await?;

    info!("Database schema is up to date.");
    Ok(())
}

async fn create_entity_table<E>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr>
where
    E: EntityTrait + Copy,
{
    let mut table: TableCreateStatement = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(db.get_database_backend().build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        create_index(db, index).await?;
    }
    Ok(())
}

async fn create_index(db: &DatabaseConnection, index: IndexCreateStatement) -> Result<(), DbErr> {
    db.execute(db.get_database_backend().build(&index)).await?;
    Ok(())
}
