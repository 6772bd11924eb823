use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a batch of punches reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    #[sea_orm(string_value = "PUSH")]
    Push,
    #[sea_orm(string_value = "PULL")]
    Pull,
    #[sea_orm(string_value = "MANUAL_FILE")]
    ManualFile,
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadType::Push => "PUSH",
            LoadType::Pull => "PULL",
            LoadType::ManualFile => "MANUAL_FILE",
        };
        f.write_str(label)
    }
}
