use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use std::sync::Arc;

use crate::db::entities::employee_code;

/// Internal employee identity as known to the HR directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmployeeRef {
    pub employee_id: i32,
}

/// Canonical form of a terminal user code: surrounding whitespace and
/// leading zeros removed. A code made only of zeros has no canonical form.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().trim_start_matches('0');
    if code.is_empty() {
        None
    } else {
        Some(code.to_owned())
    }
}

/// Lookup seam onto the HR employee directory. Implementations receive codes
/// that are already normalized.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<EmployeeRef>, DbErr>;
}

/// Directory backed by the `employee_biometric_codes` table.
#[derive(Clone, Debug)]
pub struct DbEmployeeDirectory {
    db: DatabaseConnection,
}

impl DbEmployeeDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EmployeeDirectory for DbEmployeeDirectory {
    async fn find_by_code(&self, code: &str) -> Result<Option<EmployeeRef>, DbErr> {
        let found = employee_code::Entity::find()
            .filter(employee_code::Column::Code.eq(code))
            .one(&self.db)
            .await?;
        Ok(found.map(|row| EmployeeRef {
            employee_id: row.employee_id,
        }))
    }
}

#[derive(Clone)]
pub struct EmployeeResolver {
    directory: Arc<dyn EmployeeDirectory>,
}

impl EmployeeResolver {
    pub fn new(directory: Arc<dyn EmployeeDirectory>) -> Self {
        Self { directory }
    }

    /// `Ok(None)` means the code is not enrolled; callers skip the line.
    pub async fn resolve(&self, raw_code: &str) -> Result<Option<EmployeeRef>, DbErr> {
        match normalize_code(raw_code) {
            Some(code) => self.directory.find_by_code(&code).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("0007").as_deref(), Some("7"));
        assert_eq!(normalize_code("7").as_deref(), Some("7"));
        assert_eq!(normalize_code(" 0120 ").as_deref(), Some("120"));
        assert_eq!(normalize_code("000"), None);
        assert_eq!(normalize_code(""), None);
    }

    #[tokio::test]
    async fn test_padded_and_plain_codes_resolve_to_same_employee() {
        let db = test_support::memory_db().await;
        test_support::register_employee(&db, 42, "0007").await;
        let resolver = EmployeeResolver::new(Arc::new(DbEmployeeDirectory::new(db.clone())));

        let padded = resolver.resolve("0007").await.unwrap();
        let plain = resolver.resolve("7").await.unwrap();
        assert_eq!(padded, Some(EmployeeRef { employee_id: 42 }));
        assert_eq!(padded, plain);
    }

    #[tokio::test]
    async fn test_unknown_code_resolves_to_none() {
        let db = test_support::memory_db().await;
        let resolver = EmployeeResolver::new(Arc::new(DbEmployeeDirectory::new(db)));
        assert_eq!(resolver.resolve("9999").await.unwrap(), None);
        assert_eq!(resolver.resolve("0000").await.unwrap(), None);
    }

}
