use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use roomwise_core::domain::user::{User, UserId};
use roomwise_core::errors::StoreError;
use roomwise_core::store::Directory;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlDirectory {
    pool: DbPool,
}

impl SqlDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, display_name, organization FROM app_user WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    /// SQLite's `lower()` only folds ASCII, so tags are compared in Rust.
    pub async fn find_by_organization(&self, organization: &str) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, display_name, organization
             FROM app_user
             WHERE organization IS NOT NULL
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut members = Vec::new();
        for row in rows {
            let user = user_from_row(row)?;
            if user.belongs_to(organization) {
                members.push(user);
            }
        }
        Ok(members)
    }

    pub async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, display_name, organization) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                organization = excluded.organization",
        )
        .bind(&user.id.0)
        .bind(&user.display_name)
        .bind(user.organization.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.find_by_id(id).await?)
    }

    async fn members_of(&self, organization: &str) -> Result<Vec<User>, StoreError> {
        Ok(self.find_by_organization(organization).await?)
    }
}

fn user_from_row(row: SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        display_name: row.try_get("display_name")?,
        organization: row.try_get("organization")?,
    })
}
