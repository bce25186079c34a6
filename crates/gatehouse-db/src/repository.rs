//! Database repository implementation

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::DbError;
use crate::models::{NewUser, Role, User};

/// Database connection and operations
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Get the underlying pool for advanced usage
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        // Emails are matched case-insensitively; NOCASE keeps the unique
        // index aligned with lookup semantics.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name TEXT,
                password_hash TEXT,
                role TEXT NOT NULL,
                email_verified_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email COLLATE NOCASE)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }

    // ==================== User Operations ====================

    /// Insert a new user
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        // Check if user already exists
        let existing = self.get_user_by_email(&user.email).await?;
        if existing.is_some() {
            return Err(DbError::Duplicate(format!(
                "User '{}' already exists",
                user.email
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (email, name, password_hash, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by email (case-insensitive)
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, role, email_verified_at, created_at, updated_at
            FROM users
            WHERE email = ? COLLATE NOCASE
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, role, email_verified_at, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| User::try_from(&row).map_err(DbError::from))
            .transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, name, password_hash, role, email_verified_at, created_at, updated_at
            FROM users
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Update user role
    pub async fn update_user_role(&self, id: i64, role: Role) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(role.as_str())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update user password
    pub async fn update_user_password(&self, id: i64, password_hash: &str) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    fn new_user(email: &str, role: Role) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: Some("Test User".to_string()),
            password_hash: Some("$argon2id$stub".to_string()),
            role,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_case_insensitive() {
        let db = test_db().await;
        let user = db.insert_user(new_user("Admin@Example.com", Role::Admin)).await.unwrap();

        let found = db.get_user_by_email("admin@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Admin);

        let found = db.get_user_by_email("ADMIN@EXAMPLE.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = test_db().await;
        db.insert_user(new_user("a@b.com", Role::User)).await.unwrap();

        let result = db.insert_user(new_user("A@B.com", Role::User)).await;
        assert!(matches!(result, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_update_role_and_password() {
        let db = test_db().await;
        let user = db.insert_user(new_user("a@b.com", Role::User)).await.unwrap();

        assert!(db.update_user_role(user.id, Role::Admin).await.unwrap());
        assert!(db.update_user_password(user.id, "$argon2id$other").await.unwrap());

        let updated = db.get_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.password_hash.as_deref(), Some("$argon2id$other"));

        // Unknown id reports no rows touched
        assert!(!db.update_user_role(9999, Role::User).await.unwrap());
    }

    #[tokio::test]
    async fn test_has_users_and_delete() {
        let db = test_db().await;
        assert!(!db.has_users().await.unwrap());

        let user = db.insert_user(new_user("a@b.com", Role::User)).await.unwrap();
        assert!(db.has_users().await.unwrap());

        assert!(db.delete_user(user.id).await.unwrap());
        assert!(!db.has_users().await.unwrap());
        assert!(!db.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_federated_account_has_no_hash() {
        let db = test_db().await;
        db.insert_user(NewUser {
            email: "sso@b.com".to_string(),
            name: None,
            password_hash: None,
            role: Role::User,
        })
        .await
        .unwrap();

        let found = db.get_user_by_email("sso@b.com").await.unwrap().unwrap();
        assert!(found.password_hash.is_none());
    }
}
