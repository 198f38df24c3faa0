//! PostgreSQL implementation of UserStore.
//!
//! Reads and writes the `billing_users` table created by
//! `migrations/0001_create_billing_users.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::billing::{LocalUser, UserField};
use crate::domain::foundation::{CustomerRef, Timestamp, UserId};
use crate::ports::{UserStore, UserStoreError};

/// PostgreSQL implementation of the UserStore port.
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), UserStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| UserStoreError::unavailable(format!("Migration failed: {}", e)))
    }
}

/// Database row representation of a user.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    customer_ref: Option<String>,
    allowed_access_until: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for LocalUser {
    type Error = UserStoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = UserId::new(row.id)
            .map_err(|e| UserStoreError::unavailable(format!("Invalid user id: {}", e)))?;
        let customer_ref = row
            .customer_ref
            .filter(|c| !c.is_empty())
            .map(CustomerRef::new)
            .transpose()
            .map_err(|e| UserStoreError::unavailable(format!("Invalid customer ref: {}", e)))?;

        Ok(LocalUser {
            id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            is_authenticated: row.is_active,
            customer_ref,
            allowed_access_until: row.allowed_access_until.map(Timestamp::from_datetime),
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> UserStoreError {
    UserStoreError::unavailable(format!("Failed to {}: {}", action, e))
}

fn push_field(
    separated: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>,
    user: &LocalUser,
    field: UserField,
) {
    separated.push(format!("{} = ", field.column()));
    match field {
        UserField::Email => separated.push_bind_unseparated(user.email.clone()),
        UserField::FirstName => separated.push_bind_unseparated(user.first_name.clone()),
        UserField::LastName => separated.push_bind_unseparated(user.last_name.clone()),
        UserField::CustomerRef => separated
            .push_bind_unseparated(user.customer_ref.as_ref().map(|c| c.as_str().to_string())),
        UserField::AllowedAccessUntil => separated
            .push_bind_unseparated(user.allowed_access_until.map(|t| *t.as_datetime())),
    };
}

const ALL_FIELDS: [UserField; 5] = [
    UserField::Email,
    UserField::FirstName,
    UserField::LastName,
    UserField::CustomerRef,
    UserField::AllowedAccessUntil,
];

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get_by_id(&self, id: &UserId) -> Result<LocalUser, UserStoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, first_name, last_name, is_active, customer_ref, allowed_access_until
            FROM billing_users
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load user", e))?;

        row.ok_or_else(|| UserStoreError::NotFound(id.clone()))?
            .try_into()
    }

    async fn insert(&self, user: &LocalUser) -> Result<(), UserStoreError> {
        sqlx::query(
            r#"
            INSERT INTO billing_users (
                id, email, first_name, last_name, is_active, customer_ref, allowed_access_until
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_authenticated)
        .bind(user.customer_ref.as_ref().map(|c| c.as_str()))
        .bind(user.allowed_access_until.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("billing_users_pkey") {
                    return UserStoreError::AlreadyExists(user.id.clone());
                }
            }
            db_error("insert user", e)
        })?;

        Ok(())
    }

    async fn save(
        &self,
        user: &LocalUser,
        changed_fields: Option<&[UserField]>,
    ) -> Result<(), UserStoreError> {
        let fields = changed_fields.unwrap_or(&ALL_FIELDS);
        if fields.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE billing_users SET ");
        {
            let mut separated = builder.separated(", ");
            for field in fields {
                push_field(&mut separated, user, *field);
            }
        }
        builder.push(", updated_at = NOW() WHERE id = ");
        builder.push_bind(user.id.as_str().to_string());

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("save user", e))?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::NotFound(user.id.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> UserRow {
        UserRow {
            id: "42".into(),
            email: "ada@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            is_active: true,
            customer_ref: Some("cus_1".into()),
            allowed_access_until: None,
        }
    }

    #[test]
    fn row_converts_to_user() {
        let user = LocalUser::try_from(row()).unwrap();
        assert_eq!(user.id.as_str(), "42");
        assert!(user.is_authenticated);
        assert_eq!(user.customer_ref.unwrap().as_str(), "cus_1");
    }

    #[test]
    fn empty_customer_ref_column_reads_as_none() {
        let mut r = row();
        r.customer_ref = Some(String::new());
        assert!(LocalUser::try_from(r).unwrap().customer_ref.is_none());
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut r = row();
        r.id = String::new();
        assert!(matches!(
            LocalUser::try_from(r),
            Err(UserStoreError::Unavailable(_))
        ));
    }

    // Query tests require a running PostgreSQL instance:
    //
    // #[sqlx::test]
    // async fn save_writes_only_changed_columns(pool: PgPool) { ... }
}
