//! User store
//!
//! Five operations over the `users` table:
//! - create: INSERT ... RETURNING id
//! - get / list: active rows only, list ordered by (created_at, id)
//! - update: email of an existing active row, never inserts
//! - delete: flips `active` to false

use tracing::debug;
use userbase_core::{DatabaseClient, Row, SqlValue};

use super::error::{context, StoreError};
use crate::models::{EmailAddress, Username};

const INSERT_USER: &str = r#"
    INSERT INTO users (username, email_address, active)
    VALUES ($1, $2, $3)
    RETURNING id
"#;

const SELECT_USER: &str = r#"
    SELECT id, username, email_address, created_at, updated_at
    FROM users
    WHERE id = $1::UUID AND active = $2
    LIMIT $3
"#;

const SELECT_USERS: &str = r#"
    SELECT id, username, email_address, created_at, updated_at
    FROM users
    WHERE active = $1
    ORDER BY created_at, id
    LIMIT $2 OFFSET $3
"#;

const UPDATE_USER_EMAIL: &str = r#"
    UPDATE users
    SET email_address = $2, updated_at = now()
    WHERE id = $1::UUID AND active = $3
    RETURNING id
"#;

const SOFT_DELETE_USER: &str = r#"
    UPDATE users
    SET active = $1
    WHERE id = $2::UUID
"#;

/// User repository bound to one database client.
///
/// Cheap to construct; handlers build one per request from the shared
/// read or write client.
pub struct UserStore<'a> {
    client: &'a DatabaseClient,
}

impl<'a> UserStore<'a> {
    pub fn new(client: &'a DatabaseClient) -> Self {
        Self { client }
    }

    /// Insert a user and return its generated id.
    pub async fn new_user(
        &self,
        username: &Username,
        email_address: &EmailAddress,
        active: bool,
    ) -> Result<String, StoreError> {
        const OP: &str = "create user";

        let rows = self
            .client
            .execute_write(
                INSERT_USER,
                &[
                    username.as_str().into(),
                    email_address.as_str().into(),
                    active.into(),
                ],
            )
            .await
            .map_err(context(OP))?
            .into_rows();

        let id = rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(SqlValue::to_id_string)
            .ok_or(StoreError::UnexpectedResult {
                operation: OP,
                reason: "insert returned no id",
            })?;

        debug!(user_id = %id, "created user");
        Ok(id)
    }

    /// Fetch one active user. `None` when no active row has this id.
    pub async fn get_user(&self, id: &str) -> Result<Option<Row>, StoreError> {
        let rows = self
            .client
            .execute_read(SELECT_USER, &[id.into(), true.into(), SqlValue::Int(1)])
            .await
            .map_err(context("get user"))?;

        Ok(rows.into_iter().next())
    }

    /// List active users, skipping `offset` rows.
    ///
    /// No upper bound on `limit` is enforced here; the HTTP layer caps it.
    pub async fn get_users(&self, offset: u64, limit: u64) -> Result<Vec<Row>, StoreError> {
        self.client
            .execute_read(
                SELECT_USERS,
                &[true.into(), to_sql_int(limit), to_sql_int(offset)],
            )
            .await
            .map_err(context("get users"))
    }

    /// Replace the email of an existing active user.
    ///
    /// Returns `false` when no active user has this id; nothing is inserted.
    pub async fn update_user(
        &self,
        id: &str,
        email_address: &EmailAddress,
    ) -> Result<bool, StoreError> {
        let outcome = self
            .client
            .execute_write(
                UPDATE_USER_EMAIL,
                &[id.into(), email_address.as_str().into(), true.into()],
            )
            .await
            .map_err(context("update user"))?;

        let updated = outcome.rows_affected() > 0;
        debug!(user_id = %id, updated, "updated user email");
        Ok(updated)
    }

    /// Mark a user inactive. Unknown or already deleted ids are not errors.
    pub async fn delete_user(&self, id: &str) -> Result<(), StoreError> {
        let outcome = self
            .client
            .execute_write(SOFT_DELETE_USER, &[false.into(), id.into()])
            .await
            .map_err(context("delete user"))?;

        debug!(user_id = %id, rows = outcome.rows_affected(), "soft-deleted user");
        Ok(())
    }
}

fn to_sql_int(n: u64) -> SqlValue {
    SqlValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use userbase_core::mock::{MockConnector, MockPool};
    use userbase_core::{AccessMode, DatabaseSettings, PoolKind};

    const ID: &str = "6f1c2a0e-2f5b-4c1d-9b7a-0d8e7c6b5a41";

    async fn write_client() -> (DatabaseClient, Arc<MockPool>) {
        let connector = Arc::new(MockConnector::new());
        let settings = DatabaseSettings {
            read_write_url: Some("postgres://primary/users".into()),
            ..Default::default()
        };
        let client = DatabaseClient::with_connector(AccessMode::Write, &settings, connector.clone());
        client.connect().await.unwrap();
        let pool = connector.pool(PoolKind::ReadWrite).unwrap();
        (client, pool)
    }

    fn alice() -> (Username, EmailAddress) {
        (
            Username::new("alice").unwrap(),
            EmailAddress::new("alice@example.com").unwrap(),
        )
    }

    #[tokio::test]
    async fn new_user_returns_generated_id() {
        let (client, pool) = write_client().await;
        pool.push_rows(vec![Row::new().with("id", uuid::Uuid::parse_str(ID).unwrap())]);
        let (username, email) = alice();

        let id = UserStore::new(&client).new_user(&username, &email, true).await.unwrap();

        assert_eq!(id, ID);
        let statement = pool.last_statement().unwrap();
        assert!(statement.query.contains("RETURNING id"));
        assert_eq!(
            statement.args,
            vec![
                SqlValue::from("alice"),
                SqlValue::from("alice@example.com"),
                SqlValue::Bool(true)
            ]
        );
    }

    #[tokio::test]
    async fn new_user_without_id_is_unexpected() {
        let (client, _pool) = write_client().await;
        let (username, email) = alice();

        let err = UserStore::new(&client)
            .new_user(&username, &email, true)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UnexpectedResult { .. }));
        assert_eq!(err.operation(), "create user");
    }

    #[tokio::test]
    async fn constraint_violation_is_wrapped() {
        let (client, pool) = write_client().await;
        pool.push_failure("duplicate key value violates unique constraint");
        let (username, email) = alice();

        let err = UserStore::new(&client)
            .new_user(&username, &email, true)
            .await
            .unwrap_err();

        assert_eq!(err.operation(), "create user");
        assert!(err.db_error().unwrap().is_database());
        assert!(err.to_string().starts_with("failed to create user"));
    }

    #[tokio::test]
    async fn get_user_filters_active_and_caps_rows() {
        let (client, pool) = write_client().await;
        pool.push_rows(vec![Row::new().with("id", ID).with("username", "alice")]);

        let row = UserStore::new(&client).get_user(ID).await.unwrap().unwrap();
        assert_eq!(row.get_str("username"), Some("alice"));

        let statement = pool.last_statement().unwrap();
        assert!(statement.query.contains("active = $2"));
        assert!(statement.query.contains("LIMIT $3"));
        assert_eq!(
            statement.args,
            vec![SqlValue::from(ID), SqlValue::Bool(true), SqlValue::Int(1)]
        );
    }

    #[tokio::test]
    async fn get_user_missing_is_none() {
        let (client, _pool) = write_client().await;
        assert!(UserStore::new(&client).get_user(ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_users_binds_page_with_stable_order() {
        let (client, pool) = write_client().await;
        pool.push_rows(vec![Row::new().with("username", "a"), Row::new().with("username", "b")]);

        let rows = UserStore::new(&client).get_users(2, 2).await.unwrap();
        assert_eq!(rows.len(), 2);

        let statement = pool.last_statement().unwrap();
        assert!(statement.query.contains("ORDER BY created_at, id"));
        assert_eq!(
            statement.args,
            vec![SqlValue::Bool(true), SqlValue::Int(2), SqlValue::Int(2)]
        );
    }

    #[tokio::test]
    async fn update_user_reports_missing_row() {
        let (client, pool) = write_client().await;
        let email = EmailAddress::new("alice2@example.com").unwrap();
        let store = UserStore::new(&client);

        pool.push_rows(vec![Row::new().with("id", ID)]);
        assert!(store.update_user(ID, &email).await.unwrap());

        pool.push_rows(vec![]);
        assert!(!store.update_user(ID, &email).await.unwrap());

        let statement = pool.last_statement().unwrap();
        assert!(statement.query.trim_start().starts_with("UPDATE users"));
        assert!(!statement.query.contains("INSERT"));
    }

    #[tokio::test]
    async fn delete_user_twice_is_not_an_error() {
        let (client, pool) = write_client().await;
        let store = UserStore::new(&client);

        pool.push_affected(1);
        store.delete_user(ID).await.unwrap();
        pool.push_affected(0);
        store.delete_user(ID).await.unwrap();

        let statements = pool.statements();
        assert_eq!(statements.len(), 2);
        for statement in statements {
            assert!(!statement.fetched);
            assert_eq!(statement.args, vec![SqlValue::Bool(false), SqlValue::from(ID)]);
        }
    }

    #[tokio::test]
    async fn closed_client_surfaces_configuration_error() {
        let (client, _pool) = write_client().await;
        client.disconnect().await;

        let err = UserStore::new(&client).get_users(0, 10).await.unwrap_err();
        assert_eq!(err.operation(), "get users");
        assert!(err.db_error().unwrap().is_configuration());
    }
}
