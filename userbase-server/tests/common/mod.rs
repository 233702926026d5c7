//! Shared setup for database-backed tests
//!
//! Both clients point at `DATABASE_URL`. The `users` table is created when
//! missing so a fresh Postgres or CockroachDB instance works as-is.

use userbase_core::DatabaseSettings;
use userbase_server::models::{EmailAddress, Username};
use userbase_server::AppContext;

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        username TEXT NOT NULL UNIQUE,
        email_address TEXT NOT NULL,
        active BOOL NOT NULL DEFAULT true,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

pub async fn connected_context() -> AppContext {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let settings = DatabaseSettings {
        read_only_url: Some(url.clone()),
        read_write_url: Some(url),
        ..Default::default()
    };

    let ctx = AppContext::new(&settings);
    ctx.connect().await.expect("connect to DATABASE_URL");
    ctx.write_client()
        .execute_write(CREATE_USERS, &[])
        .await
        .expect("create users table");
    ctx
}

/// Username that no other test run will collide with
pub fn unique_username() -> Username {
    Username::new(&format!("user{}", uuid::Uuid::new_v4().simple())).unwrap()
}

pub fn email(s: &str) -> EmailAddress {
    EmailAddress::new(s).unwrap()
}
