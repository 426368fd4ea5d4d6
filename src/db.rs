use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Open (creating if necessary) the SQLite database at `path` and run
/// migrations.
pub fn open(path: &Path) -> Result<Connection> {
    info!("opening database at {}", path.display());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;

    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    migrate(&conn)?;
    Ok(conn)
}

/// Run database migrations. Exposed for tests that use in-memory DBs.
///
/// Every statement is `CREATE TABLE/INDEX IF NOT EXISTS` — safe to call on
/// every startup and idempotent under repeated test invocation.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- One row per identity.
        CREATE TABLE IF NOT EXISTS account (
            identity          TEXT PRIMARY KEY NOT NULL,
            full_name         TEXT NOT NULL,
            nickname          TEXT NOT NULL,
            email             TEXT NOT NULL,
            active_company_id INTEGER REFERENCES company(id),
            created_at        INTEGER NOT NULL
        );

        -- Company. slug is unique, lowercase kebab (validated in validation.rs).
        CREATE TABLE IF NOT EXISTS company (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            slug        TEXT NOT NULL,
            location    TEXT NOT NULL,
            bio         TEXT NOT NULL DEFAULT '',
            kvk_number  TEXT NOT NULL DEFAULT '',
            is_public   INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_company_slug ON company(slug);

        -- 1:1 with company. Created atomically with it, deleted with it.
        CREATE TABLE IF NOT EXISTS capability (
            company_id       INTEGER PRIMARY KEY REFERENCES company(id),
            can_install      INTEGER NOT NULL DEFAULT 0,
            has_cnc          INTEGER NOT NULL DEFAULT 0,
            has_large_format INTEGER NOT NULL DEFAULT 0,
            has_bucket_truck INTEGER NOT NULL DEFAULT 0
        );

        -- (account x company). role is one of Owner/Admin/Member/Field/Installer/Pending.
        CREATE TABLE IF NOT EXISTS membership (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            identity    TEXT NOT NULL REFERENCES account(identity),
            company_id  INTEGER NOT NULL REFERENCES company(id),
            role        TEXT NOT NULL,
            joined_at   INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_membership_identity_company ON membership(identity, company_id);
        CREATE INDEX IF NOT EXISTS idx_membership_company ON membership(company_id);

        -- code is 16 chars from the invite-code alphabet, stored canonicalized
        -- with dashes (see invite_code.rs).
        CREATE TABLE IF NOT EXISTS invite_code (
            code           TEXT PRIMARY KEY NOT NULL,
            company_id     INTEGER NOT NULL REFERENCES company(id),
            created_by     TEXT NOT NULL,
            max_uses       INTEGER NOT NULL,
            uses_remaining INTEGER NOT NULL,
            created_at     INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_invite_code_company ON invite_code(company_id);

        -- Pairwise company relation, canonical company_a < company_b.
        CREATE TABLE IF NOT EXISTS connection (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            company_a           INTEGER NOT NULL REFERENCES company(id),
            company_b           INTEGER NOT NULL REFERENCES company(id),
            status              TEXT NOT NULL,
            requested_by        TEXT NOT NULL,
            initial_message     TEXT NOT NULL DEFAULT '',
            blocking_company_id INTEGER REFERENCES company(id),
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_connection_pair ON connection(company_a, company_b);
        CREATE INDEX IF NOT EXISTS idx_connection_company_a ON connection(company_a);
        CREATE INDEX IF NOT EXISTS idx_connection_company_b ON connection(company_b);

        CREATE TABLE IF NOT EXISTS connection_chat (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            connection_id INTEGER NOT NULL REFERENCES connection(id),
            sender        TEXT NOT NULL,
            text          TEXT NOT NULL,
            created_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_connection_chat_connection ON connection_chat(connection_id);

        CREATE TABLE IF NOT EXISTS project (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_company_id  INTEGER NOT NULL REFERENCES company(id),
            name              TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            created_at        INTEGER NOT NULL
        );

        -- (project x company). The owner company's row is inserted Accepted
        -- at project creation.
        CREATE TABLE IF NOT EXISTS project_member (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id  INTEGER NOT NULL REFERENCES project(id),
            company_id  INTEGER NOT NULL REFERENCES company(id),
            status      TEXT NOT NULL,
            invited_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_project_member_pair ON project_member(project_id, company_id);
        CREATE INDEX IF NOT EXISTS idx_project_member_company ON project_member(company_id);
        CREATE INDEX IF NOT EXISTS idx_project_member_project ON project_member(project_id);

        CREATE TABLE IF NOT EXISTS project_chat (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id  INTEGER NOT NULL REFERENCES project(id),
            sender      TEXT NOT NULL,
            text        TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_project_chat_project ON project_chat(project_id);

        -- notification_type is the tagged-union discriminant; payload carries
        -- the JSON-encoded entity ids the title/body templates were rendered
        -- from, so a subscriber can re-render without a join.
        CREATE TABLE IF NOT EXISTS notification (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_identity TEXT NOT NULL,
            company_id         INTEGER NOT NULL REFERENCES company(id),
            notification_type  TEXT NOT NULL,
            payload            TEXT NOT NULL DEFAULT '{}',
            title              TEXT NOT NULL,
            body               TEXT NOT NULL,
            is_read            INTEGER NOT NULL DEFAULT 0,
            created_at         INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notification_recipient_company ON notification(recipient_identity, company_id);
        ",
    )?;

    info!("database migrations complete");
    Ok(())
}

/// Creates an in-memory database with migrations applied. Use in tests.
#[cfg(test)]
pub(crate) fn test_db() -> std::sync::Arc<tokio::sync::Mutex<Connection>> {
    use std::sync::Arc;

    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    migrate(&conn).unwrap();
    Arc::new(tokio::sync::Mutex::new(conn))
}
