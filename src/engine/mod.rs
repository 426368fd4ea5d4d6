//! The transactional domain engine: construction plus the row loaders
//! shared by more than one operation module. Each named operation lives
//! as an `impl Engine` method in its own module (`accounts`,
//! `companies`, `membership`, `connections`, `messaging`, `projects`,
//! `notifications`) — this file only owns the struct and the
//! cross-cutting lookups.

pub mod accounts;
pub mod companies;
pub mod connections;
pub mod membership;
pub mod messaging;
pub mod notifications;
pub mod projects;

use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use crate::clock::Clock;
use crate::error::{Result, SignHubError};
use crate::invite_code::CodeRng;
use crate::model::{
    Account, Company, Connection as ConnectionRow, ConnectionStatus, Identity, Project,
    ProjectMember, ProjectMemberStatus, Role,
};

/// The transactional domain engine. Holds the shared SQLite connection
/// and the clock/RNG oracles, and exposes one async method per named
/// operation. Every operation opens a single `rusqlite::Transaction`,
/// does all its reads/writes against it, and commits at the end (or
/// drops it as a rollback on any `?` short-circuit) — one serializable
/// transaction per operation.
///
/// The `tokio::sync::Mutex` around the connection serializes callers —
/// one operation's transaction runs to completion before the next
/// begins.
pub struct Engine {
    pub(crate) db: Arc<Mutex<Connection>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: Arc<dyn CodeRng>,
    pub(crate) invite_code_max_attempts: u32,
    pub(crate) operation_timeout: Duration,
}

impl Engine {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn CodeRng>,
        invite_code_max_attempts: u32,
    ) -> Self {
        Self::with_timeout(db, clock, rng, invite_code_max_attempts, Duration::from_secs(5))
    }

    pub fn with_timeout(
        db: Arc<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn CodeRng>,
        invite_code_max_attempts: u32,
        operation_timeout: Duration,
    ) -> Self {
        Self { db, clock, rng, invite_code_max_attempts, operation_timeout }
    }

    /// Acquire the shared connection, bounded by `operation_timeout`
    /// (spec §5: implementations MAY impose a wall-clock upper bound on
    /// any single operation). The mutex wait is the only point an
    /// operation can suspend — no operation awaits mid-transaction — so
    /// bounding it here bounds the whole operation.
    pub(crate) async fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        match tokio::time::timeout(self.operation_timeout, self.db.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(SignHubError::Timeout(self.operation_timeout)),
        }
    }
}

// ---------------------------------------------------------------------
// Shared row loaders. Each returns the named error on a missing row so
// call sites don't re-derive the NotFound phrase.
// ---------------------------------------------------------------------

pub(crate) fn load_account(tx: &Transaction, identity: Identity) -> Result<Account> {
    tx.query_row(
        "SELECT identity, full_name, nickname, email, active_company_id, created_at \
         FROM account WHERE identity = ?1",
        [identity],
        |row| {
            Ok(Account {
                identity: row.get(0)?,
                full_name: row.get(1)?,
                nickname: row.get(2)?,
                email: row.get(3)?,
                active_company_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| SignHubError::not_found("AccountNotFound"))
}

pub(crate) fn account_exists(conn: &Connection, identity: Identity) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM account WHERE identity = ?1",
        [identity],
        |r| r.get::<_, i64>(0),
    )? > 0)
}

pub(crate) fn load_company(tx: &Transaction, company_id: i64) -> Result<Company> {
    tx.query_row(
        "SELECT id, name, slug, location, bio, kvk_number, is_public, created_at \
         FROM company WHERE id = ?1",
        [company_id],
        |row| {
            Ok(Company {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                location: row.get(3)?,
                bio: row.get(4)?,
                kvk_number: row.get(5)?,
                is_public: row.get::<_, i64>(6)? != 0,
                created_at: row.get(7)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| SignHubError::not_found("CompanyNotFound"))
}

pub(crate) fn company_exists(conn: &Connection, company_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM company WHERE id = ?1",
        [company_id],
        |r| r.get::<_, i64>(0),
    )? > 0)
}

pub(crate) fn slug_taken(conn: &Connection, slug: &str, excluding: Option<i64>) -> Result<bool> {
    let taken = match excluding {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM company WHERE slug = ?1 AND id != ?2",
            (slug, id),
            |r| r.get::<_, i64>(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM company WHERE slug = ?1",
            [slug],
            |r| r.get::<_, i64>(0),
        )?,
    };
    Ok(taken > 0)
}

/// All identities holding a `can_manage` (Owner or Admin) membership in
/// `company_id`, used by notification fan-out.
pub(crate) fn manager_identities(tx: &Transaction, company_id: i64) -> Result<Vec<Identity>> {
    let mut stmt = tx.prepare(
        "SELECT identity FROM membership WHERE company_id = ?1 AND role IN ('owner', 'admin')",
    )?;
    let rows = stmt
        .query_map([company_id], |row| row.get::<_, Identity>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn row_to_connection(row: &rusqlite::Row) -> rusqlite::Result<ConnectionRow> {
    let status_str: String = row.get(3)?;
    Ok(ConnectionRow {
        id: row.get(0)?,
        company_a: row.get(1)?,
        company_b: row.get(2)?,
        status: ConnectionStatus::from_str(&status_str).unwrap_or(ConnectionStatus::Pending),
        requested_by: row.get(4)?,
        initial_message: row.get(5)?,
        blocking_company_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const CONNECTION_COLUMNS: &str = "id, company_a, company_b, status, requested_by, initial_message, blocking_company_id, created_at, updated_at";

pub(crate) fn load_connection(tx: &Transaction, connection_id: i64) -> Result<ConnectionRow> {
    tx.query_row(
        &format!("SELECT {CONNECTION_COLUMNS} FROM connection WHERE id = ?1"),
        [connection_id],
        row_to_connection,
    )
    .optional()?
    .ok_or_else(|| SignHubError::not_found("ConnectionNotFound"))
}

pub(crate) fn load_connection_by_pair(
    tx: &Transaction,
    company_a: i64,
    company_b: i64,
) -> Result<Option<ConnectionRow>> {
    tx.query_row(
        &format!("SELECT {CONNECTION_COLUMNS} FROM connection WHERE company_a = ?1 AND company_b = ?2"),
        (company_a, company_b),
        row_to_connection,
    )
    .optional()
    .map_err(SignHubError::from)
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        owner_company_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn load_project(tx: &Transaction, project_id: i64) -> Result<Project> {
    tx.query_row(
        "SELECT id, owner_company_id, name, description, created_at FROM project WHERE id = ?1",
        [project_id],
        row_to_project,
    )
    .optional()?
    .ok_or_else(|| SignHubError::not_found("ProjectNotFound"))
}

fn row_to_project_member(row: &rusqlite::Row) -> rusqlite::Result<ProjectMember> {
    let status_str: String = row.get(3)?;
    Ok(ProjectMember {
        id: row.get(0)?,
        project_id: row.get(1)?,
        company_id: row.get(2)?,
        status: ProjectMemberStatus::from_str(&status_str).unwrap_or(ProjectMemberStatus::Invited),
        invited_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

const PROJECT_MEMBER_COLUMNS: &str = "id, project_id, company_id, status, invited_at, updated_at";

pub(crate) fn load_project_member(
    tx: &Transaction,
    project_id: i64,
    company_id: i64,
) -> Result<Option<ProjectMember>> {
    tx.query_row(
        &format!("SELECT {PROJECT_MEMBER_COLUMNS} FROM project_member WHERE project_id = ?1 AND company_id = ?2"),
        (project_id, company_id),
        row_to_project_member,
    )
    .optional()
    .map_err(SignHubError::from)
}

/// Is `requested_by` a (non-Pending or Pending — membership of any kind
/// suffices) member of `company_id`? Used to derive which side of a
/// Connection originally requested it, since the row only stores the
/// requesting *identity*, not a requesting-company column. See DESIGN.md.
pub(crate) fn identity_belongs_to_company(
    tx: &Transaction,
    identity: Identity,
    company_id: i64,
) -> Result<bool> {
    Ok(tx.query_row(
        "SELECT COUNT(*) FROM membership WHERE identity = ?1 AND company_id = ?2",
        (identity, company_id),
        |r| r.get::<_, i64>(0),
    )? > 0)
}

pub(crate) fn role_rank_at_or_above(target: Role, caller: Role) -> bool {
    target.rank() >= caller.rank()
}

#[cfg(test)]
mod tests {
    //! End-to-end scenario tests exercising full operation sequences
    //! against `db::test_db()`, a `FixedClock`, and a `SequentialCodeRng`.

    use super::*;
    use crate::clock::FixedClock;
    use crate::db::test_db;
    use crate::invite_code::SequentialCodeRng;

    fn test_engine() -> Engine {
        Engine::new(
            test_db(),
            Arc::new(FixedClock::starting_at(1_000)),
            Arc::new(SequentialCodeRng::new()),
            1000,
        )
    }

    fn id(byte: u8) -> Identity {
        Identity([byte; 32])
    }

    #[tokio::test]
    async fn acquire_times_out_when_connection_held_elsewhere() {
        let engine = Engine::with_timeout(
            test_db(),
            Arc::new(FixedClock::starting_at(1)),
            Arc::new(SequentialCodeRng::new()),
            1000,
            std::time::Duration::from_millis(20),
        );
        let _held = engine.db.lock().await;
        let err = engine.create_account(id(1), "A", "a", "a@test").await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn scenario_signup_company_invite() {
        let engine = test_engine();
        let alice = id(1);

        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        let company = engine
            .create_company(alice, "Alpha Signs", "alpha-signs", "Amsterdam, NL")
            .await
            .unwrap();

        let active_company_id: Option<i64> = {
            let conn = engine.db.lock().await;
            conn.query_row(
                "SELECT active_company_id FROM account WHERE identity = ?1",
                [alice],
                |r| r.get(0),
            )
            .unwrap()
        };
        assert_eq!(active_company_id, Some(company.id));

        let code = engine.generate_invite_code(alice, 5).await.unwrap();
        assert_eq!(code.uses_remaining, 5);
        assert_eq!(code.max_uses, 5);
    }

    #[tokio::test]
    async fn scenario_join_flow() {
        let engine = test_engine();
        let alice = id(1);
        let bob = id(2);

        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        engine.create_company(alice, "Alpha Signs", "alpha-signs", "Amsterdam, NL").await.unwrap();
        let code = engine.generate_invite_code(alice, 5).await.unwrap();

        engine.create_account(bob, "Bob", "Bob", "bob@b.test").await.unwrap();
        engine.join_company(bob, &code.code).await.unwrap();

        let refreshed = {
            let conn = engine.db.lock().await;
            crate::auth::load_membership(&conn, bob, 1).unwrap()
        };
        let membership = refreshed.unwrap();
        assert_eq!(membership.role, Role::Pending);

        let code_after = {
            let conn = engine.db.lock().await;
            conn.query_row(
                "SELECT uses_remaining FROM invite_code WHERE code = ?1",
                [&code.code],
                |r| r.get::<_, i64>(0),
            )
            .unwrap()
        };
        assert_eq!(code_after, 4);
    }

    async fn role_of(engine: &Engine, identity: Identity, company_id: i64) -> Role {
        let conn = engine.db.lock().await;
        crate::auth::load_membership(&conn, identity, company_id).unwrap().unwrap().role
    }

    #[tokio::test]
    async fn scenario_ownership_transfer_is_an_involution() {
        let engine = test_engine();
        let alice = id(1);
        let carol = id(3);

        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        let company = engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap();
        let code = engine.generate_invite_code(alice, 5).await.unwrap();
        engine.create_account(carol, "Carol", "Carol", "carol@c.test").await.unwrap();
        engine.join_company(carol, &code.code).await.unwrap();
        engine.update_user_role(alice, carol, Role::Member).await.unwrap();
        engine.update_user_role(alice, carol, Role::Admin).await.unwrap();

        engine.transfer_ownership(alice, carol).await.unwrap();
        assert_eq!(role_of(&engine, alice, company.id).await, Role::Admin);
        assert_eq!(role_of(&engine, carol, company.id).await, Role::Owner);

        engine.transfer_ownership(carol, alice).await.unwrap();
        assert_eq!(role_of(&engine, alice, company.id).await, Role::Owner);
        assert_eq!(role_of(&engine, carol, company.id).await, Role::Admin);
    }

    #[tokio::test]
    async fn scenario_ghosting_hides_block() {
        let engine = test_engine();
        let alice = id(1);
        let bob = id(2);

        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        let company_a = engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap();
        engine.create_account(bob, "Bob", "Bob", "bob@b.test").await.unwrap();
        let company_b = engine.create_company(bob, "Beta", "beta", "NL").await.unwrap();

        engine.block_company(bob, company_a.id).await.unwrap();

        // A requests a connection to B; ghosting means this must return Ok
        // with no visible Pending row and no notification.
        engine.request_connection(alice, company_b.id, "hi").await.unwrap();

        let conn = engine.db.lock().await;
        let (lo, hi) = crate::model::canonical_pair(company_a.id, company_b.id);
        let status: String = conn
            .query_row(
                "SELECT status FROM connection WHERE company_a = ?1 AND company_b = ?2",
                (lo, hi),
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "blocked");

        let notif_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM notification WHERE recipient_identity = ?1",
                [bob],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(notif_count, 0);
    }
}
