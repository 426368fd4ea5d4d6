//! Centralized cascade-deletion rules. Declarative on purpose: every
//! operation that deletes a parent row calls exactly one of these
//! functions instead of hand-rolling its own fan-out.

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Delete a company and every row it owns, per the cascade table:
/// capability, memberships, invite codes, connections (+ their chats),
/// owned projects (+ members + chats), project_member rows for this
/// company in projects it doesn't own (+ the resulting orphaned chats),
/// and notifications scoped to it. Any account whose `active_company_id`
/// pointed here is reset to null.
///
/// Must run inside the caller's transaction.
pub fn delete_company(conn: &Connection, company_id: i64) -> Result<()> {
    conn.execute("DELETE FROM capability WHERE company_id = ?1", [company_id])?;
    conn.execute("DELETE FROM membership WHERE company_id = ?1", [company_id])?;
    conn.execute("DELETE FROM invite_code WHERE company_id = ?1", [company_id])?;

    let connection_ids: Vec<i64> = conn
        .prepare("SELECT id FROM connection WHERE company_a = ?1 OR company_b = ?1")?
        .query_map([company_id], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    for connection_id in connection_ids {
        delete_connection(conn, connection_id)?;
    }

    let owned_project_ids: Vec<i64> = conn
        .prepare("SELECT id FROM project WHERE owner_company_id = ?1")?
        .query_map([company_id], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    for project_id in owned_project_ids {
        delete_project(conn, project_id)?;
    }

    // This company's membership in projects it doesn't own: the row itself
    // and any chat it sent become orphaned once the company is gone.
    let foreign_project_ids: Vec<i64> = conn
        .prepare("SELECT project_id FROM project_member WHERE company_id = ?1")?
        .query_map([company_id], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    for project_id in foreign_project_ids {
        conn.execute(
            "DELETE FROM project_chat WHERE project_id = ?1 AND sender IN (SELECT identity FROM membership WHERE company_id = ?2)",
            (project_id, company_id),
        )?;
    }
    conn.execute("DELETE FROM project_member WHERE company_id = ?1", [company_id])?;

    conn.execute("DELETE FROM notification WHERE company_id = ?1", [company_id])?;

    conn.execute(
        "UPDATE account SET active_company_id = NULL WHERE active_company_id = ?1",
        [company_id],
    )?;

    conn.execute("DELETE FROM company WHERE id = ?1", [company_id])?;
    Ok(())
}

/// Delete a connection and its chat history.
pub fn delete_connection(conn: &Connection, connection_id: i64) -> Result<()> {
    conn.execute("DELETE FROM connection_chat WHERE connection_id = ?1", [connection_id])?;
    conn.execute("DELETE FROM connection WHERE id = ?1", [connection_id])?;
    Ok(())
}

/// Delete a project and all its members/chat.
pub fn delete_project(conn: &Connection, project_id: i64) -> Result<()> {
    conn.execute("DELETE FROM project_chat WHERE project_id = ?1", [project_id])?;
    conn.execute("DELETE FROM project_member WHERE project_id = ?1", [project_id])?;
    conn.execute("DELETE FROM project WHERE id = ?1", [project_id])?;
    Ok(())
}

/// Remove a single membership row and, if the affected account's active
/// company pointed here, reassign it to another non-Pending membership
/// (smallest id) or null — see invariant in `model::account`.
pub fn delete_membership_and_reassign_active(
    conn: &Connection,
    identity: crate::model::Identity,
    company_id: i64,
) -> Result<()> {
    conn.execute(
        "DELETE FROM membership WHERE identity = ?1 AND company_id = ?2",
        (identity, company_id),
    )?;

    let active_company_id: Option<i64> = conn.query_row(
        "SELECT active_company_id FROM account WHERE identity = ?1",
        [identity],
        |row| row.get(0),
    )?;

    if active_company_id == Some(company_id) {
        let replacement: Option<i64> = conn
            .query_row(
                "SELECT company_id FROM membership WHERE identity = ?1 AND role != 'pending' ORDER BY id ASC LIMIT 1",
                [identity],
                |row| row.get(0),
            )
            .optional_or_none()?;
        conn.execute(
            "UPDATE account SET active_company_id = ?2 WHERE identity = ?1",
            (identity, replacement),
        )?;
    }

    Ok(())
}

trait OptionalOrNone<T> {
    fn optional_or_none(self) -> Result<Option<T>>;
}

impl<T> OptionalOrNone<T> for std::result::Result<T, rusqlite::Error> {
    fn optional_or_none(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
