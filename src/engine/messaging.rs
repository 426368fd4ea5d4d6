//! Connection chat and project chat.

use tracing::info;

use super::notifications::emit_to_managers;
use super::{load_connection, load_project, load_project_member};
use super::Engine;
use crate::auth::AuthContext;
use crate::error::{Result, SignHubError};
use crate::model::{ConnectionStatus, Identity, NotificationType, ProjectMemberStatus};
use crate::validation;

impl Engine {
    /// The caller's active company must be a party to the connection.
    /// Succeeds for Pending or Accepted; rejected for Blocked.
    pub async fn send_connection_chat(&self, identity: Identity, connection_id: i64, text: &str) -> Result<i64> {
        validation::validate_chat_text(text)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_member()?;

        let connection = load_connection(&tx, connection_id)?;
        if !connection.involves(company_id) {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }
        if connection.status == ConnectionStatus::Blocked {
            return Err(SignHubError::invalid_state("BlockedConnection"));
        }

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO connection_chat (connection_id, sender, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            (connection_id, identity, text.trim(), now),
        )?;
        let chat_id = tx.last_insert_rowid();

        let other_company = connection.other(company_id);
        emit_to_managers(&tx, &*self.clock, other_company, NotificationType::ChatMessage, &connection_id.to_string())?;

        tx.commit()?;
        info!(connection_id, "connection chat sent");
        Ok(chat_id)
    }

    /// The caller's active company must have an Accepted ProjectMember
    /// row for this project.
    pub async fn send_project_chat(&self, identity: Identity, project_id: i64, text: &str) -> Result<i64> {
        validation::validate_chat_text(text)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_member()?;

        load_project(&tx, project_id)?;
        let membership = load_project_member(&tx, project_id, company_id)?;
        match membership {
            Some(m) if m.status == ProjectMemberStatus::Accepted => {}
            _ => return Err(SignHubError::not_permitted("NotAMember")),
        }

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO project_chat (project_id, sender, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            (project_id, identity, text.trim(), now),
        )?;
        let chat_id = tx.last_insert_rowid();

        let mut stmt = tx.prepare(
            "SELECT company_id FROM project_member WHERE project_id = ?1 AND status = 'accepted' AND company_id != ?2",
        )?;
        let other_companies: Vec<i64> = stmt
            .query_map((project_id, company_id), |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);
        for other_company in other_companies {
            emit_to_managers(&tx, &*self.clock, other_company, NotificationType::ProjectChat, &project_id.to_string())?;
        }

        tx.commit()?;
        info!(project_id, "project chat sent");
        Ok(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::db::test_db;
    use crate::invite_code::SequentialCodeRng;
    use std::sync::Arc;

    fn test_engine() -> Engine {
        Engine::new(test_db(), Arc::new(FixedClock::starting_at(1)), Arc::new(SequentialCodeRng::new()), 1000)
    }

    async fn make_company(engine: &Engine, owner: Identity, slug: &str) -> i64 {
        engine.create_account(owner, "Owner", "o", "o@test").await.unwrap();
        engine.create_company(owner, slug, slug, "NL").await.unwrap().id
    }

    #[tokio::test]
    async fn chat_blocked_on_pending_then_preserved_across_accept() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        let company_a = make_company(&engine, alice, "alpha").await;
        let company_b = make_company(&engine, bob, "beta").await;

        engine.request_connection(alice, company_b, "hi").await.unwrap();
        let connection_id: i64 = {
            let conn = engine.db.lock().await;
            conn.query_row(
                "SELECT id FROM connection WHERE company_a = ?1 AND company_b = ?2",
                (company_a.min(company_b), company_a.max(company_b)),
                |r| r.get(0),
            )
            .unwrap()
        };

        engine.send_connection_chat(alice, connection_id, "one").await.unwrap();
        engine.send_connection_chat(alice, connection_id, "two").await.unwrap();

        engine.accept_connection(bob, company_a).await.unwrap();
        engine.send_connection_chat(alice, connection_id, "three").await.unwrap();

        let conn = engine.db.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM connection_chat WHERE connection_id = ?1", [connection_id], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn chat_rejected_when_blocked() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        let company_a = make_company(&engine, alice, "alpha").await;
        let company_b = make_company(&engine, bob, "beta").await;

        engine.request_connection(alice, company_b, "hi").await.unwrap();
        let connection_id: i64 = {
            let conn = engine.db.lock().await;
            conn.query_row(
                "SELECT id FROM connection WHERE company_a = ?1 AND company_b = ?2",
                (company_a.min(company_b), company_a.max(company_b)),
                |r| r.get(0),
            )
            .unwrap()
        };
        engine.block_company(bob, company_a).await.unwrap();

        let err = engine.send_connection_chat(alice, connection_id, "hello").await.unwrap_err();
        assert!(err.to_string().contains("BlockedConnection"));
    }
}
