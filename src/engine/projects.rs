//! Project lifecycle and the ProjectMember state machine
//! (Invited/Accepted/Declined/Kicked/Left).

use tracing::info;

use super::notifications::emit_to_managers;
use super::{load_connection_by_pair, load_project, load_project_member, Engine};
use crate::auth::AuthContext;
use crate::cascade;
use crate::error::{Result, SignHubError};
use crate::model::{canonical_pair, ConnectionStatus, Identity, NotificationType, Project, ProjectMemberStatus};
use crate::validation;

impl Engine {
    pub async fn create_project(&self, identity: Identity, name: &str, description: &str) -> Result<Project> {
        validation::validate_project_name(name)?;
        validation::validate_project_description(description)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO project (owner_company_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            (company_id, name.trim(), description.trim(), now),
        )?;
        let project_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO project_member (project_id, company_id, status, invited_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
            (project_id, company_id, ProjectMemberStatus::Accepted.as_str(), now),
        )?;

        let project = load_project(&tx, project_id)?;
        tx.commit()?;
        info!(project_id, company_id, "project created");
        Ok(project)
    }

    /// Requires an existing Accepted connection between the owner company
    /// and the target. Re-uses a Declined/Kicked/Left row rather than
    /// inserting a second one — `updated_at` refreshes, but `invited_at`
    /// is left at the row's original value (DESIGN.md).
    pub async fn invite_to_project(&self, identity: Identity, project_id: i64, target_company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let project = load_project(&tx, project_id)?;
        if project.owner_company_id != company_id {
            return Err(SignHubError::not_permitted("OnlyOwnerCanInvite"));
        }
        if target_company_id == company_id {
            return Err(SignHubError::not_permitted("CannotInviteOwnCompany"));
        }

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let connection = load_connection_by_pair(&tx, lo, hi)?;
        match connection {
            Some(c) if c.status == ConnectionStatus::Accepted => {}
            _ => return Err(SignHubError::invalid_state("NoAcceptedConnection")),
        }

        let now = self.clock.now_micros();
        match load_project_member(&tx, project_id, target_company_id)? {
            Some(m) if matches!(m.status, ProjectMemberStatus::Invited | ProjectMemberStatus::Accepted) => {
                return Err(SignHubError::conflict("AlreadyInvited"));
            }
            Some(_reusable) => {
                tx.execute(
                    "UPDATE project_member SET status = ?3, updated_at = ?4 WHERE project_id = ?1 AND company_id = ?2",
                    (project_id, target_company_id, ProjectMemberStatus::Invited.as_str(), now),
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO project_member (project_id, company_id, status, invited_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                    (project_id, target_company_id, ProjectMemberStatus::Invited.as_str(), now),
                )?;
            }
        }

        emit_to_managers(&tx, &*self.clock, target_company_id, NotificationType::ProjectInvite, &project_id.to_string())?;

        tx.commit()?;
        info!(project_id, target_company_id, "project invite sent");
        Ok(())
    }

    pub async fn accept_project_invite(&self, identity: Identity, project_id: i64) -> Result<()> {
        self.resolve_invite(identity, project_id, ProjectMemberStatus::Accepted, NotificationType::ProjectAccepted).await
    }

    pub async fn decline_project_invite(&self, identity: Identity, project_id: i64) -> Result<()> {
        self.resolve_invite(identity, project_id, ProjectMemberStatus::Declined, NotificationType::ProjectDeclined).await
    }

    async fn resolve_invite(
        &self,
        identity: Identity,
        project_id: i64,
        resolution: ProjectMemberStatus,
        notification_type: NotificationType,
    ) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let project = load_project(&tx, project_id)?;
        let membership = load_project_member(&tx, project_id, company_id)?;
        match membership {
            Some(m) if m.status == ProjectMemberStatus::Invited => {}
            _ => return Err(SignHubError::not_found("NoPendingInvite")),
        }

        let now = self.clock.now_micros();
        tx.execute(
            "UPDATE project_member SET status = ?3, updated_at = ?4 WHERE project_id = ?1 AND company_id = ?2",
            (project_id, company_id, resolution.as_str(), now),
        )?;

        emit_to_managers(&tx, &*self.clock, project.owner_company_id, notification_type, &company_id.to_string())?;

        tx.commit()?;
        info!(project_id, company_id, status = resolution.as_str(), "project invite resolved");
        Ok(())
    }

    pub async fn kick_from_project(&self, identity: Identity, project_id: i64, target_company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let project = load_project(&tx, project_id)?;
        if project.owner_company_id != company_id {
            return Err(SignHubError::not_permitted("OnlyOwnerCanKick"));
        }
        if target_company_id == company_id {
            return Err(SignHubError::not_permitted("CannotKickSelf"));
        }

        load_project_member(&tx, project_id, target_company_id)?
            .ok_or_else(|| SignHubError::not_found("ProjectNotFound"))?;

        let now = self.clock.now_micros();
        tx.execute(
            "UPDATE project_member SET status = ?3, updated_at = ?4 WHERE project_id = ?1 AND company_id = ?2",
            (project_id, target_company_id, ProjectMemberStatus::Kicked.as_str(), now),
        )?;

        emit_to_managers(&tx, &*self.clock, target_company_id, NotificationType::ProjectKicked, &project_id.to_string())?;

        tx.commit()?;
        info!(project_id, target_company_id, "member kicked from project");
        Ok(())
    }

    /// The owner company cannot leave its own project.
    pub async fn leave_project(&self, identity: Identity, project_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let project = load_project(&tx, project_id)?;
        if project.owner_company_id == company_id {
            return Err(SignHubError::not_permitted("OwnerCannotLeave"));
        }

        load_project_member(&tx, project_id, company_id)?
            .ok_or_else(|| SignHubError::not_found("ProjectNotFound"))?;

        let now = self.clock.now_micros();
        tx.execute(
            "UPDATE project_member SET status = ?3, updated_at = ?4 WHERE project_id = ?1 AND company_id = ?2",
            (project_id, company_id, ProjectMemberStatus::Left.as_str(), now),
        )?;

        emit_to_managers(&tx, &*self.clock, project.owner_company_id, NotificationType::ProjectLeft, &company_id.to_string())?;

        tx.commit()?;
        info!(project_id, company_id, "left project");
        Ok(())
    }

    pub async fn delete_project(&self, identity: Identity, project_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let project = load_project(&tx, project_id)?;
        if project.owner_company_id != company_id {
            return Err(SignHubError::not_permitted("OnlyOwnerCanDelete"));
        }

        cascade::delete_project(&tx, project_id)?;
        tx.commit()?;
        info!(project_id, "project deleted");
        Ok(())
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

    async fn connected_companies(engine: &Engine) -> (Identity, i64, Identity, i64) {
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        engine.create_account(alice, "Alice", "a", "a@test").await.unwrap();
        let company_a = engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap().id;
        engine.create_account(bob, "Bob", "b", "b@test").await.unwrap();
        let company_b = engine.create_company(bob, "Beta", "beta", "NL").await.unwrap().id;
        engine.request_connection(alice, company_b, "hi").await.unwrap();
        engine.accept_connection(bob, company_a).await.unwrap();
        (alice, company_a, bob, company_b)
    }

    #[tokio::test]
    async fn project_requires_accepted_connection_to_invite() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let carol = Identity([3u8; 32]);
        engine.create_account(alice, "Alice", "a", "a@test").await.unwrap();
        engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap();
        engine.create_account(carol, "Carol", "c", "c@test").await.unwrap();
        let company_c = engine.create_company(carol, "Gamma", "gamma", "NL").await.unwrap().id;

        let project = engine.create_project(alice, "Signage Job", "A big sign").await.unwrap();
        let err = engine.invite_to_project(alice, project.id, company_c).await.unwrap_err();
        assert!(err.to_string().contains("NoAcceptedConnection"));
    }

    #[tokio::test]
    async fn full_project_lifecycle() {
        let engine = test_engine();
        let (alice, _company_a, bob, company_b) = connected_companies(&engine).await;

        let project = engine.create_project(alice, "Signage Job", "A big sign").await.unwrap();
        engine.invite_to_project(alice, project.id, company_b).await.unwrap();
        engine.accept_project_invite(bob, project.id).await.unwrap();
        engine.send_project_chat(alice, project.id, "hello").await.unwrap();

        engine.kick_from_project(alice, project.id, company_b).await.unwrap();
        let status: String = {
            let conn = engine.db.lock().await;
            conn.query_row(
                "SELECT status FROM project_member WHERE project_id = ?1 AND company_id = ?2",
                (project.id, company_b),
                |r| r.get(0),
            )
            .unwrap()
        };
        assert_eq!(status, "kicked");

        engine.invite_to_project(alice, project.id, company_b).await.unwrap();
        let status: String = {
            let conn = engine.db.lock().await;
            conn.query_row(
                "SELECT status FROM project_member WHERE project_id = ?1 AND company_id = ?2",
                (project.id, company_b),
                |r| r.get(0),
            )
            .unwrap()
        };
        assert_eq!(status, "invited");

        engine.decline_project_invite(bob, project.id).await.unwrap();

        engine.delete_project(alice, project.id).await.unwrap();
        let conn = engine.db.lock().await;
        let member_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM project_member WHERE project_id = ?1", [project.id], |r| r.get(0))
            .unwrap();
        assert_eq!(member_count, 0);
        let chat_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM project_chat WHERE project_id = ?1", [project.id], |r| r.get(0))
            .unwrap();
        assert_eq!(chat_count, 0);
    }

    #[tokio::test]
    async fn owner_cannot_leave_own_project() {
        let engine = test_engine();
        let (alice, _company_a, _bob, _company_b) = connected_companies(&engine).await;
        let project = engine.create_project(alice, "Job", "").await.unwrap();
        let err = engine.leave_project(alice, project.id).await.unwrap_err();
        assert!(err.to_string().contains("OwnerCannotLeave"));
    }
}
