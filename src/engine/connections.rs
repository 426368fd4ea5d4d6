//! Connection state machine: request/accept/decline/cancel/disconnect/
//! block/unblock, plus the ghosting rule.

use tracing::{debug, info};

use super::notifications::emit_to_managers;
use super::{company_exists, identity_belongs_to_company, load_connection_by_pair, Engine};
use crate::auth::AuthContext;
use crate::cascade;
use crate::error::{Result, SignHubError};
use crate::model::{canonical_pair, ConnectionStatus, Identity, NotificationType};
use crate::validation;

impl Engine {
    /// Ghosting: if the pair is already Blocked, this
    /// returns `Ok(())` without creating or modifying any row and
    /// without emitting a notification — a blocked requester must not be
    /// able to distinguish a block from a fresh, unanswered request.
    pub async fn request_connection(&self, identity: Identity, target_company_id: i64, message: &str) -> Result<()> {
        validation::validate_initial_message(message)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        if target_company_id == company_id {
            return Err(SignHubError::not_permitted("CannotConnectToSelf"));
        }
        if !company_exists(&tx, target_company_id)? {
            return Err(SignHubError::not_found("CompanyNotFound"));
        }

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let existing = load_connection_by_pair(&tx, lo, hi)?;

        if let Some(existing) = existing {
            match existing.status {
                ConnectionStatus::Pending | ConnectionStatus::Accepted => {
                    return Err(SignHubError::conflict("ConnectionAlreadyExists"));
                }
                ConnectionStatus::Blocked => {
                    debug!(company_a = lo, company_b = hi, "ghosted connection request, returning Ok silently");
                    tx.commit()?;
                    return Ok(());
                }
            }
        }

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO connection (company_a, company_b, status, requested_by, initial_message, blocking_company_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)",
            (lo, hi, ConnectionStatus::Pending.as_str(), identity, message.trim(), now),
        )?;

        emit_to_managers(&tx, &*self.clock, target_company_id, NotificationType::ConnectionRequested, &company_id.to_string())?;

        tx.commit()?;
        info!(company_a = lo, company_b = hi, "connection requested");
        Ok(())
    }

    /// Caller's company must not be the one that originally requested the
    /// connection ("cannot accept your own"). See `identity_belongs_to_company`
    /// for how the requesting side is derived (DESIGN.md).
    pub async fn accept_connection(&self, identity: Identity, target_company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let row = load_connection_by_pair(&tx, lo, hi)?
            .ok_or_else(|| SignHubError::not_found("ConnectionNotFound"))?;

        if row.status != ConnectionStatus::Pending {
            return Err(SignHubError::invalid_state("NotPending"));
        }
        if identity_belongs_to_company(&tx, row.requested_by, company_id)? {
            return Err(SignHubError::not_permitted("CannotAcceptOwnRequest"));
        }

        let now = self.clock.now_micros();
        tx.execute(
            "UPDATE connection SET status = ?2, updated_at = ?3 WHERE id = ?1",
            (row.id, ConnectionStatus::Accepted.as_str(), now),
        )?;

        emit_to_managers(&tx, &*self.clock, target_company_id, NotificationType::ConnectionAccepted, &company_id.to_string())?;

        tx.commit()?;
        info!(connection_id = row.id, "connection accepted");
        Ok(())
    }

    /// Valid only for the non-requester side; deletes the Pending row.
    pub async fn decline_connection(&self, identity: Identity, target_company_id: i64) -> Result<()> {
        self.end_pending_request(identity, target_company_id, false).await
    }

    /// Valid only for the requester side; deletes the Pending row.
    pub async fn cancel_request(&self, identity: Identity, target_company_id: i64) -> Result<()> {
        self.end_pending_request(identity, target_company_id, true).await
    }

    async fn end_pending_request(&self, identity: Identity, target_company_id: i64, caller_must_be_requester: bool) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let row = load_connection_by_pair(&tx, lo, hi)?
            .ok_or_else(|| SignHubError::not_found("ConnectionNotFound"))?;

        if row.status != ConnectionStatus::Pending {
            return Err(SignHubError::invalid_state("NotPending"));
        }

        let caller_is_requester = identity_belongs_to_company(&tx, row.requested_by, company_id)?;
        if caller_must_be_requester && !caller_is_requester {
            return Err(SignHubError::not_permitted("OnlyRequesterCanCancel"));
        }
        if !caller_must_be_requester && caller_is_requester {
            return Err(SignHubError::not_permitted("OnlyRequesterCanCancel"));
        }

        cascade::delete_connection(&tx, row.id)?;
        tx.commit()?;
        info!(connection_id = row.id, "pending connection ended");
        Ok(())
    }

    /// Accepted → deleted; either party may invoke. Cascades chats. Any
    /// project invites that depended on this connection are left as-is —
    /// the project stays, the invitation simply becomes stale.
    pub async fn disconnect_company(&self, identity: Identity, target_company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let row = load_connection_by_pair(&tx, lo, hi)?
            .ok_or_else(|| SignHubError::not_found("ConnectionNotFound"))?;

        if row.status != ConnectionStatus::Accepted {
            return Err(SignHubError::invalid_state("NotPending"));
        }

        cascade::delete_connection(&tx, row.id)?;
        tx.commit()?;
        info!(connection_id = row.id, "connection disconnected");
        Ok(())
    }

    /// Creates or transitions the row to Blocked with
    /// `blocking_company_id` set to the caller's company. Idempotent if
    /// already Blocked by the same company. Cascades existing chat.
    pub async fn block_company(&self, identity: Identity, target_company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        if target_company_id == company_id {
            return Err(SignHubError::not_permitted("CannotBlockSelf"));
        }
        if !company_exists(&tx, target_company_id)? {
            return Err(SignHubError::not_found("CompanyNotFound"));
        }

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let now = self.clock.now_micros();
        let existing = load_connection_by_pair(&tx, lo, hi)?;

        match existing {
            Some(row) if row.status == ConnectionStatus::Blocked && row.blocking_company_id == Some(company_id) => {
                // Already blocked by this company — idempotent no-op.
            }
            Some(row) => {
                tx.execute("DELETE FROM connection_chat WHERE connection_id = ?1", [row.id])?;
                tx.execute(
                    "UPDATE connection SET status = ?2, blocking_company_id = ?3, updated_at = ?4 WHERE id = ?1",
                    (row.id, ConnectionStatus::Blocked.as_str(), company_id, now),
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO connection (company_a, company_b, status, requested_by, initial_message, blocking_company_id, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, '', ?5, ?6, ?6)",
                    (lo, hi, ConnectionStatus::Blocked.as_str(), identity, company_id, now),
                )?;
            }
        }

        tx.commit()?;
        info!(company_a = lo, company_b = hi, "company blocked");
        Ok(())
    }

    pub async fn unblock_company(&self, identity: Identity, target_company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let (lo, hi) = canonical_pair(company_id, target_company_id);
        let row = load_connection_by_pair(&tx, lo, hi)?
            .ok_or_else(|| SignHubError::not_found("ConnectionNotFound"))?;

        if row.status != ConnectionStatus::Blocked {
            return Err(SignHubError::invalid_state("NotBlocked"));
        }
        if row.blocking_company_id != Some(company_id) {
            return Err(SignHubError::not_permitted("OnlyBlockerCanUnblock"));
        }

        cascade::delete_connection(&tx, row.id)?;
        tx.commit()?;
        info!(connection_id = row.id, "connection unblocked");
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

    async fn make_company(engine: &Engine, owner: Identity, slug: &str) -> i64 {
        engine.create_account(owner, "Owner", "o", "o@test").await.unwrap();
        engine.create_company(owner, slug, slug, "NL").await.unwrap().id
    }

    #[tokio::test]
    async fn full_connection_lifecycle() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        let company_a = make_company(&engine, alice, "alpha").await;
        let company_b = make_company(&engine, bob, "beta").await;

        engine.request_connection(alice, company_b, "hi").await.unwrap();
        let err = engine.request_connection(alice, company_b, "hi again").await.unwrap_err();
        assert!(err.to_string().contains("ConnectionAlreadyExists"));

        let err = engine.accept_connection(alice, company_b).await.unwrap_err();
        assert!(err.to_string().contains("CannotAcceptOwnRequest"));

        engine.accept_connection(bob, company_a).await.unwrap();

        let conn = engine.db.lock().await;
        let status: String = conn
            .query_row("SELECT status FROM connection WHERE company_a = ?1 AND company_b = ?2", (company_a, company_b), |r| r.get(0))
            .unwrap();
        assert_eq!(status, "accepted");
        drop(conn);

        engine.disconnect_company(alice, company_b).await.unwrap();
        let conn = engine.db.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM connection", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn cancel_and_decline_are_exclusive_to_the_right_side() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        let company_a = make_company(&engine, alice, "alpha").await;
        let company_b = make_company(&engine, bob, "beta").await;

        engine.request_connection(alice, company_b, "hi").await.unwrap();

        let err = engine.cancel_request(bob, company_a).await.unwrap_err();
        assert!(err.to_string().contains("OnlyRequesterCanCancel"));

        let err = engine.decline_connection(alice, company_b).await.unwrap_err();
        assert!(err.to_string().contains("OnlyRequesterCanCancel"));

        engine.decline_connection(bob, company_a).await.unwrap();
        let conn = engine.db.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM connection", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn block_then_unblock_only_by_blocker() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        let company_a = make_company(&engine, alice, "alpha").await;
        let company_b = make_company(&engine, bob, "beta").await;

        engine.block_company(bob, company_a).await.unwrap();
        let err = engine.unblock_company(alice, company_b).await.unwrap_err();
        assert!(err.to_string().contains("OnlyBlockerCanUnblock"));

        engine.unblock_company(bob, company_a).await.unwrap();
        let conn = engine.db.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM connection", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
