//! Membership & invite-code operations: invite issuance and
//! redemption, role mutation, ownership transfer, removal, leaving.

use tracing::info;

use super::notifications::{emit_to_identity, emit_to_managers};
use super::{company_exists, load_account, role_rank_at_or_above, Engine};
use crate::auth::{load_membership, AuthContext};
use crate::cascade;
use crate::error::{Result, SignHubError};
use crate::invite_code::{canonicalize, format_with_dashes};
use crate::model::{Identity, InviteCode, Membership, NotificationType, Role};
use crate::validation;

impl Engine {
    /// Allocates a unique invite code via rejection sampling against
    /// `invite_code_max_attempts` — the alphabet's 32^16 space makes
    /// exhausting that cap effectively impossible short of a corrupt or
    /// pathologically tiny keyspace, so it's surfaced as `InvalidState`
    /// rather than a user-facing validation error.
    pub async fn generate_invite_code(&self, identity: Identity, max_uses: u32) -> Result<InviteCode> {
        validation::validate_max_uses(max_uses)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let mut code = String::new();
        let mut allocated = false;
        for _ in 0..self.invite_code_max_attempts {
            let candidate = format_with_dashes(&self.rng.sample_code());
            let taken: bool = tx.query_row(
                "SELECT COUNT(*) FROM invite_code WHERE code = ?1",
                [&candidate],
                |r| r.get::<_, i64>(0),
            )? > 0;
            if !taken {
                code = candidate;
                allocated = true;
                break;
            }
        }
        if !allocated {
            return Err(SignHubError::invalid_state("InviteCodeAllocationFailed"));
        }

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO invite_code (code, company_id, created_by, max_uses, uses_remaining, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
            (&code, company_id, identity, max_uses, now),
        )?;

        tx.commit()?;
        info!(company_id, code = %code, "invite code generated");
        Ok(InviteCode {
            code,
            company_id,
            created_by: identity,
            max_uses,
            uses_remaining: max_uses,
            created_at: now,
        })
    }

    pub async fn delete_invite_code(&self, identity: Identity, code: &str) -> Result<()> {
        let canonical = canonicalize(code).ok_or_else(|| SignHubError::not_found("InviteCodeInvalid"))?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let row_company: Option<i64> = tx
            .query_row(
                "SELECT company_id FROM invite_code WHERE code = ?1",
                [&canonical],
                |row| row.get(0),
            )
            .optional_or_none()?;

        match row_company {
            Some(c) if c == company_id => {
                tx.execute("DELETE FROM invite_code WHERE code = ?1", [&canonical])?;
                tx.commit()?;
                info!(company_id, code = %canonical, "invite code deleted");
                Ok(())
            }
            Some(_) => Err(SignHubError::not_permitted("NotPermitted")),
            None => Err(SignHubError::not_found("InviteCodeInvalid")),
        }
    }

    pub async fn join_company(&self, identity: Identity, code: &str) -> Result<Membership> {
        let canonical = canonicalize(code).ok_or_else(|| SignHubError::not_found("InviteCodeInvalid"))?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        load_account(&tx, identity)?;

        let row: Option<(i64, u32)> = tx
            .query_row(
                "SELECT company_id, uses_remaining FROM invite_code WHERE code = ?1",
                [&canonical],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional_or_none()?;

        let Some((company_id, uses_remaining)) = row else {
            return Err(SignHubError::not_found("InviteCodeInvalid"));
        };
        if uses_remaining == 0 {
            return Err(SignHubError::not_found("InviteCodeInvalid"));
        }

        if load_membership(&tx, identity, company_id)?.is_some() {
            return Err(SignHubError::conflict("AlreadyMember"));
        }

        let has_any_membership: bool = tx.query_row(
            "SELECT COUNT(*) FROM membership WHERE identity = ?1",
            [identity],
            |r| r.get::<_, i64>(0),
        )? > 0;

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO membership (identity, company_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
            (identity, company_id, Role::Pending.as_str(), now),
        )?;
        let membership_id = tx.last_insert_rowid();

        if !has_any_membership {
            tx.execute(
                "UPDATE account SET active_company_id = ?2 WHERE identity = ?1",
                (identity, company_id),
            )?;
        }

        if uses_remaining - 1 == 0 {
            tx.execute("DELETE FROM invite_code WHERE code = ?1", [&canonical])?;
        } else {
            tx.execute(
                "UPDATE invite_code SET uses_remaining = uses_remaining - 1 WHERE code = ?1",
                [&canonical],
            )?;
        }

        emit_to_managers(&tx, &*self.clock, company_id, NotificationType::MemberJoined, &identity.to_hex())?;

        tx.commit()?;
        info!(company_id, identity = %identity, "joined company as pending");
        Ok(Membership { id: membership_id, identity, company_id, role: Role::Pending, joined_at: now })
    }

    /// `new_role = Owner` is always rejected (use `transfer_ownership`).
    /// Assigning Admin requires `is_owner`; any other move among
    /// {Member, Field, Installer} (including Pending activation) requires
    /// only `can_manage`. A caller may never touch their own role, and an
    /// Admin may never touch a peer at or above their own rank (another
    /// Admin or the Owner).
    pub async fn update_user_role(&self, identity: Identity, target: Identity, new_role: Role) -> Result<Membership> {
        if matches!(new_role, Role::Owner) {
            return Err(SignHubError::not_permitted("UseTransferOwnership"));
        }
        if target == identity {
            return Err(SignHubError::not_permitted("CannotChangeOwnRole"));
        }

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, caller_role) = ctx.require_manager()?;

        if matches!(new_role, Role::Admin) && !caller_role.is_owner() {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }

        let target_membership = load_membership(&tx, target, company_id)?
            .ok_or_else(|| SignHubError::not_found("AccountNotFound"))?;

        if role_rank_at_or_above(target_membership.role, caller_role) {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }

        tx.execute(
            "UPDATE membership SET role = ?3 WHERE identity = ?1 AND company_id = ?2",
            (target, company_id, new_role.as_str()),
        )?;

        tx.commit()?;
        info!(company_id, target = %target, new_role = %new_role, "role updated");
        Ok(Membership { role: new_role, ..target_membership })
    }

    pub async fn transfer_ownership(&self, identity: Identity, new_owner: Identity) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let company_id = ctx.require_owner()?;

        let target = load_membership(&tx, new_owner, company_id)?
            .ok_or_else(|| SignHubError::not_found("AccountNotFound"))?;
        if !target.role.is_active_member() {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }

        tx.execute(
            "UPDATE membership SET role = ?3 WHERE identity = ?1 AND company_id = ?2",
            (identity, company_id, Role::Admin.as_str()),
        )?;
        tx.execute(
            "UPDATE membership SET role = ?3 WHERE identity = ?1 AND company_id = ?2",
            (new_owner, company_id, Role::Owner.as_str()),
        )?;

        emit_to_managers(&tx, &*self.clock, company_id, NotificationType::OwnershipTransferred, &new_owner.to_hex())?;

        tx.commit()?;
        info!(company_id, from = %identity, to = %new_owner, "ownership transferred");
        Ok(())
    }

    /// Owner may remove any non-Owner; Admin may remove Member, Field,
    /// Installer, or Pending, but not another Admin.
    pub async fn remove_colleague(&self, identity: Identity, colleague: Identity) -> Result<()> {
        if colleague == identity {
            return Err(SignHubError::not_permitted("CannotRemoveSelf"));
        }

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, caller_role) = ctx.require_manager()?;

        let target = load_membership(&tx, colleague, company_id)?
            .ok_or_else(|| SignHubError::not_found("AccountNotFound"))?;

        if target.role.is_owner() {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }
        if !caller_role.is_owner() && target.role == Role::Admin {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }

        cascade::delete_membership_and_reassign_active(&tx, colleague, company_id)?;
        emit_to_identity(&tx, &*self.clock, colleague, company_id, NotificationType::Removed, "")?;

        tx.commit()?;
        info!(company_id, colleague = %colleague, "colleague removed");
        Ok(())
    }

    /// The Owner cannot leave — they must transfer ownership or delete
    /// the company first.
    pub async fn leave_company(&self, identity: Identity) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, role) = ctx.require_member()?;

        if role.is_owner() {
            return Err(SignHubError::not_permitted("OwnerCannotLeave"));
        }

        cascade::delete_membership_and_reassign_active(&tx, identity, company_id)?;
        tx.commit()?;
        info!(company_id, identity = %identity, "left company");
        Ok(())
    }
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
