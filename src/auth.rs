//! Caller authorization context: identity → account → active membership →
//! role. Every operation builds one of these first and gates on it.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, SignHubError};
use crate::model::{Identity, Membership, Role};

/// The three shapes a caller's context can take.
pub enum AuthContext {
    /// No Account row for this identity.
    NoAccount,
    /// Account exists but has no active company (or never joined one).
    AccountOnly,
    /// Account has an active company with a resolved Membership/role.
    Member { company_id: i64, membership: Membership },
}

impl AuthContext {
    pub fn resolve(conn: &Connection, identity: Identity) -> Result<Self> {
        let active_company_id: Option<Option<i64>> = conn
            .query_row(
                "SELECT active_company_id FROM account WHERE identity = ?1",
                [identity],
                |row| row.get(0),
            )
            .optional()?;

        let Some(active_company_id) = active_company_id else {
            return Ok(Self::NoAccount);
        };

        let Some(company_id) = active_company_id else {
            return Ok(Self::AccountOnly);
        };

        let membership = load_membership(conn, identity, company_id)?;
        match membership {
            Some(membership) => Ok(Self::Member { company_id, membership }),
            None => Ok(Self::AccountOnly),
        }
    }

    pub fn require_account(&self) -> Result<()> {
        match self {
            Self::NoAccount => Err(SignHubError::not_found("AccountNotFound")),
            _ => Ok(()),
        }
    }

    /// Requires an active company membership, returns (company_id, role).
    pub fn require_member(&self) -> Result<(i64, Role)> {
        match self {
            Self::NoAccount => Err(SignHubError::not_found("AccountNotFound")),
            Self::AccountOnly => Err(SignHubError::not_permitted("NoActiveCompany")),
            Self::Member { company_id, membership } => Ok((*company_id, membership.role)),
        }
    }

    /// Requires `can_manage` (Owner or Admin) on the active company.
    pub fn require_manager(&self) -> Result<(i64, Role)> {
        let (company_id, role) = self.require_member()?;
        if !role.can_manage() {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }
        Ok((company_id, role))
    }

    /// Requires `is_owner` on the active company.
    pub fn require_owner(&self) -> Result<i64> {
        let (company_id, role) = self.require_member()?;
        if !role.is_owner() {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }
        Ok(company_id)
    }
}

pub fn load_membership(conn: &Connection, identity: Identity, company_id: i64) -> Result<Option<Membership>> {
    conn.query_row(
        "SELECT id, identity, company_id, role, joined_at FROM membership WHERE identity = ?1 AND company_id = ?2",
        (identity, company_id),
        |row| {
            let role_str: String = row.get(3)?;
            Ok(Membership {
                id: row.get(0)?,
                identity: row.get(1)?,
                company_id: row.get(2)?,
                role: Role::from_str(&role_str).unwrap_or(Role::Pending),
                joined_at: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(SignHubError::from)
}
