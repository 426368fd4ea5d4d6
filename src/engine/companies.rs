//! Company operations: `create_company`, `update_company_profile`,
//! `update_capabilities`, `switch_active_company`, `delete_company`.

use tracing::info;

use super::{company_exists, load_account, load_company, slug_taken, Engine};
use crate::auth::{load_membership, AuthContext};
use crate::cascade;
use crate::error::{Result, SignHubError};
use crate::model::{Capability, Company, Identity, Role};
use crate::validation;

impl Engine {
    pub async fn create_company(
        &self,
        identity: Identity,
        name: &str,
        slug: &str,
        location: &str,
    ) -> Result<Company> {
        validation::validate_company_name(name)?;
        validation::validate_slug(slug)?;
        validation::validate_location(location)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        load_account(&tx, identity)?;

        let slug_lower = slug.trim().to_lowercase();
        if slug_taken(&tx, &slug_lower, None)? {
            return Err(SignHubError::conflict("SlugTaken"));
        }

        let now = self.clock.now_micros();
        tx.execute(
            "INSERT INTO company (name, slug, location, bio, kvk_number, is_public, created_at) \
             VALUES (?1, ?2, ?3, '', '', 0, ?4)",
            (name.trim(), &slug_lower, location.trim(), now),
        )?;
        let company_id = tx.last_insert_rowid();

        tx.execute("INSERT INTO capability (company_id) VALUES (?1)", [company_id])?;

        tx.execute(
            "INSERT INTO membership (identity, company_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
            (identity, company_id, Role::Owner.as_str(), now),
        )?;

        tx.execute(
            "UPDATE account SET active_company_id = ?2 WHERE identity = ?1",
            (identity, company_id),
        )?;

        let company = load_company(&tx, company_id)?;
        tx.commit()?;
        info!(company_id, identity = %identity, "company created");
        Ok(company)
    }

    pub async fn update_company_profile(
        &self,
        identity: Identity,
        name: &str,
        slug: &str,
        location: &str,
        bio: &str,
        is_public: bool,
        kvk_number: &str,
    ) -> Result<Company> {
        validation::validate_company_name(name)?;
        validation::validate_slug(slug)?;
        validation::validate_location(location)?;
        validation::validate_bio(bio)?;
        validation::validate_kvk_number(kvk_number)?;

        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        let slug_lower = slug.trim().to_lowercase();
        if slug_taken(&tx, &slug_lower, Some(company_id))? {
            return Err(SignHubError::conflict("SlugTaken"));
        }

        tx.execute(
            "UPDATE company SET name = ?2, slug = ?3, location = ?4, bio = ?5, is_public = ?6, kvk_number = ?7 \
             WHERE id = ?1",
            (
                company_id,
                name.trim(),
                &slug_lower,
                location.trim(),
                bio.trim(),
                is_public as i64,
                kvk_number.trim(),
            ),
        )?;

        let company = load_company(&tx, company_id)?;
        tx.commit()?;
        info!(company_id, "company profile updated");
        Ok(company)
    }

    pub async fn update_capabilities(
        &self,
        identity: Identity,
        can_install: bool,
        has_cnc: bool,
        has_large_format: bool,
        has_bucket_truck: bool,
    ) -> Result<Capability> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let (company_id, _role) = ctx.require_manager()?;

        tx.execute(
            "UPDATE capability SET can_install = ?2, has_cnc = ?3, has_large_format = ?4, has_bucket_truck = ?5 \
             WHERE company_id = ?1",
            (company_id, can_install as i64, has_cnc as i64, has_large_format as i64, has_bucket_truck as i64),
        )?;

        tx.commit()?;
        info!(company_id, "capabilities updated");
        Ok(Capability { company_id, can_install, has_cnc, has_large_format, has_bucket_truck })
    }

    /// Requires a non-Pending Membership in the target company; switching
    /// onto a Pending membership is rejected (see DESIGN.md open question #3).
    pub async fn switch_active_company(&self, identity: Identity, company_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        load_account(&tx, identity)?;
        let membership = load_membership(&tx, identity, company_id)?
            .ok_or_else(|| SignHubError::not_permitted("NotPermitted"))?;
        if !membership.role.is_active_member() {
            return Err(SignHubError::not_permitted("NotPermitted"));
        }

        tx.execute(
            "UPDATE account SET active_company_id = ?2 WHERE identity = ?1",
            (identity, company_id),
        )?;
        tx.commit()?;
        info!(identity = %identity, company_id, "active company switched");
        Ok(())
    }

    /// Requires `is_owner` on the active company. Deletion is permitted
    /// unconditionally for the Owner regardless of other memberships —
    /// spec allows this unconditionally; see DESIGN.md open question #1.
    pub async fn delete_company(&self, identity: Identity) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let ctx = AuthContext::resolve(&tx, identity)?;
        let company_id = ctx.require_owner()?;

        if !company_exists(&tx, company_id)? {
            return Err(SignHubError::not_found("CompanyNotFound"));
        }

        cascade::delete_company(&tx, company_id)?;
        tx.commit()?;
        info!(company_id, "company deleted");
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

    #[tokio::test]
    async fn create_company_sets_owner_and_capability() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        let company = engine.create_company(alice, "Alpha Signs", "Alpha-Signs", "Amsterdam, NL").await.unwrap();
        assert_eq!(company.slug, "alpha-signs");

        let conn = engine.db.lock().await;
        let role: String = conn
            .query_row(
                "SELECT role FROM membership WHERE identity = ?1 AND company_id = ?2",
                (alice, company.id),
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(role, "owner");

        let cap_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM capability WHERE company_id = ?1", [company.id], |r| r.get(0))
            .unwrap();
        assert_eq!(cap_count, 1);
    }

    #[tokio::test]
    async fn create_company_rejects_duplicate_slug() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        engine.create_account(bob, "Bob", "Bob", "bob@b.test").await.unwrap();
        engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap();
        let err = engine.create_company(bob, "Alpha Two", "alpha", "NL").await.unwrap_err();
        assert!(err.to_string().contains("SlugTaken"));
    }

    #[tokio::test]
    async fn delete_company_requires_owner() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap();
        let code = engine.generate_invite_code(alice, 5).await.unwrap();
        engine.create_account(bob, "Bob", "Bob", "bob@b.test").await.unwrap();
        engine.join_company(bob, &code.code).await.unwrap();

        let err = engine.delete_company(bob).await.unwrap_err();
        assert!(err.to_string().contains("NotPermitted"));

        engine.delete_company(alice).await.unwrap();
        let conn = engine.db.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM company", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn switch_active_company_rejects_pending() {
        let engine = test_engine();
        let alice = Identity([1u8; 32]);
        let bob = Identity([2u8; 32]);
        engine.create_account(alice, "Alice", "Alice", "alice@a.test").await.unwrap();
        let company = engine.create_company(alice, "Alpha", "alpha", "NL").await.unwrap();
        let code = engine.generate_invite_code(alice, 5).await.unwrap();
        engine.create_account(bob, "Bob", "Bob", "bob@b.test").await.unwrap();
        engine.join_company(bob, &code.code).await.unwrap();

        let err = engine.switch_active_company(bob, company.id).await.unwrap_err();
        assert!(err.to_string().contains("NotPermitted"));
    }
}
