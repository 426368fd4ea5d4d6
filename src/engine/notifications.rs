//! Notification emission plus the three reader-facing operations
//! (`mark_notification_read`, `mark_all_notifications_read`,
//! `clear_notifications`).
//!
//! Emission runs synchronously inside the same transaction as the write
//! that triggers it — a client never observes the effect without the
//! notification — so every other engine module calls the `emit_*`
//! helpers here rather than inserting into `notification` directly.

use rusqlite::Transaction;
use tracing::info;

use super::{manager_identities, Engine};
use crate::clock::Clock;
use crate::error::{Result, SignHubError};
use crate::model::{Identity, NotificationType};

/// Fixed title/body templates per notification type. Bodies name the
/// relevant entities by id — a client resolving display strings already
/// has the row data to look up names, and the notification table doesn't
/// otherwise need a join (see DESIGN.md).
fn render(notification_type: NotificationType, company_id: i64, detail: &str) -> (String, String) {
    use NotificationType::*;
    match notification_type {
        MemberJoined => (
            "New member request".to_string(),
            format!("{detail} requested to join company {company_id}"),
        ),
        OwnershipTransferred => (
            "Ownership transferred".to_string(),
            format!("Ownership of company {company_id} was transferred: {detail}"),
        ),
        Removed => (
            "Removed from company".to_string(),
            format!("You were removed from company {company_id}: {detail}"),
        ),
        ConnectionRequested => (
            "New connection request".to_string(),
            format!("Company {detail} requested to connect with company {company_id}"),
        ),
        ConnectionAccepted => (
            "Connection accepted".to_string(),
            format!("Company {detail} accepted the connection with company {company_id}"),
        ),
        ChatMessage => (
            "New message".to_string(),
            format!("New message on connection {detail}"),
        ),
        ProjectInvite => (
            "Project invitation".to_string(),
            format!("Company {company_id} invited you to project {detail}"),
        ),
        ProjectAccepted => (
            "Project invite accepted".to_string(),
            format!("Company {detail} accepted your invite to project on company {company_id}"),
        ),
        ProjectDeclined => (
            "Project invite declined".to_string(),
            format!("Company {detail} declined your invite to a project owned by company {company_id}"),
        ),
        ProjectKicked => (
            "Removed from project".to_string(),
            format!("You were removed from project {detail}"),
        ),
        ProjectLeft => (
            "Company left project".to_string(),
            format!("Company {detail} left a project owned by company {company_id}"),
        ),
        ProjectChat => (
            "New project message".to_string(),
            format!("New message in project {detail}"),
        ),
    }
}

fn insert_notification(
    tx: &Transaction,
    clock: &dyn Clock,
    recipient: Identity,
    company_id: i64,
    notification_type: NotificationType,
    detail: &str,
) -> Result<()> {
    let (title, body) = render(notification_type, company_id, detail);
    let now = clock.now_micros();
    tx.execute(
        "INSERT INTO notification (recipient_identity, company_id, notification_type, title, body, is_read, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        (recipient, company_id, notification_type.as_str(), &title, &body, now),
    )?;
    Ok(())
}

/// Insert one Notification for every `can_manage` member of `company_id`.
pub(super) fn emit_to_managers(
    tx: &Transaction,
    clock: &dyn Clock,
    company_id: i64,
    notification_type: NotificationType,
    detail: &str,
) -> Result<()> {
    for recipient in manager_identities(tx, company_id)? {
        insert_notification(tx, clock, recipient, company_id, notification_type, detail)?;
    }
    Ok(())
}

/// Insert a single Notification addressed to one identity.
pub(super) fn emit_to_identity(
    tx: &Transaction,
    clock: &dyn Clock,
    recipient: Identity,
    company_id: i64,
    notification_type: NotificationType,
    detail: &str,
) -> Result<()> {
    insert_notification(tx, clock, recipient, company_id, notification_type, detail)
}

impl Engine {
    /// Marks one notification as read. Idempotent — re-marking an
    /// already-read row is not an error.
    pub async fn mark_notification_read(&self, identity: Identity, notification_id: i64) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;

        let recipient: Option<Identity> = tx
            .query_row(
                "SELECT recipient_identity FROM notification WHERE id = ?1",
                [notification_id],
                |row| row.get(0),
            )
            .optional_or_not_found()?;

        let Some(recipient) = recipient else {
            return Err(SignHubError::not_found("NotificationNotFound"));
        };
        if recipient != identity {
            return Err(SignHubError::not_permitted("NotYourNotification"));
        }

        tx.execute(
            "UPDATE notification SET is_read = 1 WHERE id = ?1",
            [notification_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Marks every notification owned by `identity` scoped to `company_id`
    /// as read.
    pub async fn mark_all_notifications_read(&self, identity: Identity, company_id: i64) -> Result<usize> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE notification SET is_read = 1 WHERE recipient_identity = ?1 AND company_id = ?2",
            (identity, company_id),
        )?;
        tx.commit()?;
        info!(company_id, updated, "marked all notifications read");
        Ok(updated)
    }

    /// Deletes every already-read notification owned by `identity` scoped
    /// to `company_id`.
    pub async fn clear_notifications(&self, identity: Identity, company_id: i64) -> Result<usize> {
        let mut conn = self.acquire().await?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM notification WHERE recipient_identity = ?1 AND company_id = ?2 AND is_read = 1",
            (identity, company_id),
        )?;
        tx.commit()?;
        info!(company_id, deleted, "cleared read notifications");
        Ok(deleted)
    }
}

trait OptionalOrNotFound<T> {
    fn optional_or_not_found(self) -> Result<Option<T>>;
}

impl<T> OptionalOrNotFound<T> for std::result::Result<T, rusqlite::Error> {
    fn optional_or_not_found(self) -> Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
