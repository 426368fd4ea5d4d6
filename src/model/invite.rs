use super::identity::Identity;

/// One row per outstanding invite code. `code` is stored canonicalized
/// (dashes at 4/9/14) by `invite_code::canonicalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteCode {
    pub code: String,
    pub company_id: i64,
    pub created_by: Identity,
    pub max_uses: u32,
    pub uses_remaining: u32,
    pub created_at: i64,
}
