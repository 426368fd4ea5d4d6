use super::identity::Identity;
use super::role::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub id: i64,
    pub identity: Identity,
    pub company_id: i64,
    pub role: Role,
    pub joined_at: i64,
}
