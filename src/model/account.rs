use super::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub identity: Identity,
    pub full_name: String,
    pub nickname: String,
    pub email: String,
    pub active_company_id: Option<i64>,
    pub created_at: i64,
}
