use super::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub owner_company_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectMemberStatus {
    Invited,
    Accepted,
    Declined,
    Kicked,
    Left,
}

impl ProjectMemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Kicked => "kicked",
            Self::Left => "left",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "invited" => Some(Self::Invited),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "kicked" => Some(Self::Kicked),
            "left" => Some(Self::Left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMember {
    pub id: i64,
    pub project_id: i64,
    pub company_id: i64,
    pub status: ProjectMemberStatus,
    pub invited_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectChat {
    pub id: i64,
    pub project_id: i64,
    pub sender: Identity,
    pub text: String,
    pub created_at: i64,
}
