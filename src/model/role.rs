use serde::{Deserialize, Serialize};

/// Membership role. Ordered loosely for management decisions only —
/// `Member`/`Field` are peers by design (see DESIGN.md open question #4);
/// use the explicit predicates below rather than `Ord` for permission
/// checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
    Field,
    Installer,
    Pending,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Field => "field",
            Self::Installer => "installer",
            Self::Pending => "pending",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "field" => Some(Self::Field),
            "installer" => Some(Self::Installer),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    /// Rank used only to decide whether a target role is "at or above" the
    /// caller's for `update_user_role`'s self-protection check. Member and
    /// Field are deliberately equal rank — a caller may shift a colleague
    /// among Member/Field/Installer freely, with no internal order there.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Admin => 3,
            Self::Member | Self::Field => 2,
            Self::Installer => 1,
            Self::Pending => 0,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    pub fn is_active_member(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Installer is the one external/non-internal role.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin | Self::Member | Self::Field)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
