use super::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    MemberJoined,
    OwnershipTransferred,
    Removed,
    ConnectionRequested,
    ConnectionAccepted,
    ChatMessage,
    ProjectInvite,
    ProjectAccepted,
    ProjectDeclined,
    ProjectKicked,
    ProjectLeft,
    ProjectChat,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemberJoined => "member_joined",
            Self::OwnershipTransferred => "ownership_transferred",
            Self::Removed => "removed",
            Self::ConnectionRequested => "connection_requested",
            Self::ConnectionAccepted => "connection_accepted",
            Self::ChatMessage => "chat_message",
            Self::ProjectInvite => "project_invite",
            Self::ProjectAccepted => "project_accepted",
            Self::ProjectDeclined => "project_declined",
            Self::ProjectKicked => "project_kicked",
            Self::ProjectLeft => "project_left",
            Self::ProjectChat => "project_chat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "member_joined" => Some(Self::MemberJoined),
            "ownership_transferred" => Some(Self::OwnershipTransferred),
            "removed" => Some(Self::Removed),
            "connection_requested" => Some(Self::ConnectionRequested),
            "connection_accepted" => Some(Self::ConnectionAccepted),
            "chat_message" => Some(Self::ChatMessage),
            "project_invite" => Some(Self::ProjectInvite),
            "project_accepted" => Some(Self::ProjectAccepted),
            "project_declined" => Some(Self::ProjectDeclined),
            "project_kicked" => Some(Self::ProjectKicked),
            "project_left" => Some(Self::ProjectLeft),
            "project_chat" => Some(Self::ProjectChat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub recipient_identity: Identity,
    pub company_id: i64,
    pub notification_type: NotificationType,
    pub payload: String,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_type_round_trip() {
        let all = [
            NotificationType::MemberJoined,
            NotificationType::OwnershipTransferred,
            NotificationType::Removed,
            NotificationType::ConnectionRequested,
            NotificationType::ConnectionAccepted,
            NotificationType::ChatMessage,
            NotificationType::ProjectInvite,
            NotificationType::ProjectAccepted,
            NotificationType::ProjectDeclined,
            NotificationType::ProjectKicked,
            NotificationType::ProjectLeft,
            NotificationType::ProjectChat,
        ];
        for t in all {
            assert_eq!(NotificationType::from_str(t.as_str()), Some(t));
        }
    }
}
