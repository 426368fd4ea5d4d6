use super::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Blocked,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Blocked => "blocked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// Canonical pairwise row: `company_a < company_b` always.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: i64,
    pub company_a: i64,
    pub company_b: i64,
    pub status: ConnectionStatus,
    pub requested_by: Identity,
    pub initial_message: String,
    pub blocking_company_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Connection {
    pub fn involves(&self, company_id: i64) -> bool {
        self.company_a == company_id || self.company_b == company_id
    }

    pub fn other(&self, company_id: i64) -> i64 {
        if self.company_a == company_id { self.company_b } else { self.company_a }
    }
}

/// Order an unordered company pair into the canonical `(min, max)` tuple.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChat {
    pub id: i64,
    pub connection_id: i64,
    pub sender: Identity,
    pub text: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_orders_ascending() {
        assert_eq!(canonical_pair(5, 2), (2, 5));
        assert_eq!(canonical_pair(2, 5), (2, 5));
    }

    #[test]
    fn status_round_trip() {
        for s in [ConnectionStatus::Pending, ConnectionStatus::Accepted, ConnectionStatus::Blocked] {
            assert_eq!(ConnectionStatus::from_str(s.as_str()), Some(s));
        }
    }
}
