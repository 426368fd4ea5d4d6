#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub location: String,
    pub bio: String,
    pub kvk_number: String,
    pub is_public: bool,
    pub created_at: i64,
}

/// 1:1 with `Company`, created empty (all flags false) at company creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    pub company_id: i64,
    pub can_install: bool,
    pub has_cnc: bool,
    pub has_large_format: bool,
    pub has_bucket_truck: bool,
}
