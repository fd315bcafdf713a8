use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub school_id: String,
    pub grade_level: Option<String>,
    pub section: Option<String>,
    pub guardian_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Teacher {
    pub id: String,
    pub full_name: String,
    pub school_id: String,
    pub grade_level: Option<String>,
    pub section: Option<String>,
}

/// Roster entry as served to devices; the reconciler only needs identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterStudent {
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsentRequest {
    pub student_id: String,
    pub date: NaiveDate,
}
