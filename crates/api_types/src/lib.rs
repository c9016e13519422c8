//! Wire types shared between the HTTP server and its clients.
//!
//! Kinds travel as their Chinese tokens (`支出`/`收入`) and amounts as
//! integer cents; dates are `YYYY-MM-DD`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Deserializer for patch fields where an explicit `null` means "clear"
/// and an absent field means "leave unchanged".
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub mod auth {
    use super::*;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginRequest {
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LoginResponse {
        pub token: String,
        pub user: UserInfo,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserInfo {
        pub id: i32,
        pub username: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TokenCreate {
        pub name: String,
    }

    /// Returned once, with the full token value.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TokenCreated {
        pub id: i32,
        pub name: String,
        pub token: String,
        pub created_at: DateTime<Utc>,
    }

    /// Listing view; the token value is masked down to its ends.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TokenSummary {
        pub id: i32,
        pub name: String,
        pub token: String,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
        pub last_used_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TokenToggle {
        pub is_active: bool,
    }
}

pub mod record {
    use super::*;
    use chrono::{DateTime, NaiveDate, Utc};

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RecordNew {
        /// `支出` or `收入`.
        pub kind: String,
        pub category: String,
        pub amount_cents: i64,
        pub date: NaiveDate,
        #[serde(default)]
        pub remark: Option<String>,
        #[serde(default)]
        pub member_id: Option<i32>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RecordItem {
        pub id: i32,
        pub kind: String,
        pub category: String,
        pub amount_cents: i64,
        pub date: NaiveDate,
        pub remark: String,
        pub member_id: Option<i32>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BatchRequest {
        pub records: Vec<RecordNew>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BatchOutcome {
        pub inserted: usize,
        pub errors: Vec<BatchRowError>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BatchRowError {
        pub index: usize,
        pub reason: String,
    }

    /// Query string of the report endpoint. `member_id` takes a member id
    /// or the literal `family` for unattributed records.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportQuery {
        pub start_month: String,
        pub end_month: String,
        #[serde(default)]
        pub member_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportResponse {
        pub granularity: String,
        pub buckets: Vec<ReportBucket>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportBucket {
        pub label: String,
        pub total_cents: i64,
        pub categories: Vec<CategoryTotal>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CategoryTotal {
        pub category: String,
        pub total_cents: i64,
    }
}

pub mod member {
    use super::*;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberNew {
        pub name: String,
        #[serde(default)]
        pub nickname: Option<String>,
        #[serde(default)]
        pub color: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MemberPatch {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default, deserialize_with = "crate::double_option")]
        pub nickname: Option<Option<String>>,
        #[serde(default)]
        pub color: Option<String>,
        #[serde(default)]
        pub is_active: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MemberItem {
        pub id: i32,
        pub name: String,
        pub nickname: Option<String>,
        pub color: String,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MemberListQuery {
        #[serde(default)]
        pub include_inactive: bool,
    }
}

pub mod bill {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AnalyzeRequest {
        pub text: String,
    }

    /// A parsed transaction candidate. Not persisted; the client reviews
    /// candidates and submits the keepers through the batch endpoint.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CandidateRecord {
        pub kind: String,
        pub category: String,
        pub amount_cents: i64,
        pub date: NaiveDate,
        pub remark: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CandidatesResponse {
        pub count: usize,
        pub records: Vec<CandidateRecord>,
    }
}
