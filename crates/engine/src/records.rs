//! Ledger records.
//!
//! A record is a single settled transaction: kind, taxonomy category,
//! amount in cents, calendar date, free-form remark and an optional
//! member attribution. Records are immutable once stored.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine,
    categories::{self, RecordKind},
    normalize,
};

/// Longest remark accepted on a stored record, in characters.
pub const RECORD_REMARK_MAX_CHARS: usize = 200;

/// A validated candidate for insertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub category: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub member_id: Option<i32>,
}

impl NewRecord {
    /// Strict validation: the category must already be a valid taxonomy
    /// label for the kind, nothing is silently corrected here.
    pub fn validate(&self) -> ResultEngine<()> {
        if !categories::is_valid(self.kind, &self.category) {
            return Err(EngineError::Validation(format!(
                "unknown {} category: {}",
                self.kind.as_str(),
                self.category
            )));
        }
        if self.amount_cents <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount must be > 0".to_string(),
            ));
        }
        if self.amount_cents > normalize::MAX_AMOUNT_CENTS {
            return Err(EngineError::InvalidAmount(format!(
                "amount out of range: {}",
                self.amount_cents
            )));
        }
        if self.remark.chars().count() > RECORD_REMARK_MAX_CHARS {
            return Err(EngineError::Validation(format!(
                "remark longer than {RECORD_REMARK_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// Outcome of a batch import: rows that failed validation are reported,
/// they never abort the rows that passed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub errors: Vec<ImportRowError>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportRowError {
    /// Zero-based position of the row in the submitted batch.
    pub index: usize,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub kind: String,
    pub category: String,
    pub amount_cents: i64,
    pub date: Date,
    pub remark: String,
    pub member_id: Option<i32>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::MemberId",
        to = "super::members::Column::Id"
    )]
    Members,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl NewRecord {
    pub(crate) fn into_active_model(self, created_at: DateTimeUtc) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            kind: ActiveValue::Set(self.kind.as_str().to_string()),
            category: ActiveValue::Set(self.category),
            amount_cents: ActiveValue::Set(self.amount_cents),
            date: ActiveValue::Set(self.date),
            remark: ActiveValue::Set(self.remark),
            member_id: ActiveValue::Set(self.member_id),
            created_at: ActiveValue::Set(created_at),
        }
    }
}
