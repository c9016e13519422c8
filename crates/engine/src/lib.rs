//! Ledger engine: bill parsing, category normalization and record storage.
//!
//! The engine owns the database and exposes the operations the HTTP layer
//! builds on. Parsing stays independent of storage: bill sources produce
//! [`RawRecord`] candidates, the caller decides what to persist.

use chrono::Utc;
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, TransactionTrait, entity::prelude::*, sea_query::Expr,
};

pub use ai::{Completions, DeepSeekClient};
pub use categories::{
    DEFAULT_EXPENSE_CATEGORY, DEFAULT_INCOME_CATEGORY, EXPENSE_CATEGORIES, INCOME_CATEGORIES,
    RecordKind,
};
pub use classify::classify;
pub use error::EngineError;
pub use members::{MEMBER_COLORS, MemberUpdate, NewMember};
pub use parse::{
    BillFormat, BillInput, BillSource, RawRecord,
    freeform::FreeTextBill,
    pdf::PdfBill,
    tabular::{ALIPAY, TabularBill, WECHAT},
};
pub use records::{ImportOutcome, ImportRowError, NewRecord, RECORD_REMARK_MAX_CHARS};
pub use stats::{Bucket, CategoryTotal, Granularity, MemberFilter, MonthRange, Report};

pub mod ai;
pub mod categories;
pub mod classify;
pub mod members;
pub mod normalize;
pub mod parse;
pub mod records;
pub mod stats;

mod error;

pub type ResultEngine<T> = Result<T, EngineError>;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Insert one validated record.
    pub async fn create_record(&self, record: NewRecord) -> ResultEngine<records::Model> {
        record.validate()?;
        let model = record
            .into_active_model(Utc::now())
            .insert(&self.database)
            .await?;
        Ok(model)
    }

    /// Insert a batch of records, collecting per-row validation failures.
    ///
    /// Valid rows go in within one database transaction; a failing row is
    /// reported but never blocks its siblings. A batch with zero valid
    /// rows errors instead of committing nothing silently.
    pub async fn import_records(&self, batch: Vec<NewRecord>) -> ResultEngine<ImportOutcome> {
        let mut valid = Vec::with_capacity(batch.len());
        let mut errors = Vec::new();
        for (index, record) in batch.into_iter().enumerate() {
            match record.validate() {
                Ok(()) => valid.push(record),
                Err(err) => errors.push(ImportRowError {
                    index,
                    reason: err.to_string(),
                }),
            }
        }

        if valid.is_empty() {
            let reasons: Vec<String> = errors
                .iter()
                .map(|e| format!("row {}: {}", e.index, e.reason))
                .collect();
            return Err(EngineError::NoValidRows(reasons.join("; ")));
        }

        let inserted = valid.len();
        let now = Utc::now();
        let db_tx = self.database.begin().await?;
        for record in valid {
            record.into_active_model(now).insert(&db_tx).await?;
        }
        db_tx.commit().await?;

        tracing::info!(inserted, skipped = errors.len(), "record batch imported");
        Ok(ImportOutcome { inserted, errors })
    }

    /// Dense day-or-month report over a month range.
    pub async fn records_report(
        &self,
        range: MonthRange,
        member: MemberFilter,
    ) -> ResultEngine<Report> {
        let mut query = records::Entity::find()
            .filter(records::Column::Date.gte(range.first_day()))
            .filter(records::Column::Date.lte(range.last_day()));
        query = match member {
            MemberFilter::All => query,
            MemberFilter::Unattributed => query.filter(records::Column::MemberId.is_null()),
            MemberFilter::Member(id) => query.filter(records::Column::MemberId.eq(id)),
        };

        let rows = query.all(&self.database).await?;
        Ok(stats::aggregate(
            range,
            rows.iter()
                .map(|row| (row.date, row.category.as_str(), row.amount_cents)),
        ))
    }

    /// List members, active ones only unless asked otherwise.
    pub async fn list_members(&self, include_inactive: bool) -> ResultEngine<Vec<members::Model>> {
        let mut query = members::Entity::find().order_by_asc(members::Column::Id);
        if !include_inactive {
            query = query.filter(members::Column::IsActive.eq(true));
        }
        Ok(query.all(&self.database).await?)
    }

    pub async fn create_member(&self, member: NewMember) -> ResultEngine<members::Model> {
        let member = NewMember {
            name: member.name.trim().to_string(),
            ..member
        };
        if member.name.is_empty() {
            return Err(EngineError::Validation(
                "member name must not be empty".to_string(),
            ));
        }

        let existing = members::Entity::find().all(&self.database).await?;
        if existing.iter().any(|m| m.name == member.name) {
            return Err(EngineError::ExistingKey(member.name));
        }

        let color = match member.color.clone() {
            Some(color) => color,
            None => {
                let taken: Vec<String> = existing.into_iter().map(|m| m.color).collect();
                members::next_color(&taken).to_string()
            }
        };

        let model = members::active_model_for_new(member, color, Utc::now())
            .insert(&self.database)
            .await?;
        Ok(model)
    }

    pub async fn update_member(
        &self,
        member_id: i32,
        update: MemberUpdate,
    ) -> ResultEngine<members::Model> {
        let model = members::Entity::find_by_id(member_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;

        let mut active: members::ActiveModel = model.into();
        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(EngineError::Validation(
                    "member name must not be empty".to_string(),
                ));
            }
            let clash = members::Entity::find()
                .filter(members::Column::Name.eq(name.clone()))
                .filter(members::Column::Id.ne(member_id))
                .one(&self.database)
                .await?;
            if clash.is_some() {
                return Err(EngineError::ExistingKey(name));
            }
            active.name = ActiveValue::Set(name);
        }
        if let Some(nickname) = update.nickname {
            active.nickname = ActiveValue::Set(nickname);
        }
        if let Some(color) = update.color {
            active.color = ActiveValue::Set(color);
        }
        if let Some(is_active) = update.is_active {
            active.is_active = ActiveValue::Set(is_active);
        }
        active.updated_at = ActiveValue::Set(Utc::now());

        Ok(active.update(&self.database).await?)
    }

    /// Soft-disable a member without touching their records.
    pub async fn deactivate_member(&self, member_id: i32) -> ResultEngine<members::Model> {
        self.update_member(
            member_id,
            MemberUpdate {
                is_active: Some(false),
                ..MemberUpdate::default()
            },
        )
        .await
    }

    /// Remove a member; their records survive unattributed.
    pub async fn delete_member(&self, member_id: i32) -> ResultEngine<()> {
        let model = members::Entity::find_by_id(member_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;

        let db_tx = self.database.begin().await?;
        records::Entity::update_many()
            .col_expr(records::Column::MemberId, Expr::value(Option::<i32>::None))
            .filter(records::Column::MemberId.eq(member_id))
            .exec(&db_tx)
            .await?;
        model.delete(&db_tx).await?;
        db_tx.commit().await?;
        Ok(())
    }
}

/// The builder for `Engine`.
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database.
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`.
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
        }
    }
}
