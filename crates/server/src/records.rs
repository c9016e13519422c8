//! Record API endpoints.

use api_types::record::{
    BatchOutcome, BatchRowError, CategoryTotal, RecordItem, RecordNew, ReportBucket, ReportQuery,
    ReportResponse,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use engine::{EngineError, Granularity, MemberFilter, MonthRange, NewRecord, RecordKind};

use crate::{ServerError, server::ServerState};

fn to_engine(payload: RecordNew) -> Result<NewRecord, EngineError> {
    Ok(NewRecord {
        kind: RecordKind::try_from(payload.kind.as_str())?,
        category: payload.category,
        amount_cents: payload.amount_cents,
        date: payload.date,
        remark: payload.remark.unwrap_or_default(),
        member_id: payload.member_id,
    })
}

fn to_item(model: engine::records::Model) -> RecordItem {
    RecordItem {
        id: model.id,
        kind: model.kind,
        category: model.category,
        amount_cents: model.amount_cents,
        date: model.date,
        remark: model.remark,
        member_id: model.member_id,
        created_at: model.created_at,
    }
}

fn member_filter(raw: Option<&str>) -> Result<MemberFilter, ServerError> {
    match raw {
        None | Some("all") => Ok(MemberFilter::All),
        Some("family") => Ok(MemberFilter::Unattributed),
        Some(id) => id.parse().map(MemberFilter::Member).map_err(|_| {
            ServerError::Engine(EngineError::Validation(format!("invalid memberId: {id}")))
        }),
    }
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<RecordNew>,
) -> Result<(StatusCode, Json<RecordItem>), ServerError> {
    let record = to_engine(payload)?;
    let model = state.engine.create_record(record).await?;
    Ok((StatusCode::CREATED, Json(to_item(model))))
}

pub async fn batch(
    State(state): State<ServerState>,
    Json(payload): Json<api_types::record::BatchRequest>,
) -> Result<Json<BatchOutcome>, ServerError> {
    let mut rows = Vec::with_capacity(payload.records.len());
    let mut errors = Vec::new();
    for (index, record) in payload.records.into_iter().enumerate() {
        match to_engine(record) {
            // Row indexes must survive the conversion so client-side
            // reporting lines up with the submitted batch.
            Ok(row) => rows.push((index, row)),
            Err(err) => errors.push(BatchRowError {
                index,
                reason: err.to_string(),
            }),
        }
    }

    if rows.is_empty() {
        let reasons: Vec<String> = errors
            .iter()
            .map(|e| format!("row {}: {}", e.index, e.reason))
            .collect();
        return Err(ServerError::Engine(EngineError::NoValidRows(
            reasons.join("; "),
        )));
    }

    let indexes: Vec<usize> = rows.iter().map(|(index, _)| *index).collect();
    let outcome = state
        .engine
        .import_records(rows.into_iter().map(|(_, row)| row).collect())
        .await?;

    for err in outcome.errors {
        errors.push(BatchRowError {
            index: indexes.get(err.index).copied().unwrap_or(err.index),
            reason: err.reason,
        });
    }
    errors.sort_by_key(|e| e.index);

    Ok(Json(BatchOutcome {
        inserted: outcome.inserted,
        errors,
    }))
}

pub async fn report(
    State(state): State<ServerState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, ServerError> {
    let range = MonthRange::parse(&query.start_month, &query.end_month)?;
    let member = member_filter(query.member_id.as_deref())?;

    let report = state.engine.records_report(range, member).await?;

    Ok(Json(ReportResponse {
        granularity: match report.granularity {
            Granularity::Daily => "daily".to_string(),
            Granularity::Monthly => "monthly".to_string(),
        },
        buckets: report
            .buckets
            .into_iter()
            .map(|bucket| ReportBucket {
                label: bucket.label,
                total_cents: bucket.total_cents,
                categories: bucket
                    .categories
                    .into_iter()
                    .map(|c| CategoryTotal {
                        category: c.category.to_string(),
                        total_cents: c.total_cents,
                    })
                    .collect(),
            })
            .collect(),
    }))
}
