//! Bill parsing endpoints.
//!
//! All four endpoints return transaction candidates only; nothing is
//! persisted until the client submits the reviewed rows through the
//! record batch endpoint.

use api_types::bill::{AnalyzeRequest, CandidateRecord, CandidatesResponse};
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use engine::{
    ALIPAY, BillFormat, BillInput, BillSource, EngineError, FreeTextBill, PdfBill, RawRecord,
    TabularBill, WECHAT,
};

use crate::{ServerError, server::ServerState};

fn candidates(records: Vec<RawRecord>) -> CandidatesResponse {
    let records: Vec<CandidateRecord> = records
        .into_iter()
        .map(|r| CandidateRecord {
            kind: r.kind.as_str().to_string(),
            category: r.category,
            amount_cents: r.amount_cents,
            date: r.date,
            remark: r.remark,
        })
        .collect();
    CandidatesResponse {
        count: records.len(),
        records,
    }
}

fn ai_client(state: &ServerState) -> Result<&engine::DeepSeekClient, ServerError> {
    state
        .ai
        .as_deref()
        .ok_or_else(|| ServerError::Engine(EngineError::Upstream("AI service is not configured".to_string())))
}

/// The interesting parts of an uploaded multipart form.
struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
    format: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ServerError> {
    let mut upload = Upload {
        filename: String::new(),
        content_type: None,
        bytes: Vec::new(),
        format: None,
    };
    let mut seen_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::Generic(format!("malformed multipart body: {err}")))?
    {
        match field.name() {
            Some("file") => {
                upload.filename = field.file_name().unwrap_or_default().to_string();
                upload.content_type = field.content_type().map(|ct| ct.to_string());
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ServerError::Generic(format!("failed to read upload: {err}")))?
                    .to_vec();
                seen_file = true;
            }
            Some("format") => {
                upload.format = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| ServerError::Generic(format!("failed to read field: {err}")))?,
                );
            }
            _ => {}
        }
    }

    if !seen_file {
        return Err(ServerError::Generic("file field required".to_string()));
    }
    Ok(upload)
}

pub async fn analyze(
    State(state): State<ServerState>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<CandidatesResponse>, ServerError> {
    let ai = ai_client(&state)?;
    let records = FreeTextBill::new(ai)
        .parse(BillInput::Text(&payload.text))
        .await?;
    Ok(Json(candidates(records)))
}

pub async fn parse_pdf(
    State(state): State<ServerState>,
    multipart: Multipart,
) -> Result<Json<CandidatesResponse>, ServerError> {
    let upload = read_upload(multipart).await?;
    if !upload.filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(ServerError::Engine(EngineError::UnsupportedFormat(
            format!("expected a .pdf file, got {:?}", upload.filename),
        )));
    }
    let ai = ai_client(&state)?;

    let records = PdfBill::new(ai)
        .parse(BillInput::Bytes(&upload.bytes))
        .await?;
    Ok(Json(candidates(records)))
}

pub async fn import(multipart: Multipart) -> Result<Json<CandidatesResponse>, ServerError> {
    let upload = read_upload(multipart).await?;
    let format = upload
        .format
        .ok_or_else(|| ServerError::Generic("format field required".to_string()))?;

    let layout = match BillFormat::try_from(format.as_str())? {
        BillFormat::AlipayCsv => &ALIPAY,
        BillFormat::WechatCsv => &WECHAT,
        other => {
            return Err(ServerError::Engine(EngineError::UnsupportedFormat(
                format!("{other:?} is not a tabular import format"),
            )));
        }
    };

    let records = TabularBill::new(layout)
        .parse(BillInput::Bytes(&upload.bytes))
        .await?;
    Ok(Json(candidates(records)))
}

/// Relay an upload to the private parsing backend and pass its JSON
/// response through unchanged.
pub async fn parse_proxy(
    State(state): State<ServerState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    let proxy_url = state.config.proxy_url.clone().ok_or_else(|| {
        ServerError::Engine(EngineError::Upstream(
            "parse backend is not configured".to_string(),
        ))
    })?;

    let upload = read_upload(multipart).await?;

    let mut part = reqwest::multipart::Part::bytes(upload.bytes).file_name(upload.filename);
    if let Some(content_type) = upload.content_type {
        part = part
            .mime_str(&content_type)
            .map_err(|_| ServerError::Generic("invalid content type".to_string()))?;
    }

    let form = reqwest::multipart::Form::new().part("file", part);
    let response = state
        .http
        .post(&proxy_url)
        .multipart(form)
        .send()
        .await
        .map_err(|err| {
            if err.is_connect() {
                ServerError::Engine(EngineError::Upstream(
                    "parse backend is not running".to_string(),
                ))
            } else {
                ServerError::Engine(EngineError::Upstream(err.to_string()))
            }
        })?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await.map_err(|err| {
        ServerError::Engine(EngineError::Upstream(format!(
            "parse backend returned a non-JSON response: {err}"
        )))
    })?;

    Ok((status, Json(body)))
}
