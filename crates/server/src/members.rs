//! Member API endpoints.

use api_types::member::{MemberItem, MemberListQuery, MemberNew, MemberPatch};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{MemberUpdate, NewMember};

use crate::{ServerError, server::ServerState};

fn to_item(model: engine::members::Model) -> MemberItem {
    MemberItem {
        id: model.id,
        name: model.name,
        nickname: model.nickname,
        color: model.color,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<MemberListQuery>,
) -> Result<Json<Vec<MemberItem>>, ServerError> {
    let members = state.engine.list_members(query.include_inactive).await?;
    Ok(Json(members.into_iter().map(to_item).collect()))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<MemberNew>,
) -> Result<(StatusCode, Json<MemberItem>), ServerError> {
    let model = state
        .engine
        .create_member(NewMember {
            name: payload.name,
            nickname: payload.nickname,
            color: payload.color,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(to_item(model))))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(member_id): Path<i32>,
    Json(payload): Json<MemberPatch>,
) -> Result<Json<MemberItem>, ServerError> {
    let model = state
        .engine
        .update_member(
            member_id,
            MemberUpdate {
                name: payload.name,
                nickname: payload.nickname,
                color: payload.color,
                is_active: payload.is_active,
            },
        )
        .await?;
    Ok(Json(to_item(model)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(member_id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_member(member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
