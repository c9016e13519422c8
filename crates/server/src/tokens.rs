//! API tokens: long-lived programmatic access keys.
//!
//! The full token value leaves the server exactly once, in the create
//! response; listings only ever show a masked form. Token management is
//! reserved to interactive (JWT) sessions so a leaked token cannot mint
//! more of itself.

use api_types::auth::{TokenCreate, TokenCreated, TokenSummary, TokenToggle};
use axum::{Extension, Json, extract::Path, extract::State, http::StatusCode};
use chrono::Utc;
use sea_orm::{ActiveValue, QueryOrder, entity::prelude::*};

use crate::{
    ServerError, auth,
    server::{AuthIdentity, ServerState},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "api_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub token: String,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub last_used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

fn masked(token: &str) -> String {
    if token.len() < 12 {
        return "...".to_string();
    }
    format!("{}...{}", &token[..8], &token[token.len() - 4..])
}

/// Token management requires an interactive session.
fn require_session(identity: &AuthIdentity) -> Result<(), ServerError> {
    match identity {
        AuthIdentity::User(_) => Ok(()),
        AuthIdentity::ApiToken(_) => Err(ServerError::Auth),
    }
}

pub async fn create(
    Extension(identity): Extension<AuthIdentity>,
    State(state): State<ServerState>,
    Json(payload): Json<TokenCreate>,
) -> Result<(StatusCode, Json<TokenCreated>), ServerError> {
    require_session(&identity)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ServerError::Generic("token name required".to_string()));
    }

    let model = ActiveModel {
        id: ActiveValue::NotSet,
        name: ActiveValue::Set(name),
        token: ActiveValue::Set(auth::generate_api_token()),
        is_active: ActiveValue::Set(true),
        created_at: ActiveValue::Set(Utc::now()),
        last_used_at: ActiveValue::Set(None),
    }
    .insert(&state.db)
    .await
    .map_err(engine::EngineError::from)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenCreated {
            id: model.id,
            name: model.name,
            token: model.token,
            created_at: model.created_at,
        }),
    ))
}

pub async fn list(
    Extension(identity): Extension<AuthIdentity>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<TokenSummary>>, ServerError> {
    require_session(&identity)?;

    let models = Entity::find()
        .order_by_asc(Column::Id)
        .all(&state.db)
        .await
        .map_err(engine::EngineError::from)?;

    Ok(Json(
        models
            .into_iter()
            .map(|m| TokenSummary {
                id: m.id,
                name: m.name,
                token: masked(&m.token),
                is_active: m.is_active,
                created_at: m.created_at,
                last_used_at: m.last_used_at,
            })
            .collect(),
    ))
}

pub async fn toggle(
    Extension(identity): Extension<AuthIdentity>,
    State(state): State<ServerState>,
    Path(token_id): Path<i32>,
    Json(payload): Json<TokenToggle>,
) -> Result<Json<TokenSummary>, ServerError> {
    require_session(&identity)?;

    let model = Entity::find_by_id(token_id)
        .one(&state.db)
        .await
        .map_err(engine::EngineError::from)?
        .ok_or_else(|| {
            ServerError::Engine(engine::EngineError::KeyNotFound("token not exists".to_string()))
        })?;

    let mut active: ActiveModel = model.into();
    active.is_active = ActiveValue::Set(payload.is_active);
    let model = active
        .update(&state.db)
        .await
        .map_err(engine::EngineError::from)?;

    Ok(Json(TokenSummary {
        id: model.id,
        name: model.name,
        token: masked(&model.token),
        is_active: model.is_active,
        created_at: model.created_at,
        last_used_at: model.last_used_at,
    }))
}

pub async fn delete(
    Extension(identity): Extension<AuthIdentity>,
    State(state): State<ServerState>,
    Path(token_id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    require_session(&identity)?;

    let model = Entity::find_by_id(token_id)
        .one(&state.db)
        .await
        .map_err(engine::EngineError::from)?
        .ok_or_else(|| {
            ServerError::Engine(engine::EngineError::KeyNotFound("token not exists".to_string()))
        })?;

    model
        .delete(&state.db)
        .await
        .map_err(engine::EngineError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_keeps_only_the_ends() {
        let token = "0123456789abcdef0123456789abcdef";
        assert_eq!(masked(token), "01234567...cdef");
    }

    #[test]
    fn short_values_are_fully_masked() {
        assert_eq!(masked("abc"), "...");
    }
}
