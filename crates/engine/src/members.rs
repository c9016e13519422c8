//! Household members.
//!
//! Members attribute records to a person. Deleting a member keeps the
//! records and nulls their attribution; `is_active` is the soft switch
//! for members that should stay out of pickers without losing history.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Palette cycled through when a new member does not pick a color.
pub const MEMBER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9",
];

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub nickname: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::records::Entity")]
    Records,
}

impl Related<super::records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NewMember {
    pub name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Patch for an existing member; absent fields are left unchanged.
///
/// `nickname` is doubly optional: the outer level distinguishes "leave
/// alone" from "write", the inner level allows writing back `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub nickname: Option<Option<String>>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

/// First palette entry no existing member uses, wrapping around once
/// the palette is exhausted.
pub(crate) fn next_color(taken: &[String]) -> &'static str {
    MEMBER_COLORS
        .iter()
        .find(|color| !taken.iter().any(|t| t == **color))
        .copied()
        .unwrap_or(MEMBER_COLORS[taken.len() % MEMBER_COLORS.len()])
}

pub(crate) fn active_model_for_new(
    member: NewMember,
    color: String,
    now: DateTimeUtc,
) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::NotSet,
        name: ActiveValue::Set(member.name),
        nickname: ActiveValue::Set(member.nickname),
        color: ActiveValue::Set(color),
        is_active: ActiveValue::Set(true),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
    }
}
