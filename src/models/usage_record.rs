//! UsageRecord entity model
//!
//! Billable character usage written while a session runs. Old sessions get
//! their fine-grained rows folded into one consolidated row per language.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub session_id: Uuid,

    pub organisation_id: Uuid,

    pub language: Option<String>,

    pub character_count: i64,

    /// Concurrent listener count at the time of the record
    pub client_count: i32,

    pub date: Date,

    /// Consolidated rows are terminal and never consolidated again
    pub is_consolidated: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::usage_session::Entity",
        from = "Column::SessionId",
        to = "super::usage_session::Column::Id"
    )]
    Session,
}

impl Related<super::usage_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
