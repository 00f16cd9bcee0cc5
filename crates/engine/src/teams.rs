//! Team primitives.
//!
//! A `Team` owns a budget and the derived `current_spending_minor` aggregate:
//! the sum of `amount_minor` over the team's approved expenses. The aggregate
//! is cached on the row for fast reads and must stay reconcilable by full
//! recomputation from the expense records.
//!
//! `eighty_percent_sent`/`hundred_percent_sent` are one-way alert latches,
//! only reset by an administrative action. `version` is the optimistic
//! concurrency stamp bumped on every aggregate write.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl TryFrom<&str> for MemberRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(EngineError::InvalidInput(format!(
                "invalid member role: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub budget_minor: i64,
    pub current_spending_minor: i64,
    pub eighty_percent_sent: bool,
    pub hundred_percent_sent: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    /// Ordered member list, loaded from `team_members`.
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn new(name: String, budget_minor: i64, members: Vec<TeamMember>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            budget_minor,
            current_spending_minor: 0,
            eighty_percent_sent: false,
            hundred_percent_sent: false,
            version: 0,
            created_at: Utc::now(),
            members,
        }
    }

    pub fn member_emails(&self) -> Vec<String> {
        self.members.iter().map(|m| m.email.clone()).collect()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub budget_minor: i64,
    pub current_spending_minor: i64,
    pub eighty_percent_sent: bool,
    pub hundred_percent_sent: bool,
    pub version: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::team_members::Entity")]
    TeamMembers,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::team_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeamMembers.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Team> for ActiveModel {
    fn from(team: &Team) -> Self {
        Self {
            id: ActiveValue::Set(team.id.clone()),
            name: ActiveValue::Set(team.name.clone()),
            budget_minor: ActiveValue::Set(team.budget_minor),
            current_spending_minor: ActiveValue::Set(team.current_spending_minor),
            eighty_percent_sent: ActiveValue::Set(team.eighty_percent_sent),
            hundred_percent_sent: ActiveValue::Set(team.hundred_percent_sent),
            version: ActiveValue::Set(team.version),
            created_at: ActiveValue::Set(team.created_at),
        }
    }
}

impl From<Model> for Team {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            budget_minor: model.budget_minor,
            current_spending_minor: model.current_spending_minor,
            eighty_percent_sent: model.eighty_percent_sent,
            hundred_percent_sent: model.hundred_percent_sent,
            version: model.version,
            created_at: model.created_at,
            members: Vec::new(),
        }
    }
}
