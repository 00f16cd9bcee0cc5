//! Team CRUD and budget-status reads.
//!
//! Reads that must not trust the cached aggregate (single team, budget
//! status) recompute it from the expense records first; the cached value is
//! a fast path for listings only.

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    CreateTeamCmd, EngineError, ResultEngine, Team, TeamMember, UpdateTeamCmd,
    util::{ensure_non_negative_amount, normalize_team_name},
    expenses, team_members, teams,
};

use super::{Engine, ledger, with_tx};

/// Snapshot returned by the budget-status read.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetStatus {
    pub team_id: String,
    pub team_name: String,
    pub budget_minor: i64,
    pub current_spending_minor: i64,
    pub remaining_minor: i64,
    pub utilization_percent: f64,
    pub is_over_budget: bool,
    pub is_near_budget: bool,
    pub eighty_percent_sent: bool,
    pub hundred_percent_sent: bool,
}

fn validate_members(members: &[TeamMember]) -> ResultEngine<()> {
    for member in members {
        if member.name.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "member name must not be empty".to_string(),
            ));
        }
        if !member.email.contains('@') {
            return Err(EngineError::InvalidInput(format!(
                "member email is invalid: {}",
                member.email
            )));
        }
    }
    Ok(())
}

impl Engine {
    pub(super) async fn require_team_model(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
    ) -> ResultEngine<teams::Model> {
        teams::Entity::find_by_id(team_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("team not exists".to_string()))
    }

    pub(super) async fn load_members(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
    ) -> ResultEngine<Vec<TeamMember>> {
        let rows = team_members::Entity::find()
            .filter(team_members::Column::TeamId.eq(team_id.to_string()))
            .order_by_asc(team_members::Column::Position)
            .all(db_tx)
            .await?;

        let mut members = Vec::with_capacity(rows.len());
        for row in rows {
            members.push(TeamMember {
                name: row.name,
                email: row.email,
                role: crate::MemberRole::try_from(row.role.as_str())?,
            });
        }
        Ok(members)
    }

    async fn replace_members(
        &self,
        db_tx: &DatabaseTransaction,
        team_id: &str,
        members: &[TeamMember],
    ) -> ResultEngine<()> {
        team_members::Entity::delete_many()
            .filter(team_members::Column::TeamId.eq(team_id.to_string()))
            .exec(db_tx)
            .await?;

        for (position, member) in members.iter().enumerate() {
            let row = team_members::ActiveModel {
                team_id: ActiveValue::Set(team_id.to_string()),
                position: ActiveValue::Set(position as i32),
                name: ActiveValue::Set(member.name.clone()),
                email: ActiveValue::Set(member.email.clone()),
                role: ActiveValue::Set(member.role.as_str().to_string()),
            };
            row.insert(db_tx).await?;
        }
        Ok(())
    }

    /// Add a new team.
    pub async fn create_team(&self, cmd: CreateTeamCmd) -> ResultEngine<String> {
        let name = normalize_team_name(&cmd.name)?;
        ensure_non_negative_amount(cmd.budget_minor, "budget_minor")?;
        validate_members(&cmd.members)?;

        let team = Team::new(name.clone(), cmd.budget_minor, cmd.members.clone());
        let team_id = team.id.clone();
        let team_entry: teams::ActiveModel = (&team).into();

        with_tx!(self, |db_tx| {
            // Enforce unique team names (case-insensitive) to avoid ambiguous
            // name lookups.
            let exists = teams::Entity::find()
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(name));
            }

            team_entry.insert(&db_tx).await?;
            self.replace_members(&db_tx, &team_id, &cmd.members).await?;
            Ok(team_id)
        })
    }

    /// Return a single team with its members.
    ///
    /// The spending aggregate is recomputed from the expense records before
    /// being returned.
    pub async fn team(&self, team_id: &str) -> ResultEngine<Team> {
        let _guard = self.lock_team(team_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_team_model(&db_tx, team_id).await?;
            let recomputed = self.recompute_spending_tx(&db_tx, team_id).await?;
            let members = self.load_members(&db_tx, team_id).await?;

            let mut team = Team::from(model);
            team.current_spending_minor = recomputed;
            team.members = members;
            Ok(team)
        })
    }

    /// List all teams, ordered by name. Uses the cached aggregates.
    pub async fn list_teams(&self) -> ResultEngine<Vec<Team>> {
        with_tx!(self, |db_tx| {
            let models = teams::Entity::find()
                .order_by_asc(teams::Column::Name)
                .all(&db_tx)
                .await?;

            let mut result = Vec::with_capacity(models.len());
            for model in models {
                let members = self.load_members(&db_tx, &model.id).await?;
                let mut team = Team::from(model);
                team.members = members;
                result.push(team);
            }
            Ok(result)
        })
    }

    /// Patch a team's name, budget and/or member list.
    pub async fn update_team(&self, team_id: &str, cmd: UpdateTeamCmd) -> ResultEngine<()> {
        let name = cmd.name.as_deref().map(normalize_team_name).transpose()?;
        if let Some(budget_minor) = cmd.budget_minor {
            ensure_non_negative_amount(budget_minor, "budget_minor")?;
        }
        if let Some(members) = &cmd.members {
            validate_members(members)?;
        }

        let _guard = self.lock_team(team_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_team_model(&db_tx, team_id).await?;

            if let Some(name) = &name
                && !name.eq_ignore_ascii_case(&model.name)
            {
                let exists = teams::Entity::find()
                    .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                    .filter(teams::Column::Id.ne(team_id.to_string()))
                    .one(&db_tx)
                    .await?
                    .is_some();
                if exists {
                    return Err(EngineError::ExistingKey(name.clone()));
                }
            }

            if name.is_some() || cmd.budget_minor.is_some() {
                let mut active = teams::ActiveModel {
                    id: ActiveValue::Set(team_id.to_string()),
                    ..Default::default()
                };
                if let Some(name) = name {
                    active.name = ActiveValue::Set(name);
                }
                if let Some(budget_minor) = cmd.budget_minor {
                    active.budget_minor = ActiveValue::Set(budget_minor);
                }
                active.update(&db_tx).await?;
            }

            if let Some(members) = &cmd.members {
                self.replace_members(&db_tx, team_id, members).await?;
            }
            Ok(())
        })
    }

    /// Delete a team. Refused while any expense still references it.
    pub async fn delete_team(&self, team_id: &str) -> ResultEngine<()> {
        let _guard = self.lock_team(team_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_team_model(&db_tx, team_id).await?;

            let referencing = expenses::Entity::find()
                .filter(expenses::Column::TeamId.eq(team_id.to_string()))
                .limit(1)
                .all(&db_tx)
                .await?;
            if !referencing.is_empty() {
                return Err(EngineError::TeamNotEmpty(model.name));
            }

            team_members::Entity::delete_many()
                .filter(team_members::Column::TeamId.eq(team_id.to_string()))
                .exec(&db_tx)
                .await?;
            teams::Entity::delete_by_id(team_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Budget status snapshot. Recomputes the aggregate before answering.
    pub async fn team_budget_status(&self, team_id: &str) -> ResultEngine<BudgetStatus> {
        let _guard = self.lock_team(team_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_team_model(&db_tx, team_id).await?;
            let spending = self.recompute_spending_tx(&db_tx, team_id).await?;
            let utilization_percent = ledger::utilization(spending, model.budget_minor);

            Ok(BudgetStatus {
                team_id: model.id,
                team_name: model.name,
                budget_minor: model.budget_minor,
                current_spending_minor: spending,
                remaining_minor: model.budget_minor - spending,
                utilization_percent,
                is_over_budget: utilization_percent > ledger::HUNDRED_PERCENT,
                is_near_budget: utilization_percent >= ledger::EIGHTY_PERCENT,
                eighty_percent_sent: model.eighty_percent_sent,
                hundred_percent_sent: model.hundred_percent_sent,
            })
        })
    }
}
