//! Initial schema migration - creates all tables from scratch.
//!
//! - `teams`: budget owners with the cached spending aggregate, alert
//!   latches and the optimistic-concurrency version stamp
//! - `team_members`: ordered member list per team (alert recipients)
//! - `expenses`: the approval-lifecycle records

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Teams {
    Table,
    Id,
    Name,
    BudgetMinor,
    CurrentSpendingMinor,
    EightyPercentSent,
    HundredPercentSent,
    Version,
    CreatedAt,
}

#[derive(Iden)]
enum TeamMembers {
    Table,
    TeamId,
    Position,
    Name,
    Email,
    Role,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    TeamId,
    Description,
    AmountMinor,
    Category,
    AiSuggestedCategory,
    IncurredOn,
    Status,
    SubmittedByName,
    SubmittedByEmail,
    ApprovedByName,
    ApprovedByEmail,
    DecidedAt,
    IsDuplicate,
    DuplicateReason,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Teams
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Teams::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Teams::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Teams::Name).string().not_null())
                    .col(
                        ColumnDef::new(Teams::BudgetMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Teams::CurrentSpendingMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Teams::EightyPercentSent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Teams::HundredPercentSent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Teams::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Teams::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-teams-name-unique")
                    .table(Teams::Table)
                    .col(Teams::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Team members
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TeamMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TeamMembers::TeamId).string().not_null())
                    .col(ColumnDef::new(TeamMembers::Position).integer().not_null())
                    .col(ColumnDef::new(TeamMembers::Name).string().not_null())
                    .col(ColumnDef::new(TeamMembers::Email).string().not_null())
                    .col(ColumnDef::new(TeamMembers::Role).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(TeamMembers::TeamId)
                            .col(TeamMembers::Position),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-team_members-team_id")
                            .from(TeamMembers::Table, TeamMembers::TeamId)
                            .to(Teams::Table, Teams::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::TeamId).string().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::Category).string().not_null())
                    .col(ColumnDef::new(Expenses::AiSuggestedCategory).string())
                    .col(ColumnDef::new(Expenses::IncurredOn).date().not_null())
                    .col(
                        ColumnDef::new(Expenses::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Expenses::SubmittedByName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::SubmittedByEmail)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::ApprovedByName).string())
                    .col(ColumnDef::new(Expenses::ApprovedByEmail).string())
                    .col(ColumnDef::new(Expenses::DecidedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Expenses::IsDuplicate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Expenses::DuplicateReason).string())
                    .col(
                        ColumnDef::new(Expenses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-team_id")
                            .from(Expenses::Table, Expenses::TeamId)
                            .to(Teams::Table, Teams::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-team_id-status")
                    .table(Expenses::Table)
                    .col(Expenses::TeamId)
                    .col(Expenses::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-incurred_on")
                    .table(Expenses::Table)
                    .col(Expenses::IncurredOn)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;
        Ok(())
    }
}
