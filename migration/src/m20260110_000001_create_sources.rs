use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sources::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sources::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Sources::RootUrl)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Sources::DiscoveryMode).string().not_null())
                    .col(
                        ColumnDef::new(Sources::CrawlDepthLimit)
                            .integer()
                            .not_null()
                            .default(2),
                    )
                    .col(ColumnDef::new(Sources::Status).string().not_null())
                    .col(ColumnDef::new(Sources::ScheduleIntervalSecs).big_integer())
                    .col(ColumnDef::new(Sources::LastRunAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Sources::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Sources::EvaluationStartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Sources::OriginatingQuery).string())
                    .col(
                        ColumnDef::new(Sources::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Sources::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sources_status")
                    .table(Sources::Table)
                    .col(Sources::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sources::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Sources {
    Table,
    Id,
    RootUrl,
    DiscoveryMode,
    CrawlDepthLimit,
    Status,
    ScheduleIntervalSecs,
    LastRunAt,
    ConsecutiveFailures,
    EvaluationStartedAt,
    OriginatingQuery,
    CreatedAt,
    UpdatedAt,
}
