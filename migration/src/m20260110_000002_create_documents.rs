use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Documents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Documents::SourceId).uuid().not_null())
                    .col(ColumnDef::new(Documents::Url).string().not_null())
                    .col(ColumnDef::new(Documents::ContentHash).string())
                    .col(ColumnDef::new(Documents::Title).string())
                    .col(ColumnDef::new(Documents::Text).text())
                    .col(ColumnDef::new(Documents::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Documents::ExtractionStatus).string().not_null())
                    .col(ColumnDef::new(Documents::EnrichmentStatus).string().not_null())
                    .col(ColumnDef::new(Documents::FetchedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Documents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Documents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_documents_source")
                            .from(Documents::Table, Documents::SourceId)
                            .to(Sources::Table, Sources::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // (source_id, url)全局唯一，幂等物化依赖此约束
        manager
            .create_index(
                Index::create()
                    .name("idx_documents_source_url")
                    .table(Documents::Table)
                    .col(Documents::SourceId)
                    .col(Documents::Url)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_url")
                    .table(Documents::Table)
                    .col(Documents::Url)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    SourceId,
    Url,
    ContentHash,
    Title,
    Text,
    PublishedAt,
    ExtractionStatus,
    EnrichmentStatus,
    FetchedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Sources {
    Table,
    Id,
}
