use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnrichmentResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnrichmentResults::DocumentId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EnrichmentResults::Provider).string().not_null())
                    .col(ColumnDef::new(EnrichmentResults::Urgency).integer().not_null())
                    .col(ColumnDef::new(EnrichmentResults::Category).string().not_null())
                    .col(ColumnDef::new(EnrichmentResults::Summary).text().not_null())
                    .col(ColumnDef::new(EnrichmentResults::Tags).json().not_null())
                    .col(ColumnDef::new(EnrichmentResults::EmbeddingRef).uuid())
                    .col(
                        ColumnDef::new(EnrichmentResults::EnrichedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrichment_results_document")
                            .from(EnrichmentResults::Table, EnrichmentResults::DocumentId)
                            .to(Documents::Table, Documents::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrichment_results_urgency")
                    .table(EnrichmentResults::Table)
                    .col(EnrichmentResults::Urgency)
                    .col(EnrichmentResults::EnrichedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EnrichmentResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EnrichmentResults {
    Table,
    DocumentId,
    Provider,
    Urgency,
    Category,
    Summary,
    Tags,
    EmbeddingRef,
    EnrichedAt,
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
}
