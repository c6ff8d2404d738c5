use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PromotionRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PromotionRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PromotionRecords::SourceId).uuid().not_null())
                    .col(ColumnDef::new(PromotionRecords::OriginatingQuery).string())
                    .col(
                        ColumnDef::new(PromotionRecords::ValueScore)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_promotion_records_source")
                            .from(PromotionRecords::Table, PromotionRecords::SourceId)
                            .to(Sources::Table, Sources::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_promotion_records_source")
                    .table(PromotionRecords::Table)
                    .col(PromotionRecords::SourceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PromotionRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PromotionRecords {
    Table,
    Id,
    SourceId,
    OriginatingQuery,
    ValueScore,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Sources {
    Table,
    Id,
}
