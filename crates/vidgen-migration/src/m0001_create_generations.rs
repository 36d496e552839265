use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Generations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Generations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Generations::Prompt).text().not_null())
                    .col(ColumnDef::new(Generations::Style).string().null())
                    .col(
                        ColumnDef::new(Generations::AspectRatio)
                            .string()
                            .not_null()
                            .default("16:9"),
                    )
                    .col(
                        ColumnDef::new(Generations::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Generations::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Generations::VideoUrl).text().null())
                    .col(ColumnDef::new(Generations::ThumbnailUrl).text().null())
                    .col(
                        ColumnDef::new(Generations::CreatedAt)
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
                    .name("idx_generations_created_at")
                    .table(Generations::Table)
                    .col(Generations::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_generations_created_at")
                    .table(Generations::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Generations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Generations {
    Table,
    Id,
    Prompt,
    Style,
    AspectRatio,
    Status,
    Progress,
    VideoUrl,
    ThumbnailUrl,
    CreatedAt,
}
