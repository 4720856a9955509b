use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Roles are stored as strings so the schema stays portable between
        // PostgreSQL and SQLite.
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(string_len(User::Name, 100).not_null())
                    .col(string_len(User::Email, 255).not_null().unique_key())
                    .col(string_len(User::Photo, 255).not_null().default("default.jpg"))
                    .col(string_len(User::Role, 20).not_null().default("user"))
                    .col(string_len(User::PasswordHash, 255).not_null())
                    .col(timestamp_with_time_zone_null(User::PasswordChangedAt))
                    .col(string_len_null(User::PasswordResetToken, 64))
                    .col(timestamp_with_time_zone_null(User::PasswordResetExpires))
                    .col(boolean(User::Active).not_null().default(true))
                    .col(timestamp_with_time_zone(User::CreatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Name,
    Email,
    Photo,
    Role,
    PasswordHash,
    PasswordChangedAt,
    PasswordResetToken,
    PasswordResetExpires,
    Active,
    CreatedAt,
}
