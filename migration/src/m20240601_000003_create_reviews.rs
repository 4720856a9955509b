use sea_orm_migration::{prelude::*, schema::*};

use super::m20240601_000001_create_users::User;
use super::m20240601_000002_create_tours::Tour;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(uuid(Review::Id).primary_key())
                    .col(text(Review::Review).not_null())
                    .col(integer(Review::Rating).not_null())
                    .col(uuid(Review::TourId).not_null())
                    .col(uuid(Review::UserId).not_null())
                    .col(timestamp_with_time_zone(Review::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_tour")
                            .from(Review::Table, Review::TourId)
                            .to(Tour::Table, Tour::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_user")
                            .from(Review::Table, Review::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One review per user and tour.
        manager
            .create_index(
                Index::create()
                    .name("idx_review_tour_user")
                    .table(Review::Table)
                    .col(Review::TourId)
                    .col(Review::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Review::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Review {
    Table,
    Id,
    Review,
    Rating,
    TourId,
    UserId,
    CreatedAt,
}
