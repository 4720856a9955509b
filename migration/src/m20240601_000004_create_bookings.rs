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
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::TourId).not_null())
                    .col(uuid(Booking::UserId).not_null())
                    .col(double(Booking::Price).not_null())
                    .col(boolean(Booking::Paid).not_null().default(true))
                    .col(timestamp_with_time_zone(Booking::CreatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_tour")
                            .from(Booking::Table, Booking::TourId)
                            .to(Tour::Table, Tour::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    TourId,
    UserId,
    Price,
    Paid,
    CreatedAt,
}
