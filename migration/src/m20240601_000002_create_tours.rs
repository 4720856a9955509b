use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tour::Table)
                    .if_not_exists()
                    .col(uuid(Tour::Id).primary_key())
                    .col(string_len(Tour::Name, 40).not_null().unique_key())
                    .col(string_len(Tour::Slug, 60).not_null())
                    .col(integer(Tour::Duration).not_null())
                    .col(integer(Tour::MaxGroupSize).not_null())
                    .col(string_len(Tour::Difficulty, 20).not_null())
                    .col(double(Tour::RatingsAverage).not_null().default(4.5))
                    .col(integer(Tour::RatingsQuantity).not_null().default(0))
                    .col(double(Tour::Price).not_null())
                    .col(double_null(Tour::PriceDiscount))
                    .col(string(Tour::Summary).not_null())
                    .col(text_null(Tour::Description))
                    .col(string(Tour::ImageCover).not_null())
                    // Arrays and GeoJSON points are kept as JSON documents.
                    .col(json(Tour::Images).not_null())
                    .col(json(Tour::StartDates).not_null())
                    .col(boolean(Tour::SecretTour).not_null().default(false))
                    .col(json_null(Tour::StartLocation))
                    .col(json(Tour::Locations).not_null())
                    .col(json(Tour::Guides).not_null())
                    .col(timestamp_with_time_zone(Tour::CreatedAt).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tour_price_ratings")
                    .table(Tour::Table)
                    .col(Tour::Price)
                    .col(Tour::RatingsAverage)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tour_slug")
                    .table(Tour::Table)
                    .col(Tour::Slug)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tour::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Tour {
    Table,
    Id,
    Name,
    Slug,
    Duration,
    MaxGroupSize,
    Difficulty,
    RatingsAverage,
    RatingsQuantity,
    Price,
    PriceDiscount,
    Summary,
    Description,
    ImageCover,
    Images,
    StartDates,
    SecretTour,
    StartLocation,
    Locations,
    Guides,
    CreatedAt,
}
