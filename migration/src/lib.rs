pub use sea_orm_migration::prelude::*;

mod m20240601_000001_create_users;
mod m20240601_000002_create_tours;
mod m20240601_000003_create_reviews;
mod m20240601_000004_create_bookings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240601_000001_create_users::Migration),
            Box::new(m20240601_000002_create_tours::Migration),
            Box::new(m20240601_000003_create_reviews::Migration),
            Box::new(m20240601_000004_create_bookings::Migration),
        ]
    }
}
