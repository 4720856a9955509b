use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_PHOTO: &str = "default.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "guide")]
    Guide,
    #[sea_orm(string_value = "lead-guide")]
    LeadGuide,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub photo: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTimeWithTimeZone>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTimeWithTimeZone>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the password changed after a token issued at `issued_at_ms`.
    pub fn changed_password_after(&self, issued_at_ms: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| changed.timestamp_millis() > issued_at_ms)
    }

    /// The public profile embedded in tours, reviews and bookings.
    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "photo": self.photo,
        })
    }

    /// Guide card embedded in tours.
    pub fn guide_summary(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "photo": self.photo,
            "role": self.role,
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn sample() -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Leo Gillespie".to_string(),
            email: "leo@example.io".to_string(),
            photo: DEFAULT_PHOTO.to_string(),
            role: UserRole::LeadGuide,
            password_hash: "hash".to_string(),
            password_changed_at: None,
            password_reset_token: Some("digest".to_string()),
            password_reset_expires: None,
            active: true,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn secrets_are_never_serialized() {
        let value = serde_json::to_value(sample()).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("passwordResetToken").is_none());
        assert!(value.get("active").is_none());
        assert_eq!(value["role"], "lead-guide");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn detects_password_change_after_issue() {
        let mut user = sample();
        let issued = Utc::now();
        assert!(!user.changed_password_after(issued.timestamp_millis()));

        user.password_changed_at = Some((issued - Duration::seconds(5)).into());
        assert!(!user.changed_password_after(issued.timestamp_millis()));

        user.password_changed_at = Some((issued + Duration::milliseconds(1)).into());
        assert!(user.changed_password_after(issued.timestamp_millis()));
    }
}
