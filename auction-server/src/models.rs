use {
    crate::kernel::entities::UserId,
    serde::{
        Deserialize,
        Serialize,
    },
};

pub type AccessToken = String;

#[derive(Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Dealer,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id:   UserId,
    pub name: String,
    pub role: UserRole,
}
