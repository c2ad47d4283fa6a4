use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role used by the access policy
///
/// Stored in PostgreSQL as the `user_role` ENUM. Variants are lowercased in the
/// database and in JSON (Admin -> "admin").
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,     // Full access to every resource
    Moderator, // May edit catalog entries, never create or delete them
    User,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Moderator => "moderator",
            UserRole::User => "user",
        }
    }
}

/// Authenticated caller
///
/// Accounts are managed by the identity service that issues the JWTs;
/// this backend only reads them.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_MODULE_PRICE: i32 = 10000;
pub const DEFAULT_COURSE_PRICE: i32 = 5000;

/// Educational module, the top of the catalog
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Module {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: i32,
    #[serde(rename = "owner")]
    pub owner_id: Option<Uuid>, // Cleared when the owner is deleted
}

/// Course, optionally attached to one module
///
/// `module_id` is unique: a module has at most one course, which is the course
/// a module subscription cascades to.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Course {
    pub id: i64,
    #[serde(rename = "module")]
    pub module_id: Option<i64>,
    pub title: String,
    pub preview: Option<String>,
    pub description: String,
    pub price: i32,
    #[serde(rename = "owner")]
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Lesson {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub preview: Option<String>,
    pub video: Option<String>,
    #[serde(rename = "owner")]
    pub owner_id: Option<Uuid>,
}

/// What a subscription points at
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "subscription_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Module,
    #[default]
    Course,
}

impl SubscriptionType {
    pub fn to_str(&self) -> &'static str {
        match self {
            SubscriptionType::Module => "module",
            SubscriptionType::Course => "course",
        }
    }
}

/// Subscription of a user to a module or a course
///
/// The reference matching `subscription_type` is always populated for rows
/// created through the API; the other one may be set by an explicit update.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    #[serde(rename = "subscriber")]
    pub subscriber_id: Option<Uuid>,
    pub subscription_type: SubscriptionType,
    #[serde(rename = "module")]
    pub module_id: Option<i64>,
    #[serde(rename = "course")]
    pub course_id: Option<i64>,
}

/// Key of a toggle: the subscriber's row for one module or one course
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTarget {
    Module(i64),
    Course(i64),
}

impl SubscriptionTarget {
    pub fn kind(&self) -> SubscriptionType {
        match self {
            SubscriptionTarget::Module(_) => SubscriptionType::Module,
            SubscriptionTarget::Course(_) => SubscriptionType::Course,
        }
    }
}

/// Result of flipping one subscription row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed,
}

/// Module-update notification claimed from the outbox
///
/// `attempts` counts claims, including the current one.
#[derive(Debug, sqlx::FromRow, Clone, PartialEq)]
pub struct PendingNotification {
    pub id: i64,
    pub module_id: i64,
    pub attempts: i32,
}
