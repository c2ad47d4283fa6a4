use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};
use crate::models::{User, UserRole};

/// What the caller wants to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Composable access rule
///
/// Leaves are role/ownership predicates; `any_of`, `all_of` and `not`
/// combine them. `Owner` compares the caller with the owner of the resource
/// the rule is evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Anyone,
    Authenticated,
    Owner,
    Moderator,
    Admin,
    AnyOf(Vec<Rule>),
    AllOf(Vec<Rule>),
    Not(Box<Rule>),
}

pub fn any_of(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::AnyOf(rules.into_iter().collect())
}

pub fn all_of(rules: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::AllOf(rules.into_iter().collect())
}

pub fn not(rule: Rule) -> Rule {
    Rule::Not(Box::new(rule))
}

impl Rule {
    pub fn allows(&self, user: Option<&User>, owner_id: Option<Uuid>) -> bool {
        match self {
            Rule::Anyone => true,
            Rule::Authenticated => user.is_some(),
            Rule::Owner => match (user, owner_id) {
                (Some(user), Some(owner_id)) => user.id == owner_id,
                _ => false,
            },
            Rule::Moderator => user.is_some_and(|u| u.role == UserRole::Moderator),
            Rule::Admin => user.is_some_and(|u| u.role == UserRole::Admin),
            Rule::AnyOf(rules) => rules.iter().any(|r| r.allows(user, owner_id)),
            Rule::AllOf(rules) => rules.iter().all(|r| r.allows(user, owner_id)),
            Rule::Not(rule) => !rule.allows(user, owner_id),
        }
    }
}

/// Rules for modules, courses and lessons
///
/// Moderators curate existing content: they may edit anything but never
/// create or delete.
pub fn catalog_rule(action: Action) -> Rule {
    match action {
        Action::Read => Rule::Anyone,
        Action::Create => all_of([Rule::Authenticated, not(Rule::Moderator)]),
        Action::Update => any_of([Rule::Owner, Rule::Moderator, Rule::Admin]),
        Action::Delete => any_of([all_of([Rule::Owner, not(Rule::Moderator)]), Rule::Admin]),
    }
}

/// Rules for subscriptions; the owner is the subscriber
pub fn subscription_rule(action: Action) -> Rule {
    match action {
        Action::Create => Rule::Authenticated,
        Action::Read | Action::Update | Action::Delete => {
            all_of([Rule::Authenticated, any_of([Rule::Owner, Rule::Admin])])
        }
    }
}

/// Evaluate `rule` and turn a denial into the matching HTTP error
///
/// Anonymous callers get 401 so they know logging in may help; known callers
/// get 403.
pub fn authorize(rule: &Rule, user: Option<&User>, owner_id: Option<Uuid>) -> Result<(), HttpError> {
    if rule.allows(user, owner_id) {
        return Ok(());
    }

    match user {
        None => Err(HttpError::unauthorized(
            ErrorMessage::UserNotAuthenticated.to_string(),
        )),
        Some(user) => {
            tracing::warn!(user_id = %user.id, role = user.role.to_str(), "permission denied");
            Err(HttpError::forbidden(ErrorMessage::PermissionDenied.to_string()))
        }
    }
}
