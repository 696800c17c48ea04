//! Domain library for the postr backend.
//!
//! This crate is dependency-light (serde only, inherited from the workspace)
//! and holds the domain types, ports (traits), services, and error
//! definitions. Keep adapters and IO concerns out of this crate.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use serde::Serialize;

/// An account record. Created once, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub created_at: SystemTime,
}

/// A note authored by a user. The `user_id` must reference an existing user
/// at creation time; it is not re-validated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub created_at: SystemTime,
}

/// Input data for creating a new user. Identifier and timestamp are always
/// server-assigned and never accepted from callers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

/// Input data for creating a new post.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: String,
    pub title: String,
    pub body: String,
}

/// Page window metadata for a user listing. Pages are 1-indexed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_size: u64,
}

/// One page of users plus the window metadata. A view recomputed on every
/// `list` call, never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginatedUsers {
    pub pagination: Pagination,
    pub users: Vec<User>,
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Identifier source; UUID v4 in the server, fixed values in tests.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Single-purpose user-existence capability. The post service depends on this
/// and nothing else from the user store.
pub trait UserLookup: Send + Sync {
    fn exists(&self, id: &str) -> Result<bool, StoreError>;
}

/// Store port for persisting and loading users.
///
/// `list` takes raw offset/limit primitives; the pagination math lives in the
/// service layer.
pub trait UserStore: UserLookup {
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Option<User>, StoreError>;
    fn count(&self) -> Result<u64, StoreError>;
    fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError>;
}

/// Store port for persisting and loading posts.
pub trait PostStore: Send + Sync {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError>;
    /// All posts for a user, in store-native order.
    fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, StoreError>;
    /// Delete by id. Signals `RowAbsent` when no row matched, so a second
    /// delete of the same id fails rather than silently succeeding.
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

// Forwarding impls so one store instance can back several services.
impl<T: UserLookup + ?Sized> UserLookup for std::sync::Arc<T> {
    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        (**self).exists(id)
    }
}

impl<T: UserStore + ?Sized> UserStore for std::sync::Arc<T> {
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        (**self).insert_user(user)
    }
    fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        (**self).get(id)
    }
    fn count(&self) -> Result<u64, StoreError> {
        (**self).count()
    }
    fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        (**self).list(offset, limit)
    }
}

impl<T: PostStore + ?Sized> PostStore for std::sync::Arc<T> {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        (**self).insert_post(post)
    }
    fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        (**self).list_by_user(user_id)
    }
    fn delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id)
    }
}

/// Errors crossing the store boundary. Services translate these into the
/// client-facing [`DomainError`] taxonomy; the backend text never reaches
/// clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The lookup/delete target does not exist.
    RowAbsent,
    /// Any other store failure, with the backend's own description.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::RowAbsent => write!(f, "row absent"),
            StoreError::Backend(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl Error for StoreError {}

/// Client-facing error taxonomy. Closed and flat: no nested causes are ever
/// exposed to callers.
///
/// Equality is defined by the stable code alone. Two errors with the same
/// code are interchangeable for client handling, whatever their payload.
#[derive(Clone, Debug)]
pub enum DomainError {
    UserNotFound,
    PostNotFound,
    InvalidInput(Option<BTreeMap<String, String>>),
    CreateUser,
    Internal,
}

impl DomainError {
    /// Machine-stable code; uniquely determines the semantic category.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::UserNotFound => "USR-404001",
            DomainError::PostNotFound => "PST-404001",
            DomainError::InvalidInput(_) => "APP-400",
            DomainError::CreateUser => "USR-400101",
            DomainError::Internal => "APP-500",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DomainError::UserNotFound => "User not found",
            DomainError::PostNotFound => "Post not found",
            DomainError::InvalidInput(_) => "Invalid input data",
            DomainError::CreateUser => "Failed to create user",
            DomainError::Internal => "Internal server error - Unable to handle request",
        }
    }

    /// Per-field validation messages, present only on `InvalidInput` built
    /// from a validation pass.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            DomainError::InvalidInput(errs) => errs.as_ref(),
            _ => None,
        }
    }

    /// Build an `InvalidInput` carrying validation errors.
    pub fn with_field_errors(errs: BTreeMap<String, String>) -> Self {
        DomainError::InvalidInput(Some(errs))
    }
}

impl PartialEq for DomainError {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for DomainError {}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl Error for DomainError {}

pub mod adapters;
pub mod service;
pub mod validate;
