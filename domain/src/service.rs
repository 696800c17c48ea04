use std::collections::BTreeMap;

use crate::validate;
use crate::{
    Clock, DomainError, IdGenerator, NewPost, NewUser, PaginatedUsers, Pagination, Post,
    PostStore, StoreError, User, UserLookup, UserStore,
};

/// Application service owning the user lifecycle and pagination.
///
/// It remains generic over store, id generator, and clock, holds them as
/// immutable constructor-injected dependencies, and keeps no state between
/// calls. This keeps the domain testable without external dependencies and
/// safe to run as N independent instances.
pub struct UserService<R: UserStore, G: IdGenerator, C: Clock> {
    store: R,
    ids: G,
    clock: C,
}

impl<R: UserStore, G: IdGenerator, C: Clock> UserService<R, G, C> {
    pub fn new(store: R, ids: G, clock: C) -> Self {
        Self { store, ids, clock }
    }

    /// Create a new user. Caller-supplied identifier/timestamp never exist in
    /// the input type; both are assigned here.
    pub fn create(&self, input: NewUser) -> Result<User, DomainError> {
        validate::new_user(&input)?;

        let user = User {
            id: self.ids.next_id(),
            firstname: input.firstname,
            lastname: input.lastname,
            email: input.email,
            street: input.street,
            city: input.city,
            state: input.state,
            zipcode: input.zipcode,
            created_at: self.clock.now(),
        };
        self.store
            .insert_user(&user)
            .map_err(|_| DomainError::CreateUser)?;
        Ok(user)
    }

    /// Fetch one user by id.
    pub fn get(&self, id: &str) -> Result<User, DomainError> {
        match self.store.get(id) {
            Ok(Some(user)) => Ok(user),
            Ok(None) | Err(StoreError::RowAbsent) => Err(DomainError::UserNotFound),
            Err(StoreError::Backend(_)) => Err(DomainError::Internal),
        }
    }

    /// One 1-indexed page of users plus window metadata.
    ///
    /// Non-positive paging values are rejected as invalid input rather than
    /// producing negative offsets. There is no upper clamp: a page past the
    /// end yields an empty user list with accurate totals, which is not an
    /// error condition.
    pub fn list(&self, page_number: i64, page_size: i64) -> Result<PaginatedUsers, DomainError> {
        let mut errs = BTreeMap::new();
        if page_number < 1 {
            errs.insert("pageNumber".to_string(), "must be at least 1".to_string());
        }
        if page_size < 1 {
            errs.insert("pageSize".to_string(), "must be at least 1".to_string());
        }
        if !errs.is_empty() {
            return Err(DomainError::with_field_errors(errs));
        }
        let (page_number, page_size) = (page_number as u64, page_size as u64);

        let total = self.store.count().map_err(|_| DomainError::Internal)?;
        let offset = (page_number - 1).saturating_mul(page_size);
        let users = self
            .store
            .list(offset, page_size)
            .map_err(|_| DomainError::Internal)?;

        Ok(PaginatedUsers {
            pagination: Pagination {
                current_page: page_number,
                total_pages: total.div_ceil(page_size),
                total_size: total,
            },
            users,
        })
    }

    /// Total user row count.
    pub fn count(&self) -> Result<u64, DomainError> {
        self.store.count().map_err(|_| DomainError::Internal)
    }
}

/// Application service owning the post lifecycle.
///
/// Depends on the post store plus the narrow user-existence capability, not
/// the full user store.
pub struct PostService<P: PostStore, U: UserLookup, G: IdGenerator, C: Clock> {
    posts: P,
    users: U,
    ids: G,
    clock: C,
}

impl<P: PostStore, U: UserLookup, G: IdGenerator, C: Clock> PostService<P, U, G, C> {
    pub fn new(posts: P, users: U, ids: G, clock: C) -> Self {
        Self {
            posts,
            users,
            ids,
            clock,
        }
    }

    /// Create a new post. The owner must exist before any write is attempted;
    /// no partial post is ever persisted for a nonexistent user.
    pub fn create(&self, input: NewPost) -> Result<Post, DomainError> {
        validate::new_post(&input)?;
        self.ensure_user_exists(&input.user_id)?;

        let post = Post {
            id: self.ids.next_id(),
            user_id: input.user_id,
            title: input.title,
            body: input.body,
            created_at: self.clock.now(),
        };
        self.posts
            .insert_post(&post)
            .map_err(|_| DomainError::Internal)?;
        Ok(post)
    }

    /// All posts authored by a user, in store-native order.
    ///
    /// A missing user is an error, not an empty list: callers must check the
    /// error value to distinguish "no posts" from "no such user".
    pub fn list(&self, user_id: &str) -> Result<Vec<Post>, DomainError> {
        self.ensure_user_exists(user_id)?;
        self.posts
            .list_by_user(user_id)
            .map_err(|_| DomainError::Internal)
    }

    /// Delete a post by id, with no prior existence check. Deleting an
    /// already-deleted id fails with `PostNotFound` again, never a silent
    /// success.
    pub fn delete(&self, id: &str) -> Result<(), DomainError> {
        match self.posts.delete(id) {
            Ok(()) => Ok(()),
            Err(StoreError::RowAbsent) => Err(DomainError::PostNotFound),
            Err(StoreError::Backend(_)) => Err(DomainError::Internal),
        }
    }

    // Lookup failures fold into UserNotFound rather than Internal, matching
    // the behavior clients already rely on.
    fn ensure_user_exists(&self, user_id: &str) -> Result<(), DomainError> {
        match self.users.exists(user_id) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(DomainError::UserNotFound),
        }
    }
}
