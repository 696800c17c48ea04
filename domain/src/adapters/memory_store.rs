use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{Post, PostStore, StoreError, User, UserLookup, UserStore};

/// Simple in-memory store for tests and the `memory` storage mode. Not built
/// for high concurrency beyond the internal mutexes guarding the collections.
pub struct InMemoryStore {
    users: Mutex<BTreeMap<String, User>>,
    posts: Mutex<Vec<Post>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(BTreeMap::new()),
            posts: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("mutex poisoned".into())
}

impl UserLookup for InMemoryStore {
    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users.contains_key(id))
    }
}

impl UserStore for InMemoryStore {
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;
        if users.contains_key(&user.id) {
            return Err(StoreError::Backend(format!("duplicate user id {}", user.id)));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users.get(id).cloned())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users.len() as u64)
    }

    fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl PostStore for InMemoryStore {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut posts = self.posts.lock().map_err(|_| poisoned())?;
        if posts.iter().any(|p| p.id == post.id) {
            return Err(StoreError::Backend(format!("duplicate post id {}", post.id)));
        }
        posts.push(post.clone());
        Ok(())
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        let posts = self.posts.lock().map_err(|_| poisoned())?;
        Ok(posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut posts = self.posts.lock().map_err(|_| poisoned())?;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        if posts.len() == before {
            return Err(StoreError::RowAbsent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            firstname: "Test".to_string(),
            lastname: "User".to_string(),
            email: format!("{id}@example.com"),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zipcode: "62701".to_string(),
            created_at: UNIX_EPOCH + Duration::from_secs(1),
        }
    }

    fn post(id: &str, user_id: &str) -> Post {
        Post {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: "title".to_string(),
            body: "body".to_string(),
            created_at: UNIX_EPOCH + Duration::from_secs(2),
        }
    }

    #[test]
    fn user_roundtrip_and_exists() {
        let store = InMemoryStore::new();
        store.insert_user(&user("u1")).unwrap();
        assert!(store.exists("u1").unwrap());
        assert!(!store.exists("u2").unwrap());
        assert_eq!(store.get("u1").unwrap().unwrap().email, "u1@example.com");
        assert!(store.get("u2").unwrap().is_none());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn duplicate_user_id_is_a_backend_error() {
        let store = InMemoryStore::new();
        store.insert_user(&user("u1")).unwrap();
        let err = store.insert_user(&user("u1")).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn list_windows_over_stable_order() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.insert_user(&user(&format!("u{i}"))).unwrap();
        }
        assert_eq!(store.list(0, 2).unwrap().len(), 2);
        assert_eq!(store.list(4, 2).unwrap().len(), 1);
        assert!(store.list(10, 2).unwrap().is_empty());
        // Two reads of the same window agree.
        assert_eq!(store.list(1, 3).unwrap(), store.list(1, 3).unwrap());
    }

    #[test]
    fn post_delete_signals_row_absent() {
        let store = InMemoryStore::new();
        store.insert_post(&post("p1", "u1")).unwrap();
        store.delete("p1").unwrap();
        assert_eq!(store.delete("p1").unwrap_err(), StoreError::RowAbsent);
        assert_eq!(store.delete("never").unwrap_err(), StoreError::RowAbsent);
    }

    #[test]
    fn posts_filter_by_owner() {
        let store = InMemoryStore::new();
        store.insert_post(&post("p1", "ua")).unwrap();
        store.insert_post(&post("p2", "ub")).unwrap();
        store.insert_post(&post("p3", "ua")).unwrap();
        let listed = store.list_by_user("ua").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.user_id == "ua"));
    }
}
