//! Lightweight input validation helpers. Keep logic minimal and deterministic.
//!
//! Validation runs before any store call; a failure produces an
//! `InvalidInput` carrying per-field messages and never reaches the gateway.

use std::collections::BTreeMap;

use crate::{DomainError, NewPost, NewUser};

const MSG_REQUIRED: &str = "cannot be blank";
const MSG_TOO_SHORT: &str = "the length must be at least 2";
const MSG_BAD_EMAIL: &str = "must be a valid email address";

/// Validate a new user. Name fields need at least two characters; the email
/// check is intentionally light (local part, `@`, domain) to avoid heavy
/// parsing crates; address fields must be non-blank.
pub fn new_user(input: &NewUser) -> Result<(), DomainError> {
    let mut errs = BTreeMap::new();

    name_field(&mut errs, "firstname", &input.firstname);
    name_field(&mut errs, "lastname", &input.lastname);

    let email = input.email.trim();
    if email.is_empty() {
        errs.insert("email".to_string(), MSG_REQUIRED.to_string());
    } else if !looks_like_email(email) {
        errs.insert("email".to_string(), MSG_BAD_EMAIL.to_string());
    }

    required(&mut errs, "street", &input.street);
    required(&mut errs, "city", &input.city);
    required(&mut errs, "state", &input.state);
    required(&mut errs, "zipcode", &input.zipcode);

    finish(errs)
}

/// Validate a new post: owner id, title, and body must all be non-blank.
pub fn new_post(input: &NewPost) -> Result<(), DomainError> {
    let mut errs = BTreeMap::new();

    required(&mut errs, "userId", &input.user_id);
    required(&mut errs, "title", &input.title);
    required(&mut errs, "body", &input.body);

    finish(errs)
}

fn required(errs: &mut BTreeMap<String, String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errs.insert(field.to_string(), MSG_REQUIRED.to_string());
    }
}

fn name_field(errs: &mut BTreeMap<String, String>, field: &str, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errs.insert(field.to_string(), MSG_REQUIRED.to_string());
    } else if trimmed.chars().count() < 2 {
        errs.insert(field.to_string(), MSG_TOO_SHORT.to_string());
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, dom)) => {
            !local.is_empty() && !dom.is_empty() && dom.contains('.') && !s.contains(' ')
        }
        None => false,
    }
}

fn finish(errs: BTreeMap<String, String>) -> Result<(), DomainError> {
    if errs.is_empty() {
        Ok(())
    } else {
        Err(DomainError::with_field_errors(errs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_user() -> NewUser {
        NewUser {
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            zipcode: "E1 6AN".to_string(),
        }
    }

    #[test]
    fn user_validation_accepts_complete_input() {
        assert!(new_user(&valid_user()).is_ok());
    }

    #[test]
    fn user_validation_collects_all_field_errors() {
        let err = new_user(&NewUser::default()).unwrap_err();
        assert_eq!(err, DomainError::InvalidInput(None));
        let fields = err.field_errors().expect("field errors");
        for field in ["firstname", "lastname", "email", "street", "city", "state", "zipcode"] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn user_validation_flags_short_names_and_bad_email() {
        let mut input = valid_user();
        input.firstname = "A".to_string();
        input.email = "not-an-email".to_string();
        let err = new_user(&input).unwrap_err();
        let fields = err.field_errors().expect("field errors");
        assert_eq!(fields.get("firstname").map(String::as_str), Some(MSG_TOO_SHORT));
        assert_eq!(fields.get("email").map(String::as_str), Some(MSG_BAD_EMAIL));
        assert!(!fields.contains_key("lastname"));
    }

    #[test]
    fn post_validation_requires_all_fields() {
        let err = new_post(&NewPost::default()).unwrap_err();
        let fields = err.field_errors().expect("field errors");
        assert!(fields.contains_key("userId"));
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("body"));

        let ok = NewPost {
            user_id: "u-1".to_string(),
            title: "Title".to_string(),
            body: "Body".to_string(),
        };
        assert!(new_post(&ok).is_ok());
    }

    #[test]
    fn blank_whitespace_counts_as_missing() {
        let input = NewPost {
            user_id: "   ".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
        };
        let err = new_post(&input).unwrap_err();
        assert!(err.field_errors().expect("field errors").contains_key("userId"));
    }
}
