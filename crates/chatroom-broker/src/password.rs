//! Password verification for room access
//!
//! A room's verifier is `None` when it was created with an empty password,
//! in which case only the empty password is accepted on join. A non-empty
//! password is hashed once at creation time with Argon2id and the resulting
//! PHC string is stored as the room's verifier; every join then re-derives
//! and compares through the same one-way function.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a non-empty password into a PHC-encoded verifier string.
///
/// Returns `None` for an empty password, matching the "no password" room
/// state rather than storing a hash of the empty string.
pub fn make_verifier(password: &str) -> Option<String> {
    if password.is_empty() {
        return None;
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("argon2 hashing with a freshly generated salt cannot fail");
    Some(hash.to_string())
}

/// Check a supplied password against a room's stored verifier.
///
/// A room with no verifier accepts only the empty password. A malformed
/// stored hash (which should never occur, since only `make_verifier`
/// produces it) is treated as a rejection rather than a panic.
pub fn verify(password: &str, verifier: Option<&str>) -> bool {
    match verifier {
        None => password.is_empty(),
        Some(stored) => {
            let Ok(parsed) = PasswordHash::new(stored) else {
                return false;
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_has_no_verifier() {
        assert!(make_verifier("").is_none());
    }

    #[test]
    fn open_room_accepts_only_empty_password() {
        assert!(verify("", None));
        assert!(!verify("anything", None));
    }

    #[test]
    fn correct_password_verifies() {
        let verifier = make_verifier("hunter2").unwrap();
        assert!(verify("hunter2", Some(&verifier)));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let verifier = make_verifier("hunter2").unwrap();
        assert!(!verify("wrong", Some(&verifier)));
    }

    #[test]
    fn garbage_verifier_is_rejected_not_panicking() {
        assert!(!verify("anything", Some("not a phc string")));
    }
}
