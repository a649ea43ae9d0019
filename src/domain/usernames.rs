//! Username rules shared by the CLI and URL resolution.

use url::form_urlencoded;

use crate::domain::error::DomainError;

pub const MAX_USERNAME_LEN: usize = 150;

/// Usernames may contain letters, digits and `@ . + - _`.
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.is_empty() {
        return Err(DomainError::validation("username", "must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            format!("must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    let valid = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(DomainError::validation(
            "username",
            "may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

/// Profile page path with the username percent-encoded as a single segment.
/// Usernames never contain spaces, so the form encoder's `+` never appears.
pub fn profile_path(username: &str) -> String {
    let segment: String = form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{segment}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_usernames() {
        assert!(validate_username("SnoopDog").is_ok());
        assert!(validate_username("dog.snoops+blog@home_1").is_ok());
    }

    #[test]
    fn rejects_whitespace_and_slashes() {
        assert!(validate_username("snoop dog").is_err());
        assert!(validate_username("snoop/dog").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn profile_paths_are_ascii() {
        assert_eq!(profile_path("SnoopDog"), "/profile/SnoopDog/");
        assert_eq!(
            profile_path("dog.snoops+blog@home_1"),
            "/profile/dog.snoops%2Bblog%40home_1/"
        );
        let encoded = profile_path("Лев");
        assert!(encoded.is_ascii());
        assert_eq!(encoded, "/profile/%D0%9B%D0%B5%D0%B2/");
    }
}
