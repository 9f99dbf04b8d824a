use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 8;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$";

/// Why a credential was refused before reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialProblem {
    InvalidEmail,
    PasswordTooShort,
}

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(email.trim()))
        .unwrap_or(false)
}

/// Length is counted in characters.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Email first, then password.
pub fn check(email: &str, password: &str) -> Option<CredentialProblem> {
    if !is_valid_email(email) {
        Some(CredentialProblem::InvalidEmail)
    } else if !is_valid_password(password) {
        Some(CredentialProblem::PasswordTooShort)
    } else {
        None
    }
}
