//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

const MAX_LOGIN_LEN: usize = 64;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_USERNAME_CHARS: usize = 64;

/// Validate login
pub fn validate_login(login: &str) -> Result<(), String> {
    if login.trim().is_empty() {
        return Err("Login is required".to_string());
    }

    if login.len() > MAX_LOGIN_LEN {
        return Err(format!(
            "Login must be at most {} characters long",
            MAX_LOGIN_LEN
        ));
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.trim().is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LEN
        ));
    }

    Ok(())
}

/// Validate display name, when one is given
pub fn validate_username(username: &str) -> Result<(), String> {
    let chars = username.trim().chars().count();
    if chars == 0 || chars > MAX_USERNAME_CHARS {
        return Err(format!(
            "Username must be between 1 and {} characters long",
            MAX_USERNAME_CHARS
        ));
    }

    Ok(())
}

/// Validate email, when one is given
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}
