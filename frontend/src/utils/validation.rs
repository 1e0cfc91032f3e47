use crate::api::ApiError;

pub fn require(value: &str, label: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} is required", label)));
    }
    Ok(())
}

pub fn is_valid_email(raw: &str) -> bool {
    let email = raw.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

pub fn validate_email(raw: &str) -> Result<(), ApiError> {
    require(raw, "Email")?;
    if !is_valid_email(raw) {
        return Err(ApiError::validation("Please enter a valid email address"));
    }
    Ok(())
}

/// Verification codes are exactly six ASCII digits.
pub fn validate_otp(code: &str) -> Result<(), ApiError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ApiError::validation(
            "The verification code must be exactly 6 digits",
        ))
    }
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    Ok(())
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_string()
}
