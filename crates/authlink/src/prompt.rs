use inquire::{error::InquireResult, Password};

/// Prompt for the password of an existing identity if none was given.
pub(crate) fn password_when_none(val: Option<String>) -> InquireResult<String> {
    Ok(if let Some(val) = val {
        val
    } else {
        Password::new("Password").without_confirmation().prompt()?
    })
}

/// Prompt for a password that is about to become the identity's, with confirmation.
pub(crate) fn new_password_when_none(prompt: &str, val: Option<String>) -> InquireResult<String> {
    Ok(if let Some(val) = val {
        val
    } else {
        Password::new(prompt).prompt()?
    })
}
