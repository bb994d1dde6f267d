//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest free-text field accepted from clients.
pub const MAX_TEXT_LENGTH: usize = 500;

/// Validates that a text field contains something other than whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Kungsängen") // Ok
/// validate_not_blank("   ")        // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }

    if value.chars().count() > MAX_TEXT_LENGTH {
        let mut err = ValidationError::new("too_long");
        err.message = Some(format!("Value must be at most {MAX_TEXT_LENGTH} characters").into());
        return Err(err);
    }

    Ok(())
}

/// Validates a list of team names: no blanks and no duplicates.
pub fn validate_team_names(teams: &[String]) -> Result<(), ValidationError> {
    for (index, team) in teams.iter().enumerate() {
        if team.trim().is_empty() {
            let mut err = ValidationError::new("team_blank");
            err.message = Some("Team names must not be blank".into());
            return Err(err);
        }
        if teams[..index].contains(team) {
            let mut err = ValidationError::new("team_duplicate");
            err.message = Some(format!("Team `{team}` is listed twice").into());
            return Err(err);
        }
    }
    Ok(())
}
