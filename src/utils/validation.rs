use crate::errors::{AppError, Result};
use regex::Regex;
use rust_decimal::Decimal;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";
const NG_PHONE_PATTERN: &str = r"^(0[789][01]\d{8}|\+234[789][01]\d{8})$";
const ACCOUNT_NUMBER_PATTERN: &str = r"^\d{10}$";
const BANK_CODE_PATTERN: &str = r"^\d{3,6}$";
const CURRENCY_CODE_PATTERN: &str = r"^[A-Z]{2,10}$";

fn matches(pattern: &str, value: &str) -> Result<bool> {
    let re = Regex::new(pattern).map_err(|e| AppError::InternalError(format!("Regex error: {}", e)))?;
    Ok(re.is_match(value))
}

pub struct Validator;

impl Validator {
    pub fn validate_email(email: &str) -> Result<()> {
        if email.len() > 254 {
            return Err(AppError::ValidationError("Email too long".to_string()));
        }
        if !matches(EMAIL_PATTERN, email)? {
            return Err(AppError::ValidationError("Invalid email format".to_string()));
        }
        Ok(())
    }

    pub fn validate_password(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(AppError::ValidationError("Password must be at least 8 characters long".to_string()));
        }
        if password.len() > 128 {
            return Err(AppError::ValidationError("Password must be less than 128 characters".to_string()));
        }
        let has_letter = password.chars().any(|c| c.is_alphabetic());
        let has_digit = password.chars().any(|c| c.is_numeric());
        if !has_letter || !has_digit {
            return Err(AppError::ValidationError("Password must contain letters and digits".to_string()));
        }
        Ok(())
    }

    pub fn validate_display_name(name: &str) -> Result<()> {
        let name = name.trim();
        if name.len() < 2 {
            return Err(AppError::ValidationError("Display name must be at least 2 characters long".to_string()));
        }
        if name.len() > 60 {
            return Err(AppError::ValidationError("Display name must be less than 60 characters".to_string()));
        }
        Ok(())
    }

    pub fn validate_required(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(AppError::ValidationError(format!("{} is required", field)));
        }
        Ok(())
    }

    /// Nigerian mobile numbers, local (`080...`) or international (`+23480...`).
    pub fn validate_phone(phone: &str) -> Result<()> {
        if !matches(NG_PHONE_PATTERN, phone.trim())? {
            return Err(AppError::ValidationError("Invalid phone number. Use 11 digits or +234 format.".to_string()));
        }
        Ok(())
    }

    pub fn validate_account_number(account_number: &str) -> Result<()> {
        if !matches(ACCOUNT_NUMBER_PATTERN, account_number.trim())? {
            return Err(AppError::ValidationError("Account number must be 10 digits".to_string()));
        }
        Ok(())
    }

    pub fn validate_bank_code(bank_code: &str) -> Result<()> {
        if !matches(BANK_CODE_PATTERN, bank_code.trim())? {
            return Err(AppError::ValidationError("Invalid bank code".to_string()));
        }
        Ok(())
    }

    pub fn validate_currency_code(code: &str) -> Result<()> {
        if !matches(CURRENCY_CODE_PATTERN, code)? {
            return Err(AppError::ValidationError(format!("Invalid currency code: {}", code)));
        }
        Ok(())
    }

    pub fn validate_positive_amount(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::ValidationError("Amount must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nigerian_phone_formats() {
        assert!(Validator::validate_phone("08031234567").is_ok());
        assert!(Validator::validate_phone("+2348031234567").is_ok());
        assert!(Validator::validate_phone("8031234567").is_err());
        assert!(Validator::validate_phone("0603123456").is_err());
    }

    #[test]
    fn account_numbers_are_ten_digits() {
        assert!(Validator::validate_account_number("0123456789").is_ok());
        assert!(Validator::validate_account_number("012345678").is_err());
        assert!(Validator::validate_account_number("01234abcde").is_err());
    }

    #[test]
    fn password_needs_letters_and_digits() {
        assert!(Validator::validate_password("password1").is_ok());
        assert!(Validator::validate_password("password").is_err());
        assert!(Validator::validate_password("pa1").is_err());
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(Validator::validate_positive_amount(Decimal::ONE).is_ok());
        assert!(Validator::validate_positive_amount(Decimal::ZERO).is_err());
        assert!(Validator::validate_positive_amount(Decimal::NEGATIVE_ONE).is_err());
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let err = Validator::validate_required("Full name", "   ").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Full name is required");
    }
}
