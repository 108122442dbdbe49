use std::str::FromStr;

use email_address::EmailAddress;

pub fn is_valid_email(value: &str) -> bool {
    match EmailAddress::from_str(value) {
        Ok(e) => &e.email() == value,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        assert!(is_valid_email("user@example.com"));
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(!is_valid_email("not-an-email"));
    }
}
