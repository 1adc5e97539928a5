//! Pairing code rules and payload validation

use validator::Validate;

use crate::error::{ApiContractError, ApiContractResult};
use crate::types::NewScreen;

/// Characters a pairing code may contain. `0`, `O`, `1` and `I` are left
/// out so a code read off a screen can be typed back without ambiguity.
pub const PAIRING_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a pairing code
pub const CODE_LENGTH: usize = 4;

/// Check that `code` has the fixed length and only uses the safe alphabet
pub fn validate_pairing_code(code: &str) -> ApiContractResult<()> {
    if code.len() != CODE_LENGTH {
        return Err(ApiContractError::InvalidCode {
            code: code.to_string(),
            reason: "wrong length",
        });
    }
    if !code.bytes().all(|b| PAIRING_ALPHABET.contains(&b)) {
        return Err(ApiContractError::InvalidCode {
            code: code.to_string(),
            reason: "character outside the pairing alphabet",
        });
    }
    Ok(())
}

impl NewScreen {
    /// Run field validation and the pairing code check
    pub fn checked(&self) -> ApiContractResult<()> {
        self.validate()?;
        validate_pairing_code(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_excludes_ambiguous_characters() {
        for c in [b'0', b'O', b'1', b'I'] {
            assert!(!PAIRING_ALPHABET.contains(&c));
        }
        let mut sorted = PAIRING_ALPHABET.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 32);
    }

    #[test]
    fn test_validate_pairing_code() {
        assert!(validate_pairing_code("K7QX").is_ok());
        assert!(validate_pairing_code("K7Q").is_err());
        assert!(validate_pairing_code("K0QX").is_err());
        assert!(validate_pairing_code("k7qx").is_err());
    }

    #[test]
    fn test_new_screen_checked() {
        assert!(NewScreen::new("K7QX", "kiosk/0.1.0").checked().is_ok());
        assert!(NewScreen::new("K7QXZ", "kiosk/0.1.0").checked().is_err());
        assert!(NewScreen::new("K7QX", "").checked().is_err());
    }
}
