//! Pairing code generation.

use rand::Rng;

pub use kiosk_api_contract::{CODE_LENGTH, PAIRING_ALPHABET};

/// Generate a fresh pairing code from the thread-local generator.
pub fn generate_code() -> String {
    generate_code_with(&mut rand::thread_rng())
}

/// Generate a pairing code, one uniform pick from the alphabet per character.
pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| PAIRING_ALPHABET[rng.gen_range(0..PAIRING_ALPHABET.len())] as char)
        .collect()
}

/// Supplies codes to registration, one per attempt.
pub trait CodeSource: Send {
    fn next_code(&mut self) -> String;
}

impl<F> CodeSource for F
where
    F: FnMut() -> String + Send,
{
    fn next_code(&mut self) -> String {
        self()
    }
}
