use rand::Rng;

use crate::api::error;
use crate::modules::file::{
    extension::is_reserved_code, model::FileConfig, repository::FileRepository,
};

/// Draws short random codes and pre-checks them against live records.
///
/// The pre-check only narrows the race; the record store's own uniqueness
/// guard on `insert` is what makes codes unique.
#[derive(Debug, Clone)]
pub struct CodeAllocator {
    alphabet: Vec<char>,
    length: usize,
    max_attempts: u32,
}

impl CodeAllocator {
    pub fn new(alphabet: &str, length: usize, max_attempts: u32) -> Result<Self, error::SystemError> {
        if let Some(c) = alphabet.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(error::SystemError::bad_request(format!(
                "Code alphabet may only contain ASCII letters and digits, found {c:?}"
            )));
        }

        let mut chars: Vec<char> = Vec::with_capacity(alphabet.len());
        for c in alphabet.chars() {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }

        if chars.len() < 2 {
            return Err(error::SystemError::bad_request(
                "Code alphabet needs at least 2 distinct characters",
            ));
        }
        if length == 0 {
            return Err(error::SystemError::bad_request("Code length must be positive"));
        }
        if max_attempts == 0 {
            return Err(error::SystemError::bad_request("Code attempts must be positive"));
        }

        Ok(Self { alphabet: chars, length, max_attempts })
    }

    pub fn from_config(config: &FileConfig) -> Result<Self, error::SystemError> {
        Self::new(&config.code_alphabet, config.code_length, config.code_max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of distinct codes, saturating at `u128::MAX`.
    pub fn code_space(&self) -> u128 {
        let base = self.alphabet.len() as u128;
        (0..self.length).fold(1u128, |acc, _| acc.saturating_mul(base))
    }

    pub fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.length).map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())]).collect()
    }

    /// Draw until a code has no live record and is not a reserved path, up
    /// to `max_attempts` draws.
    ///
    /// Exhaustion fails with `CodeSpaceExhausted` instead of handing out a
    /// code that is known to be taken.
    pub async fn allocate(&self, repo: &dyn FileRepository) -> Result<String, error::SystemError> {
        for attempt in 1..=self.max_attempts {
            let code = self.generate();
            if is_reserved_code(&code) {
                log::debug!("Code {} is a reserved path (attempt {}/{})", code, attempt, self.max_attempts);
                continue;
            }
            if repo.find_by_code(&code, None).await?.is_none() {
                return Ok(code);
            }
            log::debug!("Code {} already taken (attempt {}/{})", code, attempt, self.max_attempts);
        }

        log::warn!(
            "No free code after {} attempts in a space of {} codes",
            self.max_attempts,
            self.code_space()
        );
        Err(error::SystemError::CodeSpaceExhausted(self.max_attempts))
    }
}
