//! Random payload generation
//!
//! Payloads are reproducible: the same seed yields the same message stream,
//! which makes two stress runs comparable.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Printable ASCII used for random strings
pub const CHARSET: &[u8] =
    b" !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Letters used in word mode
pub const WORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Longest word produced in word mode
pub const MAX_WORD_LETTERS: usize = 10;

/// Generator for fixed-length random payloads
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    rng: ChaCha8Rng,
    words: bool,
}

impl PayloadGenerator {
    /// Create a generator; `words` produces space-separated alphanumeric words
    pub fn new(seed: u64, words: bool) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            words,
        }
    }

    /// Produce a payload of exactly `len` bytes
    pub fn generate(&mut self, len: usize) -> String {
        if self.words {
            self.random_words(len)
        } else {
            self.random_string(len)
        }
    }

    fn random_string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| CHARSET[self.rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }

    fn random_words(&mut self, len: usize) -> String {
        let mut out = String::with_capacity(len);
        let mut letters_left = self.rng.gen_range(1..=MAX_WORD_LETTERS);

        while out.len() < len {
            if letters_left == 0 {
                out.push(' ');
                letters_left = self.rng.gen_range(1..=MAX_WORD_LETTERS);
            } else {
                out.push(WORD_CHARSET[self.rng.gen_range(0..WORD_CHARSET.len())] as char);
                letters_left -= 1;
            }
        }

        out
    }
}
