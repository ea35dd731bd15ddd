//! RUN (Chilean national identity number) generation and formatting.
//!
//! A RUN is a digit body followed by a check character computed with the
//! modulo-11 algorithm the registry application validates against. Test
//! fixtures are rendered in the dotted display form (`12.345.678-5`).

use std::fmt;

use rand::Rng;

use crate::error::{QaError, Result};

/// Width of generated bodies.
pub const BODY_DIGITS: usize = 8;

/// Largest seed that still fits in an 8-digit body.
pub const MAX_SEED: u64 = 99_999_999;

/// Modulus applied to the time-based scenario seeds.
const SEED_WINDOW: u64 = 10_000_000;

/// Offsets that keep the three scenario seeds apart.
const SCENARIO_OFFSETS: [u64; 3] = [0, 5_000, 9_000];

/// A RUN whose check character is known to match its body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Run {
    body: String,
    check: char,
}

impl Run {
    /// Parses a RUN in any common notation (`12345678-5`, `12.345.678-5`,
    /// `123456785`) and validates its check character.
    pub fn parse(text: &str) -> Result<Self> {
        let (body, check) = split_body_and_check(text)
            .ok_or_else(|| QaError::Format(format!("'{}' is not a RUN", text)))?;
        let expected = check_digit(&body)
            .ok_or_else(|| QaError::Format(format!("'{}' has no digit body", text)))?;
        if expected != check {
            return Err(QaError::Format(format!(
                "'{}' has check character {}, expected {}",
                text, check, expected
            )));
        }
        Ok(Self { body, check })
    }

    /// Digit body as stored (zero padding preserved).
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Check character (`0`-`9` or `K`).
    pub fn check(&self) -> char {
        self.check
    }

    /// Body and check character without separators.
    pub fn digits(&self) -> String {
        let mut out = self.body.clone();
        out.push(self.check);
        out
    }

    /// Dotted display form.
    pub fn dotted(&self) -> String {
        format!("{}-{}", group_thousands(&self.body), self.check)
    }

    /// Last `n` characters of the dotted form, used to build fixture names.
    pub fn suffix(&self, n: usize) -> String {
        let dotted = self.dotted();
        let skip = dotted.chars().count().saturating_sub(n);
        dotted.chars().skip(skip).collect()
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Builds a valid RUN from `seed`: zero-padded 8-digit body, computed check
/// character, dotted rendering.
pub fn generate_valid_id(seed: u64) -> Result<Run> {
    if seed > MAX_SEED {
        return Err(QaError::Format(format!(
            "seed {} does not fit in a {}-digit body",
            seed, BODY_DIGITS
        )));
    }
    let body = format!("{:0width$}", seed, width = BODY_DIGITS);
    let check = check_digit(&body)
        .ok_or_else(|| QaError::Format(format!("cannot compute check digit for {}", body)))?;
    let raw = format!("{}{}", body, check);
    if format_with_dots(&raw).is_none() {
        return Err(QaError::Format(format!(
            "could not format generated RUN {}",
            raw
        )));
    }
    Ok(Run { body, check })
}

/// Modulo-11 check character of a digit body.
///
/// Digits are weighted right to left with the cycle 2..=7; the remainder of
/// the sum is subtracted from 11 and mapped `11 → '0'`, `10 → 'K'`.
pub fn check_digit(body: &str) -> Option<char> {
    if body.is_empty() {
        return None;
    }
    let mut sum = 0u32;
    let mut weight = 2u32;
    for c in body.chars().rev() {
        sum += c.to_digit(10)? * weight;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }
    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        d => char::from_digit(d, 10),
    }
}

/// Renders `raw` (body + check character, separators optional) in dotted
/// form. Returns `None` when `raw` is not a 1-8 digit body followed by a
/// digit or `K`.
pub fn format_with_dots(raw: &str) -> Option<String> {
    let (body, check) = split_body_and_check(raw)?;
    Some(format!("{}-{}", group_thousands(&body), check))
}

/// Three seeds for the agreement, control and full-form scenarios.
///
/// `base` is normally the current Unix time in seconds; each seed gets its
/// own offset and a jitter in `0..1000`.
pub fn scenario_seeds<R: Rng + ?Sized>(base: u64, rng: &mut R) -> [u64; 3] {
    SCENARIO_OFFSETS.map(|offset| (base + offset) % SEED_WINDOW + rng.gen_range(0..1000))
}

fn split_body_and_check(raw: &str) -> Option<(String, char)> {
    let clean: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let check = clean.chars().last()?;
    let body = &clean[..clean.len() - check.len_utf8()];
    if body.is_empty() || body.len() > BODY_DIGITS || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !(check.is_ascii_digit() || check == 'K') {
        return None;
    }
    Some((body.to_string(), check))
}

fn group_thousands(body: &str) -> String {
    let mut groups = Vec::new();
    let mut rest = body;
    while rest.len() > 3 {
        let (head, tail) = rest.split_at(rest.len() - 3);
        groups.push(tail);
        rest = head;
    }
    groups.push(rest);
    groups.reverse();
    groups.join(".")
}
