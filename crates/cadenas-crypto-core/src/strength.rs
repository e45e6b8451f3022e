//! Master password strength estimation.
//!
//! [`score`] is a pure function: no I/O, no randomness. The vault layer gates
//! `setup`/`rotate`/reset on the returned score; the feedback strings are for
//! the caller to render next to the password field.
//!
//! Scoring model (clamped to 0–100):
//! - length ≥ 8: +25, ≥ 12: +15, ≥ 16: +10
//! - character classes: lowercase +10, uppercase +10, digit +15, symbol +15
//! - each run of 3+ repeated characters: −10
//! - each common-pattern hit (`12345`, `password`, `qwerty`, `abc123`): −20

/// Common substrings that gut a password regardless of its other qualities.
const COMMON_PATTERNS: &[&str] = &["12345", "password", "qwerty", "abc123"];

/// Result of a strength estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrengthReport {
    /// Score in `[0, 100]`.
    pub score: u8,
    /// Human-readable suggestions for whatever is holding the score down.
    pub feedback: Vec<String>,
}

/// Estimate the strength of a candidate master password.
#[must_use]
#[allow(clippy::arithmetic_side_effects)] // bounded small integers, clamped below
pub fn score(password: &str) -> StrengthReport {
    let mut points: i32 = 0;
    let mut feedback = Vec::new();

    let len = password.chars().count();
    if len >= 8 {
        points += 25;
    } else {
        feedback.push("use at least 8 characters".to_string());
    }
    if len >= 12 {
        points += 15;
    }
    if len >= 16 {
        points += 10;
    } else {
        feedback.push("16 or more characters is strongest".to_string());
    }

    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && !c.is_whitespace());

    if has_lower {
        points += 10;
    } else {
        feedback.push("add lowercase letters".to_string());
    }
    if has_upper {
        points += 10;
    } else {
        feedback.push("add uppercase letters".to_string());
    }
    if has_digit {
        points += 15;
    } else {
        feedback.push("add digits".to_string());
    }
    if has_symbol {
        points += 15;
    } else {
        feedback.push("add symbols".to_string());
    }

    let runs = repeated_runs(password);
    if runs > 0 {
        points -= 10 * runs;
        feedback.push("avoid repeating the same character 3+ times".to_string());
    }

    let lowered = password.to_lowercase();
    for pattern in COMMON_PATTERNS {
        if lowered.contains(pattern) {
            points -= 20;
            feedback.push(format!("avoid the common sequence \"{pattern}\""));
        }
    }

    let clamped = points.clamp(0, 100);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    StrengthReport {
        score: clamped as u8,
        feedback,
    }
}

/// Count runs of 3 or more identical consecutive characters.
#[allow(clippy::arithmetic_side_effects)]
fn repeated_runs(s: &str) -> i32 {
    let mut runs = 0;
    let mut prev: Option<char> = None;
    let mut run_len = 1usize;
    for c in s.chars() {
        if Some(c) == prev {
            run_len += 1;
            if run_len == 3 {
                runs += 1;
            }
        } else {
            prev = Some(c);
            run_len = 1;
        }
    }
    runs
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
