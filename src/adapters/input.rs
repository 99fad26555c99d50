//! Input Adapter - Comma-Separated Market Arrays
//!
//! Turns the raw text from `config.toml` or the command line into a
//! `RunRequest`. Parsing is lenient: tokens that are not numbers are
//! dropped with a warning, so a stray trailing comma or a typo shrinks
//! the array instead of aborting. The training loop then rejects arrays
//! whose lengths no longer agree.

use tracing::warn;

use crate::config::AppConfig;
use crate::usecases::training_loop::RunRequest;

/// Parse a comma-separated list of numbers, dropping unparsable tokens.
///
/// Each token is read up to the end of its leading numeric part, so
/// `"0.3x"` is `0.3`. Tokens with no numeric prefix, and values that
/// are not finite, are dropped.
pub fn parse_csv(text: &str) -> Vec<f64> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match numeric_prefix(token).parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                warn!(token, "Ignoring non-numeric value in market input");
                None
            }
        })
        .collect()
}

/// Longest prefix of `token` of the form `[+-]digits[.digits][e[+-]digits]`
/// holding at least one mantissa digit; empty if there is none.
fn numeric_prefix(token: &str) -> &str {
    let bytes = token.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    &token[..end]
}

/// Build a run request from a (validated) configuration.
pub fn run_request(config: &AppConfig) -> RunRequest {
    let opt = &config.optimizer;
    RunRequest {
        prices: parse_csv(&config.market.prices),
        true_probabilities: parse_csv(&config.market.true_probabilities),
        initial_wealth: opt.initial_wealth,
        iterations: opt.iterations,
        batch_size: opt.batch_size,
        adam: opt.adam(),
    }
}
