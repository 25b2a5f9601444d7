//! Human-readable rendering of on-chain balances.

use serde::{Deserialize, Serialize};

/// Options recognized by [`format_balance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    /// Append the token symbol, e.g. `12.5 DOT`.
    pub with_unit: bool,
    /// Maximum number of decimals kept (truncated, never rounded).
    pub number_after_comma: usize,
    /// Use K/M/B magnitude suffixes.
    pub compact_notation: bool,
    /// Group integer digits with `,`.
    pub with_thousand_delimitor: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            with_unit: false,
            number_after_comma: 2,
            compact_notation: false,
            with_thousand_delimitor: true,
        }
    }
}

const MAGNITUDES: [(usize, &str); 3] = [(9, "B"), (6, "M"), (3, "K")];

/// Render `planck` (the chain's smallest unit) as a decimal amount of `unit`.
pub fn format_balance(planck: u128, decimals: u8, unit: &str, options: &FormatOptions) -> String {
    let decimals = u32::from(decimals.min(38));
    let divisor = 10u128.pow(decimals);

    let mut int_digits = (planck / divisor).to_string();
    let mut frac_digits = if decimals == 0 {
        String::new()
    } else {
        format!("{:0width$}", planck % divisor, width = decimals as usize)
    };

    let mut suffix = "";
    if options.compact_notation {
        for (digits, symbol) in MAGNITUDES {
            if int_digits.len() > digits {
                let split = int_digits.len() - digits;
                frac_digits.insert_str(0, &int_digits[split..]);
                int_digits.truncate(split);
                suffix = symbol;
                break;
            }
        }
    }

    frac_digits.truncate(options.number_after_comma);
    let frac = frac_digits.trim_end_matches('0');

    let mut out = if options.with_thousand_delimitor {
        group_thousands(&int_digits)
    } else {
        int_digits
    };
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out.push_str(suffix);
    if options.with_unit {
        out.push(' ');
        out.push_str(unit);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
