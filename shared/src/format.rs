//! Number and date formatting for labels, tooltips and axes.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

const SI_PREFIXES: [&str; 17] = [
    "y", "z", "a", "f", "p", "n", "µ", "m", "", "k", "M", "G", "T", "P", "E", "Z", "Y",
];

/// Named value formats used by metric descriptors and charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueFormat {
    /// `$1,234`
    Dollar,
    /// `$450k`
    DollarShort,
    /// `+1.2%`
    Percent,
    /// `12.3%`
    PercentShort,
    /// `1,234`
    Count,
    /// `1,234.5`
    CountLong,
    /// `12.5 days`
    Days,
    /// `1,234 homes`
    Homes,
    /// `6.0 months` below one year, `2.5 years` otherwise
    TippingPoint,
    /// `$450k`, bare `0` at zero
    DollarAxis,
    /// `+5%`, bare `0%` at zero
    PercentAxis,
}

impl ValueFormat {
    pub fn apply(self, v: f64) -> String {
        match self {
            ValueFormat::Dollar => dollar(v),
            ValueFormat::DollarShort => dollar_short(v),
            ValueFormat::Percent => percent(v),
            ValueFormat::PercentShort => percent_short(v),
            ValueFormat::Count => count(v),
            ValueFormat::CountLong => count_long(v),
            ValueFormat::Days => format!("{} {}", count_long(v), pluralize(v, "day")),
            ValueFormat::Homes => format!("{} {}", count(v), pluralize(v, "home")),
            ValueFormat::TippingPoint => tipping_point(v),
            ValueFormat::DollarAxis => {
                if v == 0.0 {
                    "0".to_string()
                } else {
                    dollar_short(v)
                }
            }
            ValueFormat::PercentAxis => {
                if v == 0.0 {
                    "0%".to_string()
                } else {
                    signed_percent(v, 0)
                }
            }
        }
    }

    /// Format an optional value, `"NA"` when missing.
    pub fn apply_or_na(self, v: Option<f64>) -> String {
        match v.filter(|v| v.is_finite()) {
            Some(v) => self.apply(v),
            None => "NA".to_string(),
        }
    }

    /// Lookup by the short names used in page markup (`dollar`, `count`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "dollar" => ValueFormat::Dollar,
            "dollarShort" => ValueFormat::DollarShort,
            "percent" => ValueFormat::Percent,
            "percentShort" => ValueFormat::PercentShort,
            "count" => ValueFormat::Count,
            "countLong" => ValueFormat::CountLong,
            _ => return None,
        })
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Fixed-point text with exact ties rounded away from zero, as
/// `Number#toFixed` does.
fn fixed(v: f64, decimals: usize) -> String {
    let factor = 10f64.powi(decimals as i32);
    format!("{:.*}", decimals, (v * factor).round() / factor)
}

/// `v` rounded to `precision` significant digits, ties away from zero.
fn round_significant(v: f64, precision: usize) -> f64 {
    let exp = v.abs().log10().floor() as i32;
    let shift = precision as i32 - 1 - exp;
    if shift >= 0 {
        let factor = 10f64.powi(shift);
        (v * factor).round() / factor
    } else {
        let factor = 10f64.powi(-shift);
        (v / factor).round() * factor
    }
}

/// Fixed-point with thousands separators.
pub fn grouped(v: f64, decimals: usize) -> String {
    let body = fixed(v.abs(), decimals);
    let (int, frac) = match body.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (body.as_str(), None),
    };
    let negative = v < 0.0 && body.chars().any(|c| matches!(c, '1'..='9'));
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&group_thousands(int));
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn dollar(v: f64) -> String {
    if v < 0.0 {
        format!("-${}", grouped(-v, 0))
    } else {
        format!("${}", grouped(v, 0))
    }
}

/// Two significant digits with an SI suffix.
pub fn si_prefix(v: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if v == 0.0 || !v.is_finite() {
        return format!("{:.*}", precision - 1, 0.0);
    }
    let sci = format!("{:.*e}", precision - 1, round_significant(v.abs(), precision));
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let group = (exp.div_euclid(3)).clamp(-8, 8);
    let int_len = exp - group * 3 + 1;
    let n = digits.len() as i32;

    let body = if int_len == n {
        digits
    } else if int_len > n {
        format!("{digits}{}", "0".repeat((int_len - n) as usize))
    } else if int_len > 0 {
        let (a, b) = digits.split_at(int_len as usize);
        format!("{a}.{b}")
    } else {
        format!("0.{}{digits}", "0".repeat((-int_len) as usize))
    };

    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}{body}{}", SI_PREFIXES[(group + 8) as usize])
}

pub fn dollar_short(v: f64) -> String {
    if v < 0.0 {
        format!("-${}", si_prefix(-v, 2))
    } else {
        format!("${}", si_prefix(v, 2))
    }
}

fn signed_percent(v: f64, decimals: usize) -> String {
    let scaled = v * 100.0;
    let body = fixed(scaled.abs(), decimals);
    let is_zero = !body.chars().any(|c| matches!(c, '1'..='9'));
    let sign = if scaled < 0.0 && !is_zero { "-" } else { "+" };
    format!("{sign}{body}%")
}

pub fn percent(v: f64) -> String {
    signed_percent(v, 1)
}

pub fn percent_short(v: f64) -> String {
    format!("{}%", fixed(v * 100.0, 1))
}

pub fn count(v: f64) -> String {
    grouped(v, 0)
}

pub fn count_long(v: f64) -> String {
    grouped(v, 1)
}

/// Appends `s` unless `n` is exactly one.
pub fn pluralize(n: f64, singular: &str) -> String {
    if n == 1.0 {
        singular.to_string()
    } else {
        format!("{singular}s")
    }
}

/// Years until buying beats renting, shown in months below one year.
pub fn tipping_point(years: f64) -> String {
    if years < 1.0 {
        let months = years * 12.0;
        let rounded = (months * 10.0).round() / 10.0;
        format!("{} {}", count_long(months), pluralize(rounded, "month"))
    } else {
        format!("{} {}", count_long(years), pluralize(years, "year"))
    }
}

/// `Q1 2017` style label for the quarter containing `date`.
pub fn quarter_label(date: NaiveDate) -> String {
    format!("Q{} {}", date.month0() / 3 + 1, date.year())
}

/// Lowercase and collapse every run of non-word characters into `-`.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_gap = false;
    for ch in s.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
            in_gap = false;
        } else if !in_gap {
            out.push('-');
            in_gap = true;
        }
    }
    out
}
