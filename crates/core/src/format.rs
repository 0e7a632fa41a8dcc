//! Display formatting for amounts, addresses and dates.

use chrono::{DateTime, Utc};

pub const DEFAULT_ETH_DECIMALS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    #[default]
    Short,
    Long,
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

/// `1234.5` → `"1,234.5 ETH"`, `0.1` → `"0.10 ETH"`. Values below one keep two decimals.
pub fn format_eth(value: f64, decimals: usize, show_symbol: bool) -> String {
    let with_symbol = |s: String| if show_symbol { format!("{s} ETH") } else { s };
    if !value.is_finite() {
        return with_symbol("0".to_string());
    }

    let min_fraction = if value.abs() >= 1.0 { 0 } else { 2.min(decimals) };
    let rendered = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((&rendered, ""));

    let mut frac = frac_part.trim_end_matches('0').to_string();
    while frac.len() < min_fraction {
        frac.push('0');
    }

    let sign = if value < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    let grouped = group_thousands(int_part);
    let body = if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    };
    with_symbol(body)
}

/// `0x1234...abcd`. Strings shorter than ten characters are returned as-is.
pub fn format_address(address: &str, chars: usize) -> String {
    if address.len() < 10 || !address.is_ascii() || address.len() <= chars * 2 + 2 {
        return address.to_string();
    }
    format!("{}...{}", &address[..chars + 2], &address[address.len() - chars..])
}

pub fn format_compact_number(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        value.to_string()
    }
}

pub fn format_date(date: DateTime<Utc>, style: DateStyle) -> String {
    match style {
        DateStyle::Short => date.format("%b %-d").to_string(),
        DateStyle::Long => date.format("%B %-d, %Y").to_string(),
    }
}

pub fn format_progress(progress: f64) -> String {
    format!("{:.0}%", (progress * 100.0).clamp(0.0, 100.0))
}
