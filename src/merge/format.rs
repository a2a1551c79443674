// src/merge/format.rs
use chrono::{DateTime, Utc};

use crate::models::Direction;

/// Rounds to `dp` places and drops trailing zeros: 0.080 → "0.08", 0.10 → "0.1", -0.0 → "0".
pub fn trim_number(x: f64, dp: usize) -> String {
    let s = format!("{:.*}", dp, x);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    };
    if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

/// Signed delta with an explicit sign: `+0.08%`, `-0.1%`, `+0%`.
pub fn signed(x: f64, dp: usize, unit: &str) -> String {
    let body = trim_number(x, dp);
    if body.starts_with('-') {
        format!("{}{}", body, unit)
    } else {
        format!("+{}{}", body, unit)
    }
}

/// Signed with a fixed number of decimals: `+1.52%`.
pub fn signed_fixed(x: f64, dp: usize, unit: &str) -> String {
    let x = if x == 0.0 { 0.0 } else { x };
    let body = format!("{:.*}", dp, x.abs());
    let sign = if x < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        "+"
    };
    format!("{}{}{}", sign, body, unit)
}

/// Money delta with the sign before the symbol: `+$15`, `-$0.90`.
pub fn signed_money(x: f64, dp: usize) -> String {
    let sign = if x < 0.0 { "-" } else { "+" };
    if dp == 0 {
        format!("{}${}", sign, thousands(x.abs().round() as i64))
    } else {
        format!("{}${:.*}", sign, dp, x.abs())
    }
}

/// Integer with comma thousands separators: 6085 → "6,085".
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// Three-way direction from the sign of a delta.
pub fn direction(delta: f64) -> Direction {
    if delta > 0.0 {
        Direction::Up
    } else if delta < 0.0 {
        Direction::Down
    } else {
        Direction::Flat
    }
}

/// Two-way direction; a zero delta reads as up.
pub fn up_down(delta: f64) -> Direction {
    if delta >= 0.0 {
        Direction::Up
    } else {
        Direction::Down
    }
}

/// Relative age for a headline: "just now", "5m ago", "3h ago", "2d ago", else "Feb 24".
pub fn time_ago(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let at = match published_at {
        Some(at) => at,
        None => return String::new(),
    };
    let mins = (now - at).num_minutes();
    let hours = mins / 60;
    let days = hours / 24;
    if mins < 2 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        at.format("%b %-d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trim_number() {
        assert_eq!(trim_number(0.08, 2), "0.08");
        assert_eq!(trim_number(0.1, 2), "0.1");
        assert_eq!(trim_number(4.5 - 4.42, 2), "0.08");
        assert_eq!(trim_number(-0.001, 2), "0");
        assert_eq!(trim_number(12.0, 1), "12");
    }

    #[test]
    fn test_signed_deltas() {
        assert_eq!(signed(4.50 - 4.42, 2, "%"), "+0.08%");
        assert_eq!(signed(-0.03, 2, "%"), "-0.03%");
        assert_eq!(signed(-0.0001, 2, "%"), "+0%");
        assert_eq!(signed(22.0, 0, "bp"), "+22bp");
        assert_eq!(signed_fixed(1.52, 2, "%"), "+1.52%");
        assert_eq!(signed_fixed(-0.4, 2, "%"), "-0.40%");
        assert_eq!(signed_fixed(-0.001, 2, "%"), "+0.00%");
        assert_eq!(signed_money(15.2, 0), "+$15");
        assert_eq!(signed_money(-0.9, 2), "-$0.90");
    }

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(6085), "6,085");
        assert_eq!(thousands(950), "950");
        assert_eq!(thousands(1_234_567), "1,234,567");
        assert_eq!(thousands(-2936), "-2,936");
    }

    #[test]
    fn test_directions() {
        assert_eq!(direction(0.1), Direction::Up);
        assert_eq!(direction(0.0), Direction::Flat);
        assert_eq!(up_down(0.0), Direction::Up);
        assert_eq!(up_down(-0.01), Direction::Down);
    }

    #[test]
    fn test_time_ago() {
        let now = Utc.with_ymd_and_hms(2026, 2, 24, 12, 0, 0).unwrap();
        assert_eq!(time_ago(Some(now - chrono::Duration::seconds(30)), now), "just now");
        assert_eq!(time_ago(Some(now - chrono::Duration::minutes(5)), now), "5m ago");
        assert_eq!(time_ago(Some(now - chrono::Duration::hours(3)), now), "3h ago");
        assert_eq!(time_ago(Some(now - chrono::Duration::days(2)), now), "2d ago");
        assert_eq!(time_ago(Some(now - chrono::Duration::days(10)), now), "Feb 14");
        assert_eq!(time_ago(None, now), "");
    }
}
