/// Shown for empty, zero, or undefined figures.
pub const PLACEHOLDER: &str = "-";

/// Shown in columns that do not apply to a derived percentage row.
pub const NOT_APPLICABLE: &str = "–";

/// Round to the nearest integer, ties toward positive infinity.
pub fn round_half_up(val: f64) -> f64 {
    (val + 0.5).floor()
}

const SCALES: [(f64, &str); 3] = [
    (1_000.0, "K"),
    (1_000_000.0, "M"),
    (1_000_000_000.0, "B"),
];

/// Scale a number to a short string with a K/M/B suffix and a `,` decimal
/// separator: `-22,5K`, `1,00M`.
///
/// Thresholds are checked on the absolute value. The scaled figure keeps
/// 0 decimals from 100 up, 1 decimal from 10 up, 2 below that, judged after
/// rounding so `999_999` reads `1,00M` rather than `1000K`. Values that stay
/// under 1000 once rounded are printed unscaled with no decimals.
pub fn format_short(val: f64) -> String {
    if !val.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let abs = val.abs();
    let sign = if val < 0.0 { "-" } else { "" };

    let mut idx = match SCALES.iter().rposition(|(div, _)| abs >= *div) {
        Some(i) => i,
        None => {
            let whole = round_half_up(abs);
            if whole == 0.0 {
                return "0".to_string();
            }
            if whole < 1_000.0 {
                return format!("{sign}{whole:.0}");
            }
            0
        }
    };

    loop {
        let (div, suffix) = SCALES[idx];
        let rounded = round_to(abs / div, short_decimals(abs / div));
        if rounded >= 1_000.0 && idx + 1 < SCALES.len() {
            idx += 1;
            continue;
        }
        let decimals = short_decimals(rounded);
        let text = format!("{rounded:.decimals$}").replace('.', ",");
        return format!("{sign}{text}{suffix}");
    }
}

fn short_decimals(scaled: f64) -> usize {
    if scaled >= 100.0 {
        0
    } else if scaled >= 10.0 {
        1
    } else {
        2
    }
}

fn round_to(val: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    round_half_up(val * factor) / factor
}

/// Format a value for display according to its unit:
/// `%` is a one-decimal percentage, `R$` a scaled currency figure, `un` a
/// bare scaled count; any other unit is appended after the scaled number.
pub fn format_value(val: f64, unit: &str) -> String {
    match unit {
        "%" => format_pct(val),
        "R$" => format!("R$ {}", format_short(val)),
        "un" => format_short(val),
        other => format!("{} {other}", format_short(val)),
    }
}

/// One-decimal percentage: `40.0%`.
pub fn format_pct(val: f64) -> String {
    if !val.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{val:.1}%")
}

/// Rounded whole amount with `.` thousands separators: `-22.513`.
/// Exact zero renders as the placeholder.
pub fn format_amount(val: f64) -> String {
    if val == 0.0 || !val.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let rounded = round_half_up(val);
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}
