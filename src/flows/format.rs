//! Display formatting shared by flows

/// Group digits the Indian way: last three, then pairs (`12,34,567`)
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// en-IN number format with at most two fraction digits
pub fn format_indian_number(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let fixed = format!("{:.2}", rounded.abs());

    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&group_indian(int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// `Rupees 1,850 / Quintal`
pub fn format_price(value: f64, unit: &str) -> String {
    format!("Rupees {} / {}", format_indian_number(value), unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indian_grouping() {
        assert_eq!(format_indian_number(0.0), "0");
        assert_eq!(format_indian_number(999.0), "999");
        assert_eq!(format_indian_number(1850.0), "1,850");
        assert_eq!(format_indian_number(100000.0), "1,00,000");
        assert_eq!(format_indian_number(12345678.0), "1,23,45,678");
    }

    #[test]
    fn test_fraction_digits() {
        assert_eq!(format_indian_number(22.5), "22.5");
        assert_eq!(format_indian_number(1234.567), "1,234.57");
        assert_eq!(format_indian_number(35.001), "35");
        assert_eq!(format_indian_number(-1500.25), "-1,500.25");
    }

    #[test]
    fn test_price_string() {
        assert_eq!(format_price(1850.0, "Quintal"), "Rupees 1,850 / Quintal");
        assert_eq!(format_price(22.5, "Kg"), "Rupees 22.5 / Kg");
    }
}
