//! Mixed alphanumeric ordering for element labels.
//!
//! GUI element lists sort by label with digit runs compared numerically,
//! so `CCD2` sorts before `CCD10`.

use std::cmp::Ordering;

/// Compare two labels, digit runs numerically, the rest as text
pub fn compare_mixed(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars().peekable();
    let mut b_chars = b.chars().peekable();

    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut a_chars);
                    let nb = take_number(&mut b_chars);
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match ca.cmp(&cb) {
                    Ordering::Equal => {
                        a_chars.next();
                        b_chars.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u64 {
    let mut value: u64 = 0;
    while let Some(c) = chars.peek() {
        match c.to_digit(10) {
            Some(d) => {
                value = value.saturating_mul(10).saturating_add(d as u64);
                chars.next();
            }
            None => break,
        }
    }
    value
}

/// Sort `(name, label)` pairs by label, returning the names in display
/// order
pub fn names_by_label(mut pairs: Vec<(String, String)>) -> Vec<String> {
    pairs.sort_by(|(_, la), (_, lb)| compare_mixed(la, lb));
    pairs.into_iter().map(|(name, _)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_runs_compare_numerically() {
        assert_eq!(compare_mixed("CCD2", "CCD10"), Ordering::Less);
        assert_eq!(compare_mixed("CCD10", "CCD2"), Ordering::Greater);
        assert_eq!(compare_mixed("CCD2", "CCD2"), Ordering::Equal);
    }

    #[test]
    fn test_text_falls_back_to_lexicographic() {
        assert_eq!(compare_mixed("Alpha", "Beta"), Ordering::Less);
        assert_eq!(compare_mixed("Slew", "Slew rate"), Ordering::Less);
    }

    #[test]
    fn test_names_by_label() {
        let pairs = vec![
            ("e10".to_string(), "Port 10".to_string()),
            ("e2".to_string(), "Port 2".to_string()),
            ("e1".to_string(), "Port 1".to_string()),
        ];
        assert_eq!(names_by_label(pairs), vec!["e1", "e2", "e10"]);
    }
}
