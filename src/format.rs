//! Rendering of INDI number element values.
//!
//! Number elements carry a printf-style `format` attribute. Two families
//! are recognised: classic printf conversions (`%.2f`, `%g`, ...) applied
//! to the numeric value, and the INDI sexagesimal form `%<w>.<f>m` which
//! renders degrees:minutes[:seconds] padded to an overall width.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::{self, Write};

lazy_static! {
    static ref SEXAGESIMAL_RE: Regex = Regex::new(r"^%(\d+)\.(\d+)m$").unwrap();
    static ref PRINTF_RE: Regex = Regex::new(r"^%([-+0 ]*)(\d+)?(?:\.(\d+))?([dfeg])$").unwrap();
    static ref NUMBER_RE: Regex =
        Regex::new(r"^\s*[-+]?\d*\.?\d*(?:[:; ]\d*\.?\d*)*\s*$").unwrap();
}

/// Number format specification
#[derive(Debug, Clone, PartialEq)]
pub enum NumberFormat {
    /// Printf-style conversion
    Printf(PrintfFormat),
    /// Sexagesimal rendering (e.g. `%9.6m`)
    Sexagesimal {
        /// Total field width, space padded on the left
        width: usize,
        /// Fraction code: 3, 5, 6, 8 or 9
        precision: usize,
    },
}

/// A parsed printf conversion: `%[flags][width][.precision](d|f|e|g)`
#[derive(Debug, Clone, PartialEq)]
pub struct PrintfFormat {
    zero_pad: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberFormat::Printf(p) => {
                write!(f, "%")?;
                if p.zero_pad {
                    write!(f, "0")?;
                }
                if let Some(w) = p.width {
                    write!(f, "{}", w)?;
                }
                if let Some(prec) = p.precision {
                    write!(f, ".{}", prec)?;
                }
                write!(f, "{}", p.conversion)
            }
            NumberFormat::Sexagesimal { width, precision } => {
                write!(f, "%{}.{}m", width, precision)
            }
        }
    }
}

impl NumberFormat {
    /// Parse a format attribute string
    pub fn parse(format: &str) -> Result<Self> {
        if let Some(caps) = SEXAGESIMAL_RE.captures(format) {
            let width = caps[1]
                .parse()
                .map_err(|_| Error::Format(format!("invalid width in {}", format)))?;
            let precision = caps[2]
                .parse()
                .map_err(|_| Error::Format(format!("invalid precision in {}", format)))?;
            return Ok(NumberFormat::Sexagesimal { width, precision });
        }

        if let Some(caps) = PRINTF_RE.captures(format) {
            let flags = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            return Ok(NumberFormat::Printf(PrintfFormat {
                zero_pad: flags.contains('0'),
                width: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                precision: caps.get(3).and_then(|m| m.as_str().parse().ok()),
                conversion: caps[4].chars().next().unwrap_or('f'),
            }));
        }

        Err(Error::Format(format!("unrecognised format: {}", format)))
    }

    /// Render a numeric value with this format
    pub fn format(&self, value: f64) -> Result<String> {
        match self {
            NumberFormat::Printf(p) => Ok(p.format(value)),
            NumberFormat::Sexagesimal { width, precision } => {
                Ok(format_sexagesimal(value, *width, *precision))
            }
        }
    }
}

impl PrintfFormat {
    fn format(&self, value: f64) -> String {
        let body = match self.conversion {
            'd' => format!("{}", value.round() as i64),
            'e' => format_scientific(value, self.precision.unwrap_or(6)),
            'g' => format_general(value, self.precision.unwrap_or(6)),
            _ => format!("{:.*}", self.precision.unwrap_or(6), value),
        };
        match self.width {
            Some(w) if body.len() < w => {
                if self.zero_pad {
                    if let Some(stripped) = body.strip_prefix('-') {
                        format!("-{:0>width$}", stripped, width = w - 1)
                    } else {
                        format!("{:0>width$}", body, width = w)
                    }
                } else {
                    format!("{:>width$}", body, width = w)
                }
            }
            _ => body,
        }
    }
}

/// `%e`: printf scientific notation. Rust's `{:e}` writes `1.2e8`;
/// every other INDI tool expects the printf convention of a signed,
/// zero-padded two-digit exponent (`1.2e+08`), so the mantissa and
/// exponent are assembled by hand.
fn format_scientific(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return format!("{:.*}e+00", precision, 0.0_f64);
    }
    let negative = value < 0.0;
    let mut exponent = value.abs().log10().floor() as i32;
    let mut mantissa = value.abs() / 10f64.powi(exponent);
    // rounding at low precision can carry the mantissa up to 10
    if format!("{:.*}", precision, mantissa).starts_with("10") {
        mantissa /= 10.0;
        exponent += 1;
    }
    format!(
        "{}{:.*}e{}{:02}",
        if negative { "-" } else { "" },
        precision,
        mantissa,
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    )
}

/// `%g`: fixed notation with trailing zeros trimmed, switching to
/// printf scientific notation for very large or very small magnitudes.
fn format_general(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if value != 0.0 {
        let exponent = value.abs().log10().floor() as i32;
        if exponent < -4 || exponent >= precision as i32 {
            let sci = format_scientific(value, precision - 1);
            // %g also strips trailing mantissa zeros in scientific form
            return match sci.split_once('e') {
                Some((mantissa, exp)) if mantissa.contains('.') => {
                    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
                    format!("{}e{}", mantissa, exp)
                }
                _ => sci,
            };
        }
    }
    let decimals = (precision as i32 - 1 - exponent_of(value)).max(0) as usize;
    let fixed = format!("{:.*}", decimals, value);
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}

fn exponent_of(value: f64) -> i32 {
    if value == 0.0 {
        0
    } else {
        value.abs().log10().floor() as i32
    }
}

/// Parse a number element value, which may be plain decimal or
/// sexagesimal with `' '`, `':'` or `';'` separating the components.
/// Missing seconds default to zero; the sign applies to the whole value.
pub fn parse_number(s: &str) -> Result<f64> {
    if !NUMBER_RE.is_match(s) {
        return Err(Error::Format(format!("invalid number: {}", s)));
    }

    let s = s.trim();
    let parts: Vec<&str> = s.split(|c| c == ':' || c == ';' || c == ' ').collect();

    let first = parts[0]
        .parse::<f64>()
        .map_err(|_| Error::Format(format!("invalid number: {}", parts[0])))?;
    let sign = if parts[0].starts_with('-') { -1.0 } else { 1.0 };
    let mut value = first.abs();

    let mut multiplier = 1.0 / 60.0;
    for part in parts.iter().skip(1) {
        if !part.is_empty() {
            value += part
                .parse::<f64>()
                .map_err(|_| Error::Format(format!("invalid number: {}", part)))?
                * multiplier;
        }
        multiplier /= 60.0;
    }

    Ok(value * sign)
}

/// Render a raw number element value using its format attribute.
///
/// This is what the store writes to the `formatted_number` field of a
/// number element so GUIs never have to re-implement the formats.
pub fn format_number(format: &str, raw_value: &str) -> Result<String> {
    let value = parse_number(raw_value)?;
    NumberFormat::parse(format)?.format(value)
}

/// Sexagesimal rendering. The value is first rounded at the resolution
/// selected by the fraction code, then decomposed, so overflowing
/// minutes or seconds carry upward (10:70:75 becomes 11:11:15).
fn format_sexagesimal(value: f64, width: usize, precision: usize) -> String {
    let negative = value < 0.0;
    let abs = value.abs();
    let mut numeric = String::with_capacity(width);

    match precision {
        3 => {
            // DD:MM
            let total = (abs * 60.0).round() as u64;
            let _ = write!(numeric, "{}:{:02}", total / 60, total % 60);
        }
        5 => {
            // DD:MM.M
            let total = (abs * 600.0).round() as u64;
            let rem = total % 600;
            let _ = write!(numeric, "{}:{:02}.{}", total / 600, rem / 10, rem % 10);
        }
        6 => {
            // DD:MM:SS
            let total = (abs * 3600.0).round() as u64;
            let rem = total % 3600;
            let _ = write!(numeric, "{}:{:02}:{:02}", total / 3600, rem / 60, rem % 60);
        }
        8 => {
            // DD:MM:SS.S
            let total = (abs * 36000.0).round() as u64;
            let rem = total % 36000;
            let secs = rem % 600;
            let _ = write!(
                numeric,
                "{}:{:02}:{:02}.{}",
                total / 36000,
                rem / 600,
                secs / 10,
                secs % 10
            );
        }
        _ => {
            // DD:MM:SS.SS
            let total = (abs * 360000.0).round() as u64;
            let rem = total % 360000;
            let secs = rem % 6000;
            let _ = write!(
                numeric,
                "{}:{:02}:{:02}.{:02}",
                total / 360000,
                rem / 6000,
                secs / 100,
                secs % 100
            );
        }
    }

    let signed = if negative {
        format!("-{}", numeric)
    } else {
        numeric
    };
    if signed.len() < width {
        format!("{:>width$}", signed, width = width)
    } else {
        signed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_format_parse() {
        assert!(matches!(
            NumberFormat::parse("%8.3m").unwrap(),
            NumberFormat::Sexagesimal {
                width: 8,
                precision: 3
            }
        ));
        assert!(matches!(
            NumberFormat::parse("%.2f").unwrap(),
            NumberFormat::Printf(_)
        ));
        assert!(NumberFormat::parse("no-percent").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5").unwrap(), 12.5);
        assert_eq!(parse_number("-12:30").unwrap(), -12.5);
        assert_eq!(parse_number("12:30:00").unwrap(), 12.5);
        assert_eq!(parse_number("12 30").unwrap(), 12.5);
        assert_eq!(parse_number("12;30").unwrap(), 12.5);
        assert!(parse_number("twelve").is_err());
    }

    #[test]
    fn test_printf_formats() {
        assert_eq!(format_number("%.2f", "1.005").unwrap(), "1.00");
        assert_eq!(format_number("%7.2f", "-1.5").unwrap(), "  -1.50");
        assert_eq!(format_number("%07.2f", "-1.5").unwrap(), "-001.50");
        assert_eq!(format_number("%d", "42.4").unwrap(), "42");
        assert_eq!(format_number("%g", "1200").unwrap(), "1200");
        assert_eq!(format_number("%g", "0.5").unwrap(), "0.5");
    }

    #[test]
    fn test_printf_scientific_uses_signed_two_digit_exponent() {
        assert_eq!(format_number("%e", "12345.6789").unwrap(), "1.234568e+04");
        assert_eq!(format_number("%.2e", "-0.00123").unwrap(), "-1.23e-03");
        assert_eq!(format_number("%e", "0").unwrap(), "0.000000e+00");
        assert_eq!(format_number("%.1e", "0.99").unwrap(), "9.9e-01");
        // mantissa rounding carries into the exponent
        assert_eq!(format_number("%.0e", "999").unwrap(), "1e+03");
    }

    #[test]
    fn test_general_format_scientific_branch() {
        assert_eq!(format_number("%g", "123456789").unwrap(), "1.23457e+08");
        assert_eq!(format_number("%g", "0.00001").unwrap(), "1e-05");
        assert_eq!(format_number("%g", "-123456789").unwrap(), "-1.23457e+08");
        assert_eq!(format_number("%.3g", "12345").unwrap(), "1.23e+04");
    }

    #[test]
    fn test_sexagesimal_overflow_carries() {
        // seconds and minutes both overflow and carry upward
        assert_eq!(format_number("%9.6m", "10:70:75").unwrap(), " 11:11:15");
    }

    #[test]
    fn test_format_sexagesimal_widths() {
        assert_eq!(format_sexagesimal(123.75, 7, 3), " 123:45");
        assert_eq!(format_sexagesimal(-123.75, 7, 3), "-123:45");
        assert_eq!(format_sexagesimal(1.5, 7, 3), "   1:30");

        assert_eq!(format_sexagesimal(1.5, 9, 5), "   1:30.0");
        assert_eq!(format_sexagesimal(1.525, 9, 5), "   1:31.5");

        assert_eq!(format_sexagesimal(1.5, 9, 6), "  1:30:00");
        assert_eq!(format_sexagesimal(12.5, 9, 6), " 12:30:00");
        assert_eq!(format_sexagesimal(-1.5, 9, 6), " -1:30:00");

        assert_eq!(format_sexagesimal(12.508333, 11, 8), " 12:30:30.0");
        assert_eq!(format_sexagesimal(12.508333, 11, 9), "12:30:30.00");
    }

    #[test]
    fn test_sexagesimal_rounding_does_not_show_sixty() {
        // 59.995 seconds at SS precision rounds up into the next minute
        let almost = 1.0 + 59.0 / 60.0 + 59.995 / 3600.0;
        assert_eq!(format_sexagesimal(almost, 0, 6), "2:00:00");
    }
}
