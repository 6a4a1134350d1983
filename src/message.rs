//! `%`-style message interpolation.
//!
//! A template such as `"user %s logged in after %.2f s"` is rendered against
//! the event's positional arguments. When exactly one argument is given and
//! it is a map, `%(key)s` conversions read from that map.

use crate::value::{JsonRecord, Value};
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("not enough arguments for format string")]
    NotEnoughArguments,

    #[error("not all arguments converted during string formatting")]
    TooManyArguments,

    #[error("unsupported format character '{ch}' ({code:#x}) at index {index}")]
    UnsupportedFormat { ch: char, code: u32, index: usize },

    #[error("incomplete format")]
    IncompleteFormat,

    #[error("%{conversion} format: {expected} is required, not {found}")]
    WrongType {
        conversion: char,
        expected: &'static str,
        found: String,
    },

    #[error("format requires a mapping")]
    MappingRequired,

    #[error("missing mapping key '{0}'")]
    MissingKey(String),

    #[error("%c requires an int in range or a single character")]
    InvalidChar,

    #[error("width too big")]
    WidthTooBig,

    #[error("precision too big")]
    PrecisionTooBig,
}

/// Largest width or precision a directive may ask for.
pub const MAX_FIELD_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Default)]
struct Directive {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

/// Render `template` against `args`.
///
/// With no arguments the template is returned verbatim, so a literal `%` in
/// an argument-less message never fails.
pub fn render(template: &str, args: &[Value]) -> Result<String, RenderError> {
    if args.is_empty() {
        return Ok(template.to_string());
    }

    let mapping = match args {
        [Value::Map(map)] => Some(map),
        _ => None,
    };

    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.char_indices().peekable();
    let mut next_arg = 0usize;

    while let Some((_, c)) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let key = parse_key(&mut chars)?;
        let directive = parse_directive(&mut chars)?;

        let (index, conversion) = chars.next().ok_or(RenderError::IncompleteFormat)?;
        if conversion == '%' {
            out.push('%');
            continue;
        }

        let arg = match &key {
            Some(key) => lookup(mapping, key)?,
            None => {
                let arg = args.get(next_arg).ok_or(RenderError::NotEnoughArguments)?;
                next_arg += 1;
                arg
            }
        };

        let text = convert(conversion, index, &directive, arg)?;
        out.push_str(&text);
    }

    if mapping.is_none() && next_arg < args.len() {
        return Err(RenderError::TooManyArguments);
    }
    Ok(out)
}

fn lookup<'a>(mapping: Option<&'a JsonRecord>, key: &str) -> Result<&'a Value, RenderError> {
    mapping
        .ok_or(RenderError::MappingRequired)?
        .get(key)
        .ok_or_else(|| RenderError::MissingKey(key.to_string()))
}

fn parse_key(chars: &mut Peekable<CharIndices<'_>>) -> Result<Option<String>, RenderError> {
    if !matches!(chars.peek(), Some((_, '('))) {
        return Ok(None);
    }
    chars.next();
    let mut key = String::new();
    for (_, c) in chars.by_ref() {
        if c == ')' {
            return Ok(Some(key));
        }
        key.push(c);
    }
    Err(RenderError::IncompleteFormat)
}

fn parse_directive(chars: &mut Peekable<CharIndices<'_>>) -> Result<Directive, RenderError> {
    let mut directive = Directive::default();

    while let Some(&(_, c)) = chars.peek() {
        match c {
            '-' => directive.left = true,
            '+' => directive.plus = true,
            ' ' => directive.space = true,
            '0' => directive.zero = true,
            '#' => directive.alt = true,
            _ => break,
        }
        chars.next();
    }

    directive.width = parse_number(chars);
    if directive.width > MAX_FIELD_SIZE {
        return Err(RenderError::WidthTooBig);
    }

    if matches!(chars.peek(), Some((_, '.'))) {
        chars.next();
        let precision = parse_number(chars);
        if precision > MAX_FIELD_SIZE {
            return Err(RenderError::PrecisionTooBig);
        }
        directive.precision = Some(precision);
    }

    // Length modifiers carry no meaning here.
    while matches!(chars.peek(), Some((_, 'h' | 'l' | 'L'))) {
        chars.next();
    }
    Ok(directive)
}

fn parse_number(chars: &mut Peekable<CharIndices<'_>>) -> usize {
    let mut n = 0usize;
    while let Some(&(_, c)) = chars.peek() {
        match c.to_digit(10) {
            Some(d) => {
                n = n.saturating_mul(10).saturating_add(d as usize);
                chars.next();
            }
            None => break,
        }
    }
    n
}

fn convert(conversion: char, index: usize, directive: &Directive, arg: &Value) -> Result<String, RenderError> {
    match conversion {
        's' | 'r' | 'a' => {
            let mut text = if conversion == 's' { arg.to_string() } else { arg.repr() };
            if let Some(p) = directive.precision {
                text = text.chars().take(p).collect();
            }
            Ok(pad(text, directive.width, directive.left))
        }
        'd' | 'i' | 'u' => {
            let n = arg.as_i128().ok_or_else(|| wrong_type(conversion, "a real number", arg))?;
            Ok(signed(n < 0, "", n.unsigned_abs().to_string(), directive))
        }
        'x' | 'X' | 'o' => {
            let n = match arg {
                Value::Int(_) | Value::UInt(_) | Value::Bool(_) => arg.as_i128().unwrap_or_default(),
                _ => return Err(wrong_type(conversion, "an integer", arg)),
            };
            let abs = n.unsigned_abs();
            let (prefix, digits) = match conversion {
                'x' => ("0x", format!("{:x}", abs)),
                'X' => ("0X", format!("{:X}", abs)),
                _ => ("0o", format!("{:o}", abs)),
            };
            let prefix = if directive.alt { prefix } else { "" };
            Ok(signed(n < 0, prefix, digits, directive))
        }
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
            let x = arg.as_f64().ok_or_else(|| wrong_type(conversion, "a real number", arg))?;
            let digits = float_body(conversion, x.abs(), directive);
            Ok(signed(x.is_sign_negative() && !x.is_nan(), "", digits, directive))
        }
        'c' => {
            let ch = match arg {
                Value::Str(s) if s.chars().count() == 1 => s.chars().next(),
                Value::Int(_) | Value::UInt(_) => arg
                    .as_i128()
                    .and_then(|n| u32::try_from(n).ok())
                    .and_then(char::from_u32),
                _ => None,
            };
            let ch = ch.ok_or(RenderError::InvalidChar)?;
            Ok(pad(ch.to_string(), directive.width, directive.left))
        }
        other => Err(RenderError::UnsupportedFormat {
            ch: other,
            code: other as u32,
            index,
        }),
    }
}

fn wrong_type(conversion: char, expected: &'static str, arg: &Value) -> RenderError {
    RenderError::WrongType {
        conversion,
        expected,
        found: arg.type_name().to_string(),
    }
}

fn pad(text: String, width: usize, left: bool) -> String {
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let fill = " ".repeat(width - len);
    if left {
        text + &fill
    } else {
        fill + &text
    }
}

/// Assemble sign, prefix and digits, honouring `+`, space, `0` and `-`.
fn signed(negative: bool, prefix: &str, digits: String, directive: &Directive) -> String {
    let sign = if negative {
        "-"
    } else if directive.plus {
        "+"
    } else if directive.space {
        " "
    } else {
        ""
    };
    let head_len = sign.len() + prefix.len();
    let finite = !matches!(digits.to_ascii_lowercase().as_str(), "inf" | "nan");
    if directive.zero && !directive.left && finite {
        let zeros = directive.width.saturating_sub(head_len + digits.len());
        format!("{}{}{}{}", sign, prefix, "0".repeat(zeros), digits)
    } else {
        pad(format!("{}{}{}", sign, prefix, digits), directive.width, directive.left)
    }
}

/// Digits of a non-negative float for the `f`, `e` and `g` families.
fn float_body(conversion: char, x: f64, directive: &Directive) -> String {
    let upper = conversion.is_ascii_uppercase();
    if !x.is_finite() {
        let text = if x.is_nan() { "nan" } else { "inf" };
        return if upper { text.to_uppercase() } else { text.to_string() };
    }

    let precision = directive.precision.unwrap_or(6);
    let body = match conversion.to_ascii_lowercase() {
        'f' => format!("{:.*}", precision, x),
        'e' => exponent_form(x, precision),
        _ => general_form(x, precision, directive.alt),
    };
    if upper {
        body.to_uppercase()
    } else {
        body
    }
}

/// `1.500000e+03` style: signed exponent with at least two digits.
fn exponent_form(x: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, x);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.abs())
}

fn general_form(x: f64, precision: usize, keep_zeros: bool) -> String {
    let p = precision.max(1);
    let raw = format!("{:.*e}", p - 1, x);
    let exp: i32 = raw
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);

    let body = if exp >= -4 && exp < p as i32 {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, x)
    } else {
        exponent_form(x, p - 1)
    };

    if keep_zeros {
        return body;
    }
    match body.split_once('e') {
        Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa), exp),
        None => strip_zeros(&body).to_string(),
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
