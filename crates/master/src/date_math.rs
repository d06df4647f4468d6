//! Date-math index names
//!
//! `<logs-{now/d}>` resolves to `logs-2024.03.05` for the current UTC day. A
//! placeholder is `{math}`, `{math{format}}` or `{math{format|offset}}`:
//! - `math` is `now` followed by `+N<unit>`, `-N<unit>` and `/<unit>`
//!   operations, with units `y M w d h H m s`
//! - `format` uses `yyyy`/`uuuu`, `yy`, `MM`, `dd`, `HH`, `mm`, `ss`
//!   (default `uuuu.MM.dd`)
//! - `offset` is `UTC`, `Z` or `+HH:MM`/`-HH:MM`
//!
//! Names not wrapped in `<` `>` are returned unchanged. `\` escapes the next
//! character.

use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, Months, NaiveDateTime, NaiveTime, Offset,
    Timelike, Utc,
};

use crate::error::{MasterError, MasterResult};

const DEFAULT_FORMAT: &str = "uuuu.MM.dd";

fn invalid(expression: &str, reason: impl std::fmt::Display) -> MasterError {
    MasterError::illegal_argument(format!(
        "invalid dynamic name expression [{}]. {}",
        expression, reason
    ))
}

/// Resolve a possibly date-math index name against `now`
pub fn resolve_date_math(expression: &str, now: DateTime<Utc>) -> MasterResult<String> {
    if expression.len() < 2 || !expression.starts_with('<') || !expression.ends_with('>') {
        return Ok(expression.to_string());
    }
    let inner = &expression[1..expression.len() - 1];
    let mut resolved = String::with_capacity(inner.len());
    let mut chars = inner.chars().enumerate();

    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => resolved.push(escaped),
                None => return Err(invalid(expression, "dangling escape character")),
            },
            '{' => {
                let mut math = String::new();
                let mut format = None;
                loop {
                    match chars.next() {
                        None => {
                            return Err(invalid(expression, "date math placeholder is open ended"))
                        }
                        Some((_, '}')) => break,
                        Some((_, '{')) => {
                            let mut pattern = String::new();
                            loop {
                                match chars.next() {
                                    None => {
                                        return Err(invalid(
                                            expression,
                                            "missing closing `}` for date math format",
                                        ))
                                    }
                                    Some((_, '}')) => break,
                                    Some((_, c)) => pattern.push(c),
                                }
                            }
                            if pattern.is_empty() {
                                return Err(invalid(expression, "missing date format"));
                            }
                            format = Some(pattern);
                            match chars.next() {
                                Some((_, '}')) => break,
                                _ => {
                                    return Err(invalid(
                                        expression,
                                        "date math placeholder is open ended",
                                    ))
                                }
                            }
                        }
                        Some((_, c)) => math.push(c),
                    }
                }
                resolved.push_str(&evaluate(expression, &math, format.as_deref(), now)?);
            }
            '}' => {
                return Err(invalid(
                    expression,
                    format!(
                        "invalid character at position [{}]. `{{` and `}}` are reserved characters and should be escaped when used as part of the index name using `\\`",
                        pos
                    ),
                ))
            }
            c => resolved.push(c),
        }
    }
    Ok(resolved)
}

fn evaluate(
    expression: &str,
    math: &str,
    format: Option<&str>,
    now: DateTime<Utc>,
) -> MasterResult<String> {
    let (pattern, offset) = match format {
        Some(format) => match format.split_once('|') {
            Some((pattern, offset)) => (pattern, parse_offset(expression, offset)?),
            None => (format, utc()),
        },
        None => (DEFAULT_FORMAT, utc()),
    };

    let Some(ops) = math.trim().strip_prefix("now") else {
        return Err(invalid(
            expression,
            format!("date math expression [{}] must start with `now`", math),
        ));
    };
    let local = now.with_timezone(&offset).naive_local();
    let date = apply_ops(expression, ops, local)?;
    Ok(date.format(&to_strftime(expression, pattern)?).to_string())
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn parse_offset(expression: &str, offset: &str) -> MasterResult<FixedOffset> {
    if offset == "UTC" || offset == "Z" {
        return Ok(utc());
    }
    let err = || invalid(expression, format!("unsupported time zone [{}]", offset));
    let (sign, rest) = match offset.as_bytes().first() {
        Some(b'+') => (1, &offset[1..]),
        Some(b'-') => (-1, &offset[1..]),
        _ => return Err(err()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(err)?;
    let hours: i32 = hours.parse().map_err(|_| err())?;
    let minutes: i32 = minutes.parse().map_err(|_| err())?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}

fn apply_ops(expression: &str, ops: &str, mut date: NaiveDateTime) -> MasterResult<NaiveDateTime> {
    let mut chars = ops.chars().peekable();

    while let Some(op) = chars.next() {
        match op {
            '/' => {
                let unit = chars
                    .next()
                    .ok_or_else(|| invalid(expression, "rounding requires a unit"))?;
                date = round_down(expression, date, unit)?;
            }
            '+' | '-' => {
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                let amount: i64 = if digits.is_empty() {
                    1
                } else {
                    digits.parse().map_err(|_| out_of_range(expression))?
                };
                let amount = if op == '-' { -amount } else { amount };
                let unit = chars
                    .next()
                    .ok_or_else(|| invalid(expression, "date math operation requires a unit"))?;
                date = add(expression, date, amount, unit)?;
            }
            other => {
                return Err(invalid(
                    expression,
                    format!("unsupported date math operator [{}]", other),
                ))
            }
        }
    }
    Ok(date)
}

fn out_of_range(expression: &str) -> MasterError {
    invalid(expression, "date math result out of range")
}

fn add_months(date: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

fn add(expression: &str, date: NaiveDateTime, amount: i64, unit: char) -> MasterResult<NaiveDateTime> {
    let result = match unit {
        'y' => amount.checked_mul(12).and_then(|n| add_months(date, n)),
        'M' => add_months(date, amount),
        'w' => Duration::try_weeks(amount).and_then(|d| date.checked_add_signed(d)),
        'd' => Duration::try_days(amount).and_then(|d| date.checked_add_signed(d)),
        'h' | 'H' => Duration::try_hours(amount).and_then(|d| date.checked_add_signed(d)),
        'm' => Duration::try_minutes(amount).and_then(|d| date.checked_add_signed(d)),
        's' => Duration::try_seconds(amount).and_then(|d| date.checked_add_signed(d)),
        other => return Err(unknown_unit(expression, other)),
    };
    result.ok_or_else(|| out_of_range(expression))
}

fn unknown_unit(expression: &str, unit: char) -> MasterError {
    invalid(expression, format!("unit [{}] not supported for date math", unit))
}

fn round_down(expression: &str, date: NaiveDateTime, unit: char) -> MasterResult<NaiveDateTime> {
    let day = date.date();
    let rounded = match unit {
        'y' => day.with_month(1).and_then(|d| d.with_day(1)).map(|d| d.and_time(NaiveTime::MIN)),
        'M' => day.with_day(1).map(|d| d.and_time(NaiveTime::MIN)),
        'w' => {
            let back = u64::from(day.weekday().num_days_from_monday());
            day.checked_sub_days(Days::new(back))
                .map(|d| d.and_time(NaiveTime::MIN))
        }
        'd' => Some(day.and_time(NaiveTime::MIN)),
        'h' | 'H' => day.and_hms_opt(date.time().hour(), 0, 0),
        'm' => day.and_hms_opt(date.time().hour(), date.time().minute(), 0),
        's' => day.and_hms_opt(date.time().hour(), date.time().minute(), date.time().second()),
        other => return Err(unknown_unit(expression, other)),
    };
    rounded.ok_or_else(|| out_of_range(expression))
}

/// Translate a `yyyy.MM.dd` style pattern to a chrono format string
fn to_strftime(expression: &str, pattern: &str) -> MasterResult<String> {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if !c.is_ascii_alphabetic() {
            if c == '%' {
                out.push_str("%%");
            } else {
                out.push(c);
            }
            continue;
        }
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        let directive = match (c, run) {
            ('y' | 'u', 4) => "%Y",
            ('y' | 'u', 2) => "%y",
            ('M', 2) => "%m",
            ('d', 2) => "%d",
            ('H', 2) => "%H",
            ('m', 2) => "%M",
            ('s', 2) => "%S",
            _ => {
                return Err(invalid(
                    expression,
                    format!("unsupported date format pattern [{}]", pattern),
                ))
            }
        };
        out.push_str(directive);
    }
    Ok(out)
}
