//! Expression Parser: turns a `cron(...)` or `rate(N unit)` schedule
//! expression into a [`ParsedSchedule`] with a pure, total `next()`.

mod cron;
mod rate;

use chrono::{DateTime, Utc};
use rate::Rate;

/// The fallback schedule substituted when an association carries no
/// expression at all. Matches AWS's own `cron(0 0/5 * 1/1 * ? *)` sentinel
/// — "every 5 minutes" in 7-field Quartz-style syntax.
pub const FALLBACK_EXPRESSION: &str = "cron(0 0/5 * 1/1 * ? *)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionError {
    pub source_text: String,
    pub message: String,
}

impl std::fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid expression '{}': {}", self.source_text, self.message)
    }
}

impl std::error::Error for ExpressionError {}

impl From<ExpressionError> for sa_domain::Error {
    fn from(e: ExpressionError) -> Self {
        sa_domain::Error::Expression {
            source_text: e.source_text,
            message: e.message,
        }
    }
}

/// Owned cron fields so a [`ParsedSchedule`] can outlive the source string
/// it was parsed from.
#[derive(Debug, Clone)]
struct CronSchedule {
    second: Option<String>,
    minute: String,
    hour: String,
    day_of_month: String,
    month: String,
    day_of_week: String,
    year: Option<String>,
}

impl CronSchedule {
    fn as_fields(&self) -> cron::CronFields<'_> {
        cron::CronFields {
            second: self.second.as_deref(),
            minute: &self.minute,
            hour: &self.hour,
            day_of_month: &self.day_of_month,
            month: &self.month,
            day_of_week: &self.day_of_week,
            year: self.year.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ParsedSchedule {
    Cron(CronSchedule),
    Rate(Rate),
}

impl ParsedSchedule {
    /// Strictly-after, total: the smallest instant satisfying the schedule
    /// that is greater than `after`.
    pub fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ParsedSchedule::Cron(c) => cron::next(&c.as_fields(), &after),
            ParsedSchedule::Rate(r) => Some(r.next(after)),
        }
    }
}

/// Split a cron body into 5, 6, or 7 whitespace-separated fields:
/// - 5: `min hour dom month dow`
/// - 6: `min hour dom month dow year`
/// - 7: `sec min hour dom month dow year` (AWS Quartz-style)
fn parse_cron_body(body: &str, source_text: &str) -> Result<CronSchedule, ExpressionError> {
    let fields: Vec<&str> = body.split_whitespace().collect();
    let (second, minute, hour, dom, month, dow, year) = match fields.len() {
        5 => (None, fields[0], fields[1], fields[2], fields[3], fields[4], None),
        6 => (
            None,
            fields[0],
            fields[1],
            fields[2],
            fields[3],
            fields[4],
            Some(fields[5]),
        ),
        7 => (
            Some(fields[0]),
            fields[1],
            fields[2],
            fields[3],
            fields[4],
            fields[5],
            Some(fields[6]),
        ),
        n => {
            return Err(ExpressionError {
                source_text: source_text.to_string(),
                message: format!("expected 5, 6, or 7 fields, got {n}"),
            })
        }
    };

    if let Some(sec) = second {
        if sec != "0" && sec != "*" && sec != "?" {
            return Err(ExpressionError {
                source_text: source_text.to_string(),
                message: "seconds field must be '0', '*', or '?' — this parser steps at minute granularity".into(),
            });
        }
    }

    Ok(CronSchedule {
        second: second.map(str::to_string),
        minute: minute.to_string(),
        hour: hour.to_string(),
        day_of_month: dom.to_string(),
        month: month.to_string(),
        day_of_week: dow.to_string(),
        year: year.map(str::to_string),
    })
}

/// Parse a `cron(...)` or `rate(N unit)` schedule expression. Matching is
/// case-insensitive on the `cron`/`rate` keyword only; field contents are
/// not case-folded (none of them are alphabetic).
pub fn parse(source: &str) -> Result<ParsedSchedule, ExpressionError> {
    let trimmed = source.trim();
    let lower = trimmed.to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("cron(") {
        let body = rest.strip_suffix(')').ok_or_else(|| ExpressionError {
            source_text: source.to_string(),
            message: "missing closing ')'".into(),
        })?;
        // Recover original-cased body from the original string, since the
        // lowercased copy was only used to find the delimiters.
        let start = "cron(".len();
        let original_body = &trimmed[start..trimmed.len() - 1];
        let _ = body;
        return Ok(ParsedSchedule::Cron(parse_cron_body(
            original_body,
            source,
        )?));
    }

    if let Some(rest) = lower.strip_prefix("rate(") {
        let body_len = rest.len().saturating_sub(1);
        if !rest.ends_with(')') {
            return Err(ExpressionError {
                source_text: source.to_string(),
                message: "missing closing ')'".into(),
            });
        }
        let start = "rate(".len();
        let original_body = &trimmed[start..start + body_len];
        let rate = Rate::parse(original_body).ok_or_else(|| ExpressionError {
            source_text: source.to_string(),
            message: "expected 'rate(N unit)' with unit in minutes/hours/days".into(),
        })?;
        return Ok(ParsedSchedule::Rate(rate));
    }

    Err(ExpressionError {
        source_text: source.to_string(),
        message: "expected a 'cron(...)' or 'rate(...)' expression".into(),
    })
}

/// The schedule substituted for associations with no expression of their
/// own. Infallible — the sentinel is a constant this parser always accepts.
pub fn fallback_schedule() -> ParsedSchedule {
    parse(FALLBACK_EXPRESSION).expect("fallback expression must always parse")
}
