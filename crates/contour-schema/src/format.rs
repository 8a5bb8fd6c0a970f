//! String `format` checks. Best-effort shape checks; unknown formats pass.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate, NaiveTime};

/// Check `value` against `format`, returning the error message on failure.
pub fn check(format: &str, value: &str) -> Result<(), &'static str> {
    let ok = match format {
        "date-time" => DateTime::parse_from_rfc3339(value).is_ok(),
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        "time" => is_time(value),
        "email" | "idn-email" => is_email(value),
        "uuid" => uuid::Uuid::parse_str(value).is_ok(),
        "uri" | "url" => url::Url::parse(value).is_ok(),
        "hostname" => is_hostname(value),
        "ipv4" => value.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => value.parse::<Ipv6Addr>().is_ok(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(message(format))
    }
}

fn message(format: &str) -> &'static str {
    match format {
        "date-time" => "expected string to be RFC 3339 date-time",
        "date" => "expected string to be RFC 3339 date",
        "time" => "expected string to be RFC 3339 time",
        "email" | "idn-email" => "expected string to be RFC 5322 email",
        "uuid" => "expected string to be RFC 4122 uuid",
        "uri" | "url" => "expected string to be RFC 3986 uri",
        "hostname" => "expected string to be RFC 5890 hostname",
        "ipv4" => "expected string to be RFC 2673 ipv4",
        "ipv6" => "expected string to be RFC 2373 ipv6",
        _ => "expected string to match format",
    }
}

/// `HH:MM:SS[.frac]` with an optional `Z` or `+HH:MM` offset.
fn is_time(value: &str) -> bool {
    let local = value
        .strip_suffix('Z')
        .or_else(|| value.strip_suffix('z'))
        .unwrap_or(value);
    if local.len() != value.len() {
        return NaiveTime::parse_from_str(local, "%H:%M:%S%.f").is_ok();
    }
    if DateTime::parse_from_rfc3339(&format!("1970-01-01T{value}")).is_ok() {
        return true;
    }
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok()
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }
    if local.is_empty() || local.starts_with('.') || local.ends_with('.') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }
    domain.contains('.')
}

fn is_hostname(value: &str) -> bool {
    let host = value.strip_suffix('.').unwrap_or(value);
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_formats() {
        assert!(check("date-time", "2024-05-01T12:00:00Z").is_ok());
        assert!(check("date-time", "2024-05-01").is_err());
        assert!(check("date", "2024-05-01").is_ok());
        assert!(check("time", "12:30:00Z").is_ok());
        assert!(check("time", "12:30:00.5+02:00").is_ok());
        assert!(check("time", "25:00:00").is_err());
        assert!(check("email", "a.b@example.com").is_ok());
        assert!(check("email", "nobody").is_err());
        assert!(check("email", "a@b@c.com").is_err());
        assert!(check("uri", "https://example.com/x?y=1").is_ok());
        assert!(check("uri", "not a uri").is_err());
        assert!(check("hostname", "api.example.com").is_ok());
        assert!(check("hostname", "-bad-.com").is_err());
        assert!(check("ipv4", "10.0.0.1").is_ok());
        assert!(check("ipv6", "::1").is_ok());
        assert!(check("ipv4", "::1").is_err());
    }

    #[test]
    fn uuid_message() {
        assert_eq!(check("uuid", "nope"), Err("expected string to be RFC 4122 uuid"));
        assert!(check("uuid", "67e55044-10b1-426f-9247-bb680e5fe0c8").is_ok());
    }

    #[test]
    fn unknown_format_is_documentation_only() {
        assert!(check("int64", "anything").is_ok());
    }
}
