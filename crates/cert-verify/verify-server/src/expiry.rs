use cert_verify_core::RequestContext;
use chrono::{
    DateTime,
    NaiveDateTime,
    Utc,
};

/// Wire format of `expires`, always UTC.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const EXPIRED_MESSAGE: &str = "ERROR: Assertion.expires - certificate has expired";

/// Checks `expires` against the current time.
pub fn check_expiry(context: &RequestContext, expires: Option<&str>) -> Option<String> {
    check_expiry_at(context, expires, Utc::now())
}

/// Returns the expiry finding when `expires` lies strictly before `now`.
///
/// Both sides go through [`EXPIRY_FORMAT`], so the comparison is at second
/// granularity. A blank value is not a finding. Neither is a value that does
/// not parse: it is logged and verification carries on.
pub fn check_expiry_at(
    context: &RequestContext,
    expires: Option<&str>,
    now: DateTime<Utc>,
) -> Option<String> {
    let expires = expires.map(str::trim).filter(|e| !e.is_empty())?;

    let expiry = match NaiveDateTime::parse_from_str(expires, EXPIRY_FORMAT) {
        Ok(expiry) => expiry,
        Err(err) => {
            tracing::warn!(
                target: "cert_verify::expiry",
                trace_id = %context.trace_id,
                expires,
                error = %err,
                "Could not parse expiry date, skipping expiry check"
            );
            return None;
        }
    };

    let now = now.format(EXPIRY_FORMAT).to_string();
    let now = NaiveDateTime::parse_from_str(&now, EXPIRY_FORMAT).ok()?;

    (expiry < now).then(|| EXPIRED_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context() -> RequestContext {
        RequestContext::new("trace-expiry", "verifyCertificate")
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn past_expiry_is_a_finding() {
        assert_eq!(
            check_expiry_at(&context(), Some("2024-06-01T11:59:59Z"), noon()),
            Some(EXPIRED_MESSAGE.to_string())
        );
    }

    #[test]
    fn future_or_equal_expiry_is_fine() {
        assert_eq!(
            check_expiry_at(&context(), Some("2024-06-01T12:00:01Z"), noon()),
            None
        );
        assert_eq!(
            check_expiry_at(&context(), Some("2024-06-01T12:00:00Z"), noon()),
            None
        );
    }

    #[test]
    fn comparison_ignores_sub_second_part_of_now() {
        let now = noon() + chrono::Duration::milliseconds(999);
        assert_eq!(
            check_expiry_at(&context(), Some("2024-06-01T12:00:00Z"), now),
            None
        );
    }

    #[test]
    fn absent_blank_and_malformed_are_not_findings() {
        for expires in [None, Some(""), Some("   "), Some("next tuesday"), Some("2020-01-01")] {
            assert_eq!(check_expiry_at(&context(), expires, noon()), None);
        }
    }

    #[test]
    fn uses_wall_clock_by_default() {
        assert!(check_expiry(&context(), Some("2000-01-01T00:00:00Z")).is_some());
        assert!(check_expiry(&context(), Some("2999-01-01T00:00:00Z")).is_none());
    }
}
