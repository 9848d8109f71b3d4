use http::StatusCode;

use crate::error::{Error, Result};

/// Parses `"204"`, `"No Content"` or `"no content"` into a status code.
pub fn parse_status(input: &str) -> Result<u16> {
    let input = input.trim();
    if let Ok(code) = input.parse::<u16>() {
        return StatusCode::from_u16(code)
            .map(|status| status.as_u16())
            .map_err(|err| Error::InvalidStep(format!("invalid status `{input}`: {err}")));
    }

    (100u16..600)
        .filter_map(|code| StatusCode::from_u16(code).ok())
        .find(|status| {
            status
                .canonical_reason()
                .is_some_and(|reason| reason.eq_ignore_ascii_case(input))
        })
        .map(|status| status.as_u16())
        .ok_or_else(|| Error::InvalidStep(format!("unknown status `{input}`")))
}

/// Renders a status as `204 (No Content)`.
pub fn describe_status(code: u16) -> String {
    let reason = StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown");
    format!("{code} ({reason})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_reasons() {
        assert_eq!(parse_status("204").unwrap(), 204);
        assert_eq!(parse_status("No Content").unwrap(), 204);
        assert_eq!(parse_status("not found").unwrap(), 404);
        assert_eq!(parse_status("OK").unwrap(), 200);
        assert!(parse_status("Teapotish").is_err());
        assert!(parse_status("42").is_err());
    }

    #[test]
    fn describes_known_and_unknown() {
        assert_eq!(describe_status(404), "404 (Not Found)");
        assert_eq!(describe_status(599), "599 (Unknown)");
    }
}
