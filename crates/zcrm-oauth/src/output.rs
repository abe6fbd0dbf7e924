//! Result writing: pretty-print the accounts server's payload and persist it.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

/// Re-serialize the token payload with four-space indentation.
///
/// Field order is the accounts server's own: the JSON map keeps insertion
/// order, so the formatted text mirrors the response body.
pub fn format_token_payload(body: &str) -> Result<String> {
    let payload: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| Error::Output(format!("the response body is not valid JSON: {err}")))?;

    let mut formatted = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(
        &mut formatted,
        serde_json::ser::PrettyFormatter::with_indent(b"    "),
    );
    payload
        .serialize(&mut serializer)
        .map_err(|err| Error::Output(format!("could not format the token payload: {err}")))?;
    String::from_utf8(formatted)
        .map_err(|err| Error::Output(format!("could not format the token payload: {err}")))
}

/// Format the payload and write it to `path`.
///
/// Nothing is written when the body does not parse. The formatted text is
/// handed back so the caller can echo it.
pub fn write_result(body: &str, path: &Path) -> Result<String> {
    let formatted = format_token_payload(body)?;
    fs::write(path, &formatted)
        .map_err(|err| Error::Output(format!("could not write {}: {err}", path.display())))?;
    tracing::debug!(path = %path.display(), bytes = formatted.len(), "result written");
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_four_space_indentation() {
        let formatted = format_token_payload(r#"{"access_token":"x","refresh_token":"y"}"#)
            .expect("valid body");
        assert_eq!(
            formatted,
            "{\n    \"access_token\": \"x\",\n    \"refresh_token\": \"y\"\n}"
        );
    }

    #[test]
    fn keeps_the_accounts_server_field_order() {
        let formatted =
            format_token_payload(r#"{"refresh_token":"y","access_token":"x","expires_in":3600}"#)
                .expect("valid body");
        let refresh = formatted.find("refresh_token").expect("refresh_token");
        let access = formatted.find("access_token").expect("access_token");
        let expires = formatted.find("expires_in").expect("expires_in");
        assert!(refresh < access && access < expires);
    }

    #[test]
    fn nested_values_indent_one_level_deeper() {
        let formatted = format_token_payload(r#"{"token":{"value":"x"}}"#).expect("valid body");
        assert_eq!(
            formatted,
            "{\n    \"token\": {\n        \"value\": \"x\"\n    }\n}"
        );
    }

    #[test]
    fn writes_the_formatted_payload_and_echoes_it_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.json");
        let formatted = write_result(r#"{"access_token":"x"}"#, &path).expect("write");
        assert_eq!(fs::read_to_string(&path).expect("readable"), formatted);
    }

    #[test]
    fn bodies_that_are_not_json_leave_no_file_behind() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.json");
        let err = write_result("<html>bad gateway</html>", &path).expect_err("not JSON");
        assert!(matches!(err, Error::Output(_)));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_destinations_are_output_errors() {
        let err = write_result(r#"{"access_token":"x"}"#, Path::new("/no/such/dir/out.json"))
            .expect_err("missing directory");
        assert!(matches!(err, Error::Output(_)));
    }
}
