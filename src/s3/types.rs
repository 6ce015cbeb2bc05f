//! S3 response bodies the benchmark inspects

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// `<Error>` document returned with non-2xx statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code, e.g. `BucketAlreadyOwnedByYou`
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    /// Parse an S3 XML error document.
    ///
    /// Returns `None` when the body is not XML or carries no `<Code>`.
    pub fn parse(xml_data: &[u8]) -> Option<Self> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut body = ErrorBody::default();
        let mut current_text = String::with_capacity(128);

        loop {
            match reader.read_event() {
                Ok(Event::Text(e)) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape().ok()?);
                }
                Ok(Event::End(e)) => {
                    match e.local_name().as_ref() {
                        b"Code" => body.code = std::mem::take(&mut current_text),
                        b"Message" => body.message = std::mem::take(&mut current_text),
                        _ => {}
                    }
                    current_text.clear();
                }
                Ok(Event::Eof) => break,
                Err(_) => return None,
                _ => {}
            }
        }

        if body.code.is_empty() {
            None
        } else {
            Some(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_body() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AccessDenied</Code>
  <Message>Access Denied.</Message>
  <Resource>/benchbucket</Resource>
</Error>"#;
        let body = ErrorBody::parse(xml).unwrap();
        assert_eq!(body.code, "AccessDenied");
        assert_eq!(body.message, "Access Denied.");
    }

    #[test]
    fn test_parse_non_xml_body() {
        assert_eq!(ErrorBody::parse(b"connection refused"), None);
        assert_eq!(ErrorBody::parse(b""), None);
        assert_eq!(ErrorBody::parse(b"<Other><Thing>1</Thing></Other>"), None);
    }
}
