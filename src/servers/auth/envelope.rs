//! Legacy SOAP envelope codec
//!
//! Parses incoming envelopes into an operation name plus flat parameters and
//! renders responses and faults in the shape the original client expects.
//! Nothing outside this module touches XML.

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Namespace the legacy client sends and expects back.
pub const SERVICE_NS: &str = "http://gamespy.net/AuthService";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("missing SOAP body")]
    NoBody,

    #[error("empty SOAP body")]
    NoOperation,
}

/// The first element inside the SOAP body, with its direct children flattened
/// to (name, text) pairs.
#[derive(Debug, Clone)]
pub struct SoapOperation {
    pub name: String,
    params: Vec<(String, String)>,
}

impl SoapOperation {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Pull the operation out of a raw envelope. Namespace prefixes are ignored;
/// element local names decide the structure.
pub fn extract_operation(xml: &str) -> Result<SoapOperation, EnvelopeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut saw_body = false;
    let mut in_body = false;
    let mut op: Option<SoapOperation> = None;
    let mut current_param: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Err(e) => return Err(EnvelopeError::Xml(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match depth {
                    2 if name == "Body" => {
                        saw_body = true;
                        in_body = true;
                    }
                    3 if in_body && op.is_none() => {
                        op = Some(SoapOperation {
                            name,
                            params: Vec::new(),
                        });
                    }
                    4 if in_body && current_param.is_none() => {
                        current_param = Some((name, String::new()));
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if depth == 2 && in_body && op.is_none() {
                    op = Some(SoapOperation {
                        name,
                        params: Vec::new(),
                    });
                } else if depth == 3 && in_body {
                    if let Some(o) = op.as_mut() {
                        o.params.push((name, String::new()));
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, v)) = current_param.as_mut() {
                    let txt = t.unescape().map_err(|e| EnvelopeError::Xml(e.to_string()))?;
                    v.push_str(&txt);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((_, v)) = current_param.as_mut() {
                    v.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if depth == 4 {
                    if let (Some(param), Some(o)) = (current_param.take(), op.as_mut()) {
                        o.params.push(param);
                    }
                } else if depth == 2 {
                    in_body = false;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(_) => {}
        }
    }

    if !saw_body {
        return Err(EnvelopeError::NoBody);
    }
    op.ok_or(EnvelopeError::NoOperation)
}

/// Wrap a rendered body fragment in the envelope, with XML declaration.
pub fn wrap_envelope(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <soap:Body>{body}</soap:Body></soap:Envelope>"
    )
}

/// Render `<{op}Response>` with the `<{op}Result>` element first, then the
/// given fields in order.
pub fn build_response(op: &str, result: &str, fields: &[(&str, &str)]) -> String {
    let mut out = format!(
        "<{op}Response xmlns=\"{SERVICE_NS}\"><{op}Result>{}</{op}Result>",
        escape(result)
    );
    for (name, value) in fields {
        out.push_str(&format!("<{name}>{}</{name}>", escape(*value)));
    }
    out.push_str(&format!("</{op}Response>"));
    out
}

/// Render a complete fault envelope. `faultcode` is the bare side
/// ("Client"/"Server"); the soap prefix is added here.
pub fn build_fault(faultcode: &str, faultstring: &str) -> String {
    wrap_envelope(&format!(
        "<soap:Fault><faultcode>soap:{faultcode}</faultcode>\
         <faultstring>{}</faultstring></soap:Fault>",
        escape(faultstring)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_ENVELOPE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <Login xmlns="http://gamespy.net/AuthService">
      <Username>alice</Username>
      <Password>S3cret!&amp;more</Password>
    </Login>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    #[test]
    fn test_extract_login_operation() {
        let op = extract_operation(LOGIN_ENVELOPE).unwrap();
        assert_eq!(op.name, "Login");
        assert_eq!(op.param("Username"), Some("alice"));
        // entity references come back unescaped
        assert_eq!(op.param("Password"), Some("S3cret!&more"));
        assert_eq!(op.param("Token"), None);
    }

    #[test]
    fn test_extract_tolerates_prefixed_operation() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
            <s:Header><s:Action>ignored</s:Action></s:Header>
            <s:Body><ns:Logout xmlns:ns="urn:x"><ns:Token>abc</ns:Token></ns:Logout></s:Body>
        </s:Envelope>"#;
        let op = extract_operation(xml).unwrap();
        assert_eq!(op.name, "Logout");
        assert_eq!(op.param("Token"), Some("abc"));
    }

    #[test]
    fn test_empty_param_element() {
        let xml = r#"<e:Envelope xmlns:e="ns"><e:Body><Login><Username/></Login></e:Body></e:Envelope>"#;
        let op = extract_operation(xml).unwrap();
        assert_eq!(op.param("Username"), Some(""));
    }

    #[test]
    fn test_missing_body_rejected() {
        let xml = r#"<Envelope><Header/></Envelope>"#;
        let err = extract_operation(xml).unwrap_err();
        assert!(matches!(err, EnvelopeError::NoBody));
    }

    #[test]
    fn test_empty_body_rejected() {
        let xml = r#"<Envelope><Body></Body></Envelope>"#;
        let err = extract_operation(xml).unwrap_err();
        assert!(matches!(err, EnvelopeError::NoOperation));
    }

    #[test]
    fn test_bad_entity_rejected() {
        let xml = "<Envelope><Body><Login><Username>&nosuch;</Username></Login></Body></Envelope>";
        let err = extract_operation(xml).unwrap_err();
        assert!(matches!(err, EnvelopeError::Xml(_)));
    }

    #[test]
    fn test_plain_garbage_rejected() {
        assert!(extract_operation("this is not xml at all").is_err());
    }

    #[test]
    fn test_build_response_escapes_values() {
        let xml = build_response("Login", "Success", &[("Token", "a<b&c")]);
        assert!(xml.starts_with("<LoginResponse"));
        assert!(xml.contains("<LoginResult>Success</LoginResult>"));
        assert!(xml.contains("<Token>a&lt;b&amp;c</Token>"));
        assert!(!xml.contains("a<b"));
    }

    #[test]
    fn test_build_fault_shape() {
        let xml = build_fault("Client", "Invalid username or password");
        assert!(xml.contains("<soap:Fault>"));
        assert!(xml.contains("<faultcode>soap:Client</faultcode>"));
        assert!(xml.contains("Invalid username or password"));
        assert!(xml.starts_with("<?xml"));
    }
}
