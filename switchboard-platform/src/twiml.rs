//! TwiML documents for redirecting live call legs.
//!
//! Only the verbs this backend emits are modelled: `<Dial>` to a client,
//! a number or a conference. Attribute values and text are XML-escaped.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Conference options carried on `<Dial><Conference>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceDial {
    pub name: String,
    pub start_conference_on_enter: bool,
    pub end_conference_on_exit: bool,
    pub beep: bool,
    pub wait_url: Option<String>,
}

impl ConferenceDial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_conference_on_enter: true,
            end_conference_on_exit: false,
            beep: false,
            wait_url: None,
        }
    }

    pub fn end_conference_on_exit(mut self, value: bool) -> Self {
        self.end_conference_on_exit = value;
        self
    }

    pub fn beep(mut self, value: bool) -> Self {
        self.beep = value;
        self
    }

    pub fn wait_url(mut self, url: Option<String>) -> Self {
        self.wait_url = url;
        self
    }
}

/// What a `<Dial>` connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    /// Client name without the `client:` scheme.
    Client(String),
    Number(String),
    Conference(ConferenceDial),
}

/// A `<Response>` holding a single `<Dial>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceResponse {
    pub caller_id: Option<String>,
    pub target: DialTarget,
}

impl VoiceResponse {
    pub fn dial(target: DialTarget) -> Self {
        Self {
            caller_id: None,
            target,
        }
    }

    pub fn dial_client(name: impl Into<String>) -> Self {
        Self::dial(DialTarget::Client(name.into()))
    }

    pub fn dial_number(number: impl Into<String>) -> Self {
        Self::dial(DialTarget::Number(number.into()))
    }

    pub fn dial_conference(conference: ConferenceDial) -> Self {
        Self::dial(DialTarget::Conference(conference))
    }

    pub fn caller_id(mut self, caller_id: Option<String>) -> Self {
        self.caller_id = caller_id;
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response><Dial"#);
        if let Some(caller_id) = &self.caller_id {
            push_attr(&mut xml, "callerId", caller_id);
        }
        xml.push('>');

        match &self.target {
            DialTarget::Client(name) => push_element(&mut xml, "Client", "", name),
            DialTarget::Number(number) => push_element(&mut xml, "Number", "", number),
            DialTarget::Conference(conference) => {
                let mut attrs = String::new();
                push_attr(&mut attrs, "startConferenceOnEnter", bool_str(conference.start_conference_on_enter));
                push_attr(&mut attrs, "endConferenceOnExit", bool_str(conference.end_conference_on_exit));
                push_attr(&mut attrs, "beep", bool_str(conference.beep));
                if let Some(url) = &conference.wait_url {
                    push_attr(&mut attrs, "waitUrl", url);
                }
                push_element(&mut xml, "Conference", &attrs, &conference.name);
            }
        }

        xml.push_str("</Dial></Response>");
        xml
    }

    /// Read back the `<Dial>` of a document produced by [`VoiceResponse::to_xml`].
    ///
    /// Returns `None` for malformed documents or ones without a dial target.
    pub fn parse(xml: &str) -> Option<Self> {
        let mut reader = Reader::from_str(xml);
        let mut caller_id = None;
        let mut open: Option<(String, Vec<(String, String)>)> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = element_name(e);
                    let attrs = element_attrs(e);
                    if name == "Dial" {
                        caller_id = attr(&attrs, "callerId").map(str::to_string);
                    } else {
                        open = Some((name, attrs));
                    }
                }
                Ok(Event::Text(ref t)) => {
                    let Some((name, attrs)) = open.take() else {
                        continue;
                    };
                    let text = t.unescape().ok()?.trim().to_string();
                    let target = match name.as_str() {
                        "Client" => DialTarget::Client(text),
                        "Number" => DialTarget::Number(text),
                        "Conference" => DialTarget::Conference(ConferenceDial {
                            name: text,
                            start_conference_on_enter: attr(&attrs, "startConferenceOnEnter") != Some("false"),
                            end_conference_on_exit: attr(&attrs, "endConferenceOnExit") == Some("true"),
                            beep: attr(&attrs, "beep") == Some("true"),
                            wait_url: attr(&attrs, "waitUrl").map(str::to_string),
                        }),
                        _ => continue,
                    };
                    return Some(Self { caller_id, target });
                }
                Ok(Event::Eof) | Err(_) => return None,
                _ => {}
            }
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn push_element(out: &mut String, name: &str, attrs: &str, text: &str) {
    out.push('<');
    out.push_str(name);
    out.push_str(attrs);
    out.push('>');
    out.push_str(&escape(text));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn element_attrs(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .filter_map(Result::ok)
        .filter_map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = a.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_client_document() {
        let xml = VoiceResponse::dial_client("agent:55").to_xml();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Dial><Client>agent:55</Client></Dial></Response>"#
        );
    }

    #[test]
    fn test_conference_attributes_and_escaping() {
        let xml = VoiceResponse::dial_conference(
            ConferenceDial::new("task-WT1")
                .end_conference_on_exit(true)
                .wait_url(Some("https://hold.example/music?a=1&b=2".to_string())),
        )
        .caller_id(Some("+15550001111".to_string()))
        .to_xml();

        assert!(xml.contains(r#"<Dial callerId="+15550001111">"#));
        assert!(xml.contains(r#"endConferenceOnExit="true""#));
        assert!(xml.contains(r#"beep="false""#));
        assert!(xml.contains("a=1&amp;b=2"));
        assert!(xml.contains(">task-WT1</Conference>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = VoiceResponse::dial_client("<script>").to_xml();
        assert!(xml.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_parse_reads_back_conference() {
        let original = VoiceResponse::dial_conference(
            ConferenceDial::new("xfer-CA1 & co").beep(true),
        );
        assert_eq!(VoiceResponse::parse(&original.to_xml()), Some(original));
    }

    #[test]
    fn test_parse_reads_back_number() {
        let original = VoiceResponse::dial_number("+15551234567");
        assert_eq!(VoiceResponse::parse(&original.to_xml()), Some(original));
        assert_eq!(VoiceResponse::parse("<Response><Hangup/></Response>"), None);
        assert_eq!(VoiceResponse::parse("not xml <"), None);
    }
}
