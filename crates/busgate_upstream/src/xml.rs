//! XML → JSON conversion for feed bodies.
//!
//! The output shape is the one produced by the `xml2json` family of converters:
//!
//! - the document becomes `{ "<root>": { ... } }`;
//! - attributes become string members of their element;
//! - child elements become members named after the tag, repeated siblings
//!   are collected into an array in document order;
//! - text content is stored under `"$t"`, unless the element has neither
//!   attributes nor children, in which case the element *is* the string;
//! - empty elements become `{}`.
//!
//! Values are never coerced: numbers in the feed stay strings.

use quick_xml::Reader;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use thiserror::Error;

/// Member holding an element's text content.
pub const TEXT_KEY: &str = "$t";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("invalid xml attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("xml name is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("document ended with unclosed element '{0}'")]
    Unclosed(String),

    #[error("failed to encode json: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Converts an XML document into a JSON string.
pub fn to_json(xml: &str) -> Result<String, XmlError> {
    let value = to_value(xml)?;
    Ok(serde_json::to_string(&value)?)
}

/// Converts an XML document into a JSON value.
pub fn to_value(xml: &str) -> Result<Value, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Element::open(&e)?),
            Event::Empty(e) => {
                let element = Element::open(&e)?;
                close(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                // quick-xml already rejects mismatched end tags.
                let Some(element) = stack.pop() else {
                    return Err(XmlError::NoRoot);
                };
                close(element, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(std::str::from_utf8(&c.into_inner())?);
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }

    let (name, value) = root.ok_or(XmlError::NoRoot)?;
    let mut doc = Map::new();
    doc.insert(name, value);
    Ok(Value::Object(doc))
}

fn close(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<(String, Value)>,
) -> Result<(), XmlError> {
    let (name, value) = element.finish();
    match stack.last_mut() {
        Some(parent) => parent.push_child(name, value),
        None => {
            if root.is_some() {
                return Err(XmlError::MultipleRoots);
            }
            *root = Some((name, value));
        }
    }
    Ok(())
}

struct Element {
    name: String,
    members: Map<String, Value>,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let name = std::str::from_utf8(start.name().as_ref())?.to_string();
        let mut members = Map::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            members.insert(key, Value::String(value));
        }
        Ok(Self {
            name,
            members,
            text: String::new(),
        })
    }

    fn push_child(&mut self, name: String, value: Value) {
        match self.members.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.members.insert(name, value);
            }
        }
    }

    fn finish(mut self) -> (String, Value) {
        let text = self.text.trim();
        if text.is_empty() {
            return (self.name, Value::Object(self.members));
        }
        if self.members.is_empty() {
            return (self.name, Value::String(text.to_string()));
        }
        self.members
            .insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
        (self.name, Value::Object(self.members))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{XmlError, to_json, to_value};

    #[test]
    fn agency_list_shape() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?>
<body copyright="All data copyright agencies listed below and NextBus Inc 2017.">
<agency tag="actransit" title="AC Transit" regionTitle="California-Northern"/>
<agency tag="sf-muni" title="San Francisco Muni" shortTitle="SF Muni" regionTitle="California-Northern"/>
</body>"#;
        let value = to_value(xml).expect("valid xml");
        assert_eq!(
            value,
            json!({
                "body": {
                    "copyright": "All data copyright agencies listed below and NextBus Inc 2017.",
                    "agency": [
                        {"tag": "actransit", "title": "AC Transit", "regionTitle": "California-Northern"},
                        {"tag": "sf-muni", "title": "San Francisco Muni", "shortTitle": "SF Muni", "regionTitle": "California-Northern"}
                    ]
                }
            })
        );
    }

    #[test]
    fn single_child_is_not_wrapped_in_array() {
        let value = to_value(r#"<body><route tag="N" title="N-Judah"/></body>"#).unwrap();
        assert_eq!(value, json!({"body": {"route": {"tag": "N", "title": "N-Judah"}}}));
    }

    #[test]
    fn text_only_element_becomes_string() {
        let value = to_value(r#"<body><message><text>Detour on Market</text></message></body>"#)
            .unwrap();
        assert_eq!(value, json!({"body": {"message": {"text": "Detour on Market"}}}));
    }

    #[test]
    fn text_with_attributes_goes_under_text_key() {
        let value = to_value(r#"<body><Error shouldRetry="false">  agency parameter "a" must be specified  </Error></body>"#)
            .unwrap();
        assert_eq!(
            value,
            json!({"body": {"Error": {"shouldRetry": "false", "$t": "agency parameter \"a\" must be specified"}}})
        );
    }

    #[test]
    fn entities_and_cdata_are_decoded() {
        let value = to_value(r#"<body><a t="x &amp; y">1 &lt; 2</a><b><![CDATA[<raw>]]></b></body>"#)
            .unwrap();
        assert_eq!(
            value,
            json!({"body": {"a": {"t": "x & y", "$t": "1 < 2"}, "b": "<raw>"}})
        );
    }

    #[test]
    fn empty_root_is_empty_object() {
        assert_eq!(to_json("<body></body>").unwrap(), r#"{"body":{}}"#);
    }

    #[test]
    fn member_order_follows_document() {
        let json = to_json(r#"<body z="1" a="2"><m/><b/></body>"#).unwrap();
        assert_eq!(json, r#"{"body":{"z":"1","a":"2","m":{},"b":{}}}"#);
    }

    #[test]
    fn rejects_non_xml() {
        assert!(matches!(to_value("not xml at all"), Err(XmlError::NoRoot)));
    }

    #[test]
    fn rejects_mismatched_tags() {
        assert!(to_value("<body><a></b></body>").is_err());
    }

    #[test]
    fn rejects_truncated_document() {
        assert!(to_value("<body><a>").is_err());
    }
}
