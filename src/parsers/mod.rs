pub mod surefire;

use std::io::BufRead;
use std::str;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

use crate::error::TestrsError;

/// Build an XML reader with the settings every report parser uses.
pub(crate) fn xml_reader<R: BufRead>(reader: R) -> Reader<R> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);
    xml
}

/// Wrap a quick-xml error with the byte position the reader stopped at.
pub(crate) fn xml_err<R>(source: quick_xml::Error, xml: &Reader<R>) -> TestrsError {
    TestrsError::Xml {
        source,
        position: xml.buffer_position(),
    }
}

/// Fetch an attribute by local name, unescaped. Malformed attributes are
/// treated as absent.
pub(crate) fn get_attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes().filter_map(|a| a.ok()).find_map(|attr| {
        if attr.key.local_name().as_ref() != name {
            return None;
        }
        attr.unescape_value().ok().map(|v| v.into_owned())
    })
}

/// `true` when the attribute is missing or only whitespace.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub(crate) fn utf8_lossy(bytes: &[u8]) -> String {
    match str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
