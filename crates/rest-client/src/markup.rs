//! Markup document parsing

use std::io::Read;

use crate::charset;
use crate::error::RestError;

/// Parser turning a response body into a document
pub trait MarkupParser {
    /// Parsed document type
    type Document;

    /// Parse `input`, whose bytes are encoded with `encoding`
    fn parse(&self, input: &mut dyn Read, encoding: &str) -> Result<Self::Document, RestError>;
}

/// XML parser producing an [`xmltree::Element`] tree
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlTreeParser;

impl MarkupParser for XmlTreeParser {
    type Document = xmltree::Element;

    fn parse(&self, input: &mut dyn Read, encoding: &str) -> Result<Self::Document, RestError> {
        if charset::is_utf8(encoding) {
            return xmltree::Element::parse(input).map_err(|e| RestError::Markup(e.to_string()));
        }

        let mut raw = Vec::new();
        input.read_to_end(&mut raw)?;
        let text = charset::decode(&raw, encoding)
            .ok_or_else(|| RestError::Decoding(format!("unsupported markup encoding {}", encoding)))?;

        xmltree::Element::parse(text.as_bytes()).map_err(|e| RestError::Markup(e.to_string()))
    }
}
