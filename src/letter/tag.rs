//! Minimal attributed tag tree with an XML text form.
//!
//! Supports exactly what letters need: elements, attributes, text content,
//! nesting, self-closing tags, comments and a leading `<?xml ...?>`
//! declaration. No namespaces, no CDATA, no DTDs.

use crate::error::{Error, Result};

/// Nesting limit when parsing untrusted input
const MAX_DEPTH: usize = 32;

/// One element of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Tag>,
}

impl Tag {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Element with text content and no attributes
    pub(crate) fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut tag = Self::new(name);
        tag.text = text.into();
        tag
    }

    pub(crate) fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    pub(crate) fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub(crate) fn add_child(&mut self, child: Tag) {
        self.children.push(child);
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Text content with surrounding whitespace removed
    pub(crate) fn text(&self) -> &str {
        self.text.trim()
    }

    pub(crate) fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> {
        self.children.iter().filter(move |child| child.name == name)
    }

    // ========================================================================
    // OUTPUT
    // ========================================================================

    /// Serialize as XML text; text content goes on its own lines
    pub(crate) fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }

        if self.text.is_empty() && self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }

        out.push_str(">\n");
        if !self.text.is_empty() {
            escape_into(&self.text, false, out);
            if !self.text.ends_with('\n') {
                out.push('\n');
            }
        }
        for child in &self.children {
            child.write(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push_str(">\n");
    }

    // ========================================================================
    // PARSING
    // ========================================================================

    /// Parse a document containing exactly one root element
    pub(crate) fn parse(input: &str) -> Result<Tag> {
        let mut parser = Parser { input, pos: 0 };
        parser.skip_misc()?;
        let root = parser.element(0)?;
        parser.skip_misc()?;

        if parser.pos != input.len() {
            return Err(malformed("trailing content after root element"));
        }
        Ok(root)
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedEnvelope(reason.into())
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| malformed("unterminated entity"))?;
        let entity = &after[..semi];

        let c = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| malformed(format!("unknown entity &{};", entity)))?
            }
        };
        out.push(c);
        rest = &after[semi + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        let input: &'a str = self.input;
        &input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Skip `terminator`-delimited content, consuming the terminator
    fn skip_past(&mut self, terminator: &str) -> Result<()> {
        let end = self
            .rest()
            .find(terminator)
            .ok_or_else(|| malformed(format!("missing '{}'", terminator)))?;
        self.pos += end + terminator.len();
        Ok(())
    }

    /// Skip whitespace, comments and declarations between elements
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("<?") {
                self.skip_past("?>")?;
            } else if self.rest().starts_with("<!--") {
                self.skip_past("-->")?;
            } else {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(malformed(format!("expected '{}' at offset {}", token, self.pos)))
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '=' | '<'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(malformed(format!("expected a name at offset {}", self.pos)));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn attribute_value(&mut self) -> Result<String> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(malformed("attribute value must be quoted")),
        };
        self.pos += 1;

        let rest = self.rest();
        let end = rest
            .find(quote)
            .ok_or_else(|| malformed("unterminated attribute value"))?;
        self.pos += end + 1;
        unescape(&rest[..end])
    }

    fn element(&mut self, depth: usize) -> Result<Tag> {
        if depth >= MAX_DEPTH {
            return Err(malformed("elements nested too deeply"));
        }

        self.expect("<")?;
        let mut tag = Tag::new(self.name()?);

        // Attributes
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(tag);
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }

            let key = self.name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let value = self.attribute_value()?;

            if tag.attribute(key).is_some() {
                return Err(malformed(format!("duplicate attribute '{}'", key)));
            }
            tag.add_attribute(key, value);
        }

        // Content
        loop {
            let rest = self.rest();
            let lt = rest
                .find('<')
                .ok_or_else(|| malformed(format!("unclosed element <{}>", tag.name)))?;
            tag.text.push_str(&unescape(&rest[..lt])?);
            self.pos += lt;

            if self.rest().starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != tag.name {
                    return Err(malformed(format!(
                        "mismatched closing tag </{}> for <{}>",
                        closing, tag.name
                    )));
                }
                self.skip_whitespace();
                self.expect(">")?;
                return Ok(tag);
            } else if self.rest().starts_with("<!--") {
                self.skip_past("-->")?;
            } else {
                let child = self.element(depth + 1)?;
                tag.children.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_parse() {
        let mut root = Tag::new("letter");
        root.add_attribute("mode", "aes-256-gcm");
        root.add_attribute("ephemeralkey", "");
        root.add_child(Tag::with_text("ciphertext", "QUJD\nREVG"));
        let mut child = Tag::new("sessionkey");
        child.add_attribute("algo", "a<b & \"c\"");
        child.set_text("blob");
        root.add_child(child);

        let parsed = Tag::parse(&root.to_xml()).unwrap();
        assert_eq!(parsed.name(), "letter");
        assert_eq!(parsed.attribute("ephemeralkey"), Some(""));
        assert_eq!(parsed.children_named("ciphertext").next().unwrap().text(), "QUJD\nREVG");
        assert_eq!(
            parsed.children_named("sessionkey").next().unwrap().attribute("algo"),
            Some("a<b & \"c\"")
        );
    }

    #[test]
    fn test_parse_declaration_comments_self_closing() {
        let doc = concat!(
            "<?xml version=\"1.0\"?>\n",
            "<!-- note -->\n",
            "<root a='1'>\n",
            "  <empty/>\n",
            "  <!-- inner -->\n",
            "  <t>x &amp; y &#65;</t>\n",
            "</root>\n"
        );
        let root = Tag::parse(doc).unwrap();

        assert_eq!(root.attribute("a"), Some("1"));
        assert_eq!(root.children_named("empty").count(), 1);
        assert_eq!(root.children_named("t").next().unwrap().text(), "x & y A");
    }

    #[test]
    fn test_parse_rejects_broken_documents() {
        for doc in [
            "",
            "just text",
            "<a>",
            "<a></b>",
            "<a x=1></a>",
            "<a x=\"1\" x=\"2\"></a>",
            "<a>&bogus;</a>",
            "<a></a><b></b>",
        ] {
            assert!(
                matches!(Tag::parse(doc), Err(Error::MalformedEnvelope(_))),
                "accepted {:?}",
                doc
            );
        }
    }

    #[test]
    fn test_depth_limit() {
        let doc = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(Tag::parse(&doc).is_err());
    }
}
