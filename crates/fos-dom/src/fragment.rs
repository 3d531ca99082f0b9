//! Markup fragments
//!
//! A small HTML-subset reader for building subtrees from markup: elements,
//! quoted/unquoted/bare attributes, text, comments, void elements and the
//! common character references. Whitespace-only text is dropped.

use crate::{Document, DomError, NodeId};

/// Fragment parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FragmentError {
    #[error("Unexpected end of markup at byte {0}")]
    UnexpectedEof(usize),

    #[error("Unexpected closing tag: {tag}")]
    UnexpectedClose { tag: String },

    #[error("Unclosed tag: {tag}")]
    UnclosedTag { tag: String },

    #[error("Invalid tag name at byte {0}")]
    InvalidTagName(usize),

    #[error(transparent)]
    Dom(#[from] DomError),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

impl Document {
    /// Parse `markup` and append the resulting nodes to `parent`.
    ///
    /// The subtree is assembled detached and attached one top-level node at a
    /// time, so observers see one child-list record per top-level node.
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>, FragmentError> {
        if !self.contains(parent) {
            return Err(DomError::NotFound.into());
        }
        let top = FragmentReader::new(self, markup).read()?;
        for &node in &top {
            self.append_child(parent, node)?;
        }
        Ok(top)
    }
}

struct FragmentReader<'a> {
    doc: &'a mut Document,
    src: &'a str,
    pos: usize,
    /// Open elements (id, tag)
    stack: Vec<(NodeId, String)>,
    top: Vec<NodeId>,
}

impl<'a> FragmentReader<'a> {
    fn new(doc: &'a mut Document, src: &'a str) -> Self {
        Self { doc, src, pos: 0, stack: Vec::new(), top: Vec::new() }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn read(mut self) -> Result<Vec<NodeId>, FragmentError> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if let Some(body) = rest.strip_prefix("<!--") {
                let end = body.find("-->").ok_or(FragmentError::UnexpectedEof(self.src.len()))?;
                let node = self.doc.tree.create_comment(&body[..end]);
                self.attach(node)?;
                self.pos += 4 + end + 3;
            } else if rest.starts_with("</") {
                self.read_close_tag()?;
            } else if rest.starts_with('<') {
                self.read_open_tag()?;
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = &rest[..end];
                if !text.trim().is_empty() {
                    let node = self.doc.tree.create_text(&decode_entities(text));
                    self.attach(node)?;
                }
                self.pos += end;
            }
        }
        if let Some((_, tag)) = self.stack.pop() {
            return Err(FragmentError::UnclosedTag { tag });
        }
        Ok(self.top)
    }

    fn attach(&mut self, node: NodeId) -> Result<(), FragmentError> {
        match self.stack.last() {
            Some(&(parent, _)) => self.doc.tree.append_child(parent, node)?,
            None => self.top.push(node),
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn read_name(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_ascii_whitespace() || matches!(c, '=' | '/' | '>'))
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn read_close_tag(&mut self) -> Result<(), FragmentError> {
        self.pos += 2;
        let name = self.read_name().to_ascii_lowercase();
        self.skip_whitespace();
        if !self.rest().starts_with('>') {
            return Err(FragmentError::UnexpectedEof(self.pos));
        }
        self.pos += 1;
        match self.stack.pop() {
            Some((_, open)) if open == name => Ok(()),
            _ => Err(FragmentError::UnexpectedClose { tag: name }),
        }
    }

    fn read_open_tag(&mut self) -> Result<(), FragmentError> {
        let start = self.pos;
        self.pos += 1;
        let tag = self.read_name().to_ascii_lowercase();
        if tag.is_empty() || !tag.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(FragmentError::InvalidTagName(start));
        }
        let node = self.doc.tree.create_element(&tag);

        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(FragmentError::UnexpectedEof(self.pos));
            }
            if let Some(after) = rest.strip_prefix("/>") {
                self.pos = self.src.len() - after.len();
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            if rest.starts_with('/') {
                self.pos += 1;
                continue;
            }

            let name = self.read_name().to_ascii_lowercase();
            if name.is_empty() {
                return Err(FragmentError::UnexpectedEof(self.pos));
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                self.read_attr_value()?
            } else {
                String::new()
            };
            if let Some(element) = self.doc.tree.get_mut(node).and_then(|n| n.as_element_mut()) {
                element.set_attr(&name, &value);
            }
        };

        self.attach(node)?;
        if !self_closing && !VOID_ELEMENTS.contains(&tag.as_str()) {
            self.stack.push((node, tag));
        }
        Ok(())
    }

    fn read_attr_value(&mut self) -> Result<String, FragmentError> {
        let rest = self.rest();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'');
        let raw = match quote {
            Some(q) => {
                let end = rest[1..].find(q).ok_or(FragmentError::UnexpectedEof(self.src.len()))?;
                self.pos += end + 2;
                &rest[1..end + 1]
            }
            None => {
                let end = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                self.pos += end;
                &rest[..end]
            }
        };
        Ok(decode_entities(raw))
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_markup() {
        let mut doc = Document::default();
        let body = doc.body();
        let top = doc.append_markup(body, r#"
            <div data-controller="hello">
              <input data-hello-target="name" value="Ada">
              <button data-action="click->hello#greet" disabled>Greet</button>
              <!-- note -->
            </div>
            <p class=plain>Tom &amp; Jerry</p>
        "#).unwrap();

        assert_eq!(top.len(), 2);
        let div = top[0];
        assert_eq!(doc.get_attribute(div, "data-controller"), Some("hello"));
        let children: Vec<_> = doc.tree().children(div).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(doc.tag_name(children[0]), Some("input"));
        assert_eq!(doc.get_attribute(children[0], "value"), Some("Ada"));
        assert_eq!(doc.get_attribute(children[1], "disabled"), Some(""));
        assert_eq!(doc.text_content(children[1]), "Greet");
        assert_eq!(doc.get_attribute(top[1], "class"), Some("plain"));
        assert_eq!(doc.text_content(top[1]), "Tom & Jerry");
    }

    #[test]
    fn test_self_closing_and_errors() {
        let mut doc = Document::default();
        let body = doc.body();
        let top = doc.append_markup(body, "<span/><br><i>x</i>").unwrap();
        assert_eq!(top.len(), 3);

        assert_eq!(
            doc.append_markup(body, "<div><span></div>"),
            Err(FragmentError::UnexpectedClose { tag: "div".to_string() })
        );
        assert_eq!(
            doc.append_markup(body, "<div>"),
            Err(FragmentError::UnclosedTag { tag: "div".to_string() })
        );
    }
}
