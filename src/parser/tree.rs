//! Generic XML to tree conversion.
//!
//! Follows the usual dict-style convention: a text-only element becomes a
//! [`Node::Scalar`], an element with attributes or children becomes a
//! [`Node::Map`], and repeated sibling tags collapse into a [`Node::List`].
//! A tag that occurs once stays bare, so consumers that expect repetition
//! must normalize with [`Node::as_list`].

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::ParseError;

/// Attribute keys are stored with this prefix inside a [`Node::Map`].
pub const ATTR_PREFIX: char = '@';
/// Key for character data of an element that also has attributes or children.
pub const TEXT_KEY: &str = "#text";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(String),
    List(Vec<Node>),
    Map(HashMap<String, Node>),
}

impl Node {
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Node>> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Views the node as a sequence: a list yields its items, anything else
    /// is a singleton.
    pub fn as_list(&self) -> Vec<&Node> {
        match self {
            Node::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}

struct Frame {
    name: String,
    children: HashMap<String, Node>,
    text: String,
    has_attrs: bool,
}

impl Frame {
    fn open(start: &BytesStart) -> Result<Self, ParseError> {
        let mut frame = Frame {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            children: HashMap::new(),
            text: String::new(),
            has_attrs: false,
        };

        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
            let key = format!(
                "{ATTR_PREFIX}{}",
                String::from_utf8_lossy(attr.key.local_name().as_ref())
            );
            let value = attr.unescape_value()?.into_owned();
            frame.children.insert(key, Node::Scalar(value));
            frame.has_attrs = true;
        }

        Ok(frame)
    }

    fn close(mut self) -> (String, Node) {
        let text = self.text.trim().to_string();
        if self.children.is_empty() && !self.has_attrs {
            return (self.name, Node::Scalar(text));
        }
        if !text.is_empty() {
            self.children.insert(TEXT_KEY.to_string(), Node::Scalar(text));
        }
        (self.name, Node::Map(self.children))
    }
}

fn insert_child(children: &mut HashMap<String, Node>, name: String, node: Node) {
    match children.remove(&name) {
        None => {
            children.insert(name, node);
        }
        Some(Node::List(mut items)) => {
            items.push(node);
            children.insert(name, Node::List(items));
        }
        Some(existing) => {
            children.insert(name, Node::List(vec![existing, node]));
        }
    }
}

/// Parses an XML document into a tree whose top level is a map holding the
/// root element under its own name.
pub fn parse_tree(xml: &str) -> Result<Node, ParseError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Frame> = Vec::new();
    let mut document: HashMap<String, Node> = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (name, node) = Frame::open(&start)?.close();
                attach(&mut stack, &mut document, name, node)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| ParseError::Structure("unbalanced closing tag".into()))?;
                let (name, node) = frame.close();
                attach(&mut stack, &mut document, name, node)?;
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Structure(format!(
            "document ended inside <{}>",
            open.name
        )));
    }
    if document.is_empty() {
        return Err(ParseError::Structure("no root element".into()));
    }

    Ok(Node::Map(document))
}

fn attach(
    stack: &mut [Frame],
    document: &mut HashMap<String, Node>,
    name: String,
    node: Node,
) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => insert_child(&mut parent.children, name, node),
        None => {
            if !document.is_empty() {
                return Err(ParseError::Structure("multiple root elements".into()));
            }
            document.insert(name, node);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_element_is_scalar() {
        let tree = parse_tree("<a><b>hello</b></a>").unwrap();
        let b = tree.get("a").and_then(|a| a.get("b")).unwrap();
        assert_eq!(b.as_scalar(), Some("hello"));
    }

    #[test]
    fn test_single_child_stays_bare_map() {
        let tree = parse_tree("<a><item><x>1</x></item></a>").unwrap();
        let item = tree.get("a").and_then(|a| a.get("item")).unwrap();
        assert!(matches!(item, Node::Map(_)));
        assert_eq!(item.as_list().len(), 1);
    }

    #[test]
    fn test_repeated_siblings_collapse_into_list() {
        let tree = parse_tree("<a><item><x>1</x></item><item><x>2</x></item><item><x>3</x></item></a>")
            .unwrap();
        let item = tree.get("a").and_then(|a| a.get("item")).unwrap();
        let items = item.as_list();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].get("x").and_then(Node::as_scalar), Some("3"));
    }

    #[test]
    fn test_attributes_and_text() {
        let tree = parse_tree(r#"<a xmlns="urn:x"><b unit="s">42</b></a>"#).unwrap();
        let a = tree.get("a").unwrap();
        assert_eq!(a.get("@xmlns").and_then(Node::as_scalar), Some("urn:x"));
        let b = a.get("b").unwrap();
        assert_eq!(b.get("@unit").and_then(Node::as_scalar), Some("s"));
        assert_eq!(b.get(TEXT_KEY).and_then(Node::as_scalar), Some("42"));
    }

    #[test]
    fn test_namespace_prefix_is_dropped() {
        let tree = parse_tree(r#"<tmi8:a xmlns:tmi8="urn:x"><tmi8:b>1</tmi8:b></tmi8:a>"#).unwrap();
        assert_eq!(
            tree.get("a").and_then(|a| a.get("b")).and_then(Node::as_scalar),
            Some("1")
        );
    }

    #[test]
    fn test_empty_element_is_empty_scalar() {
        let tree = parse_tree("<a><b/></a>").unwrap();
        assert_eq!(
            tree.get("a").and_then(|a| a.get("b")).and_then(Node::as_scalar),
            Some("")
        );
    }

    #[test]
    fn test_escaped_text_is_unescaped() {
        let tree = parse_tree("<a>R&amp;D</a>").unwrap();
        assert_eq!(tree.get("a").and_then(Node::as_scalar), Some("R&D"));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(parse_tree("<a><b></a>").is_err());
    }

    #[test]
    fn test_unclosed_document_fails() {
        assert!(parse_tree("<a><b>1</b>").is_err());
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(parse_tree("").is_err());
    }
}
