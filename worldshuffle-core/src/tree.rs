/// A node in a loaded document. Both the text and binary document codecs
/// decode into this shape so the locator and rewriters only deal with one
/// tree type.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Container(Container),
    Sequence(Sequence),
    Scalar(Scalar),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    // Numbers from text documents keep their original representation.
    Number(serde_json::Number),
    String(String),
    ByteArray(Vec<i8>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Byte(_) => "byte",
            Scalar::Short(_) => "short",
            Scalar::Int(_) => "int",
            Scalar::Long(_) => "long",
            Scalar::Float(_) => "float",
            Scalar::Double(_) => "double",
            Scalar::Number(_) => "number",
            Scalar::String(_) => "string",
            Scalar::ByteArray(_) => "byte array",
            Scalar::IntArray(_) => "int array",
            Scalar::LongArray(_) => "long array",
        }
    }
}

/// Keyed children in insertion order. Keys are unique; inserting an
/// existing key replaces the value without moving it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    entries: Vec<(String, Node)>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns the previous value when the key was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Node)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Node)> for Container {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        let mut container = Container::new();
        for (k, v) in iter {
            container.insert(k, v);
        }
        container
    }
}

/// Ordered children. `element_tag` is only meaningful to the binary codec,
/// which needs a tag id for empty lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    pub items: Vec<Node>,
    pub element_tag: u8,
}

impl Sequence {
    pub fn new(items: Vec<Node>) -> Self {
        Self {
            items,
            element_tag: 0,
        }
    }
}

impl Node {
    pub fn string(s: impl Into<String>) -> Node {
        Node::Scalar(Scalar::String(s.into()))
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => s.as_str(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Container(_) => "container",
            Node::Sequence(_) => "sequence",
            Node::Scalar(s) => s.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut c = Container::new();
        c.insert("a", Node::string("1"));
        c.insert("b", Node::string("2"));
        let old = c.insert("a", Node::string("3"));

        assert_eq!(old, Some(Node::string("1")));
        let keys: Vec<&str> = c.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(c.get("a").and_then(Node::as_str), Some("3"));
    }

    #[test]
    fn only_strings_expose_as_str() {
        assert_eq!(Node::string("x").as_str(), Some("x"));
        assert_eq!(Node::Scalar(Scalar::Int(3)).as_str(), None);
        assert_eq!(Node::Sequence(Sequence::default()).as_str(), None);
    }
}
