use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;

use crate::tree::{Container, Node, Scalar, Sequence};
use crate::Result;

pub fn node_from_value(value: Value) -> Node {
    match value {
        Value::Null => Node::Scalar(Scalar::Null),
        Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
        Value::Number(n) => Node::Scalar(Scalar::Number(n)),
        Value::String(s) => Node::Scalar(Scalar::String(s)),
        Value::Array(items) => {
            Node::Sequence(Sequence::new(items.into_iter().map(node_from_value).collect()))
        }
        Value::Object(map) => Node::Container(
            map.into_iter()
                .map(|(k, v)| (k, node_from_value(v)))
                .collect::<Container>(),
        ),
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

pub fn value_from_node(node: &Node) -> Value {
    match node {
        Node::Container(container) => {
            let mut map = Map::with_capacity(container.iter().count());
            for (key, child) in container.iter() {
                map.insert(key.to_string(), value_from_node(child));
            }
            Value::Object(map)
        }
        Node::Sequence(seq) => Value::Array(seq.items.iter().map(value_from_node).collect()),
        Node::Scalar(scalar) => match scalar {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Byte(v) => Value::from(*v),
            Scalar::Short(v) => Value::from(*v),
            Scalar::Int(v) => Value::from(*v),
            Scalar::Long(v) => Value::from(*v),
            Scalar::Float(v) => float_value(f64::from(*v)),
            Scalar::Double(v) => float_value(*v),
            Scalar::Number(n) => Value::Number(n.clone()),
            Scalar::String(s) => Value::String(s.clone()),
            Scalar::ByteArray(values) => Value::from(values.clone()),
            Scalar::IntArray(values) => Value::from(values.clone()),
            Scalar::LongArray(values) => Value::from(values.clone()),
        },
    }
}

pub fn from_str(text: &str) -> Result<Node> {
    let value: Value = serde_json::from_str(text)?;
    Ok(node_from_value(value))
}

/// Pretty-prints with a two-space indent. Non-ASCII text is written as-is.
pub fn to_string(node: &Node) -> Result<String> {
    Ok(serde_json::to_string_pretty(&value_from_node(node))?)
}

pub fn load(path: &Path) -> Result<Node> {
    let text = fs::read_to_string(path)?;
    from_str(&text)
}

pub fn save(path: &Path, node: &Node) -> Result<()> {
    let text = to_string(node)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_key_order() {
        let text = r#"{"zeta": 1, "alpha": {"Name": "minecraft:stone"}, "mid": [true, null]}"#;
        let node = from_str(text).unwrap();

        let keys: Vec<&str> = node.as_container().unwrap().iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let back = value_from_node(&node);
        let expected: Value = serde_json::from_str(text).unwrap();
        assert_eq!(back, expected);
    }

    #[test]
    fn pretty_output_uses_two_spaces_and_raw_unicode() {
        let node = from_str(r#"{"name": "橡木"}"#).unwrap();
        let text = to_string(&node).unwrap();
        assert_eq!(text, "{\n  \"name\": \"橡木\"\n}");
    }

    #[test]
    fn binary_only_scalars_become_numbers() {
        let mut c = Container::new();
        c.insert("b", Node::Scalar(Scalar::Byte(-1)));
        c.insert("ints", Node::Scalar(Scalar::IntArray(vec![1, 2])));
        let value = value_from_node(&Node::Container(c));
        assert_eq!(value, serde_json::json!({"b": -1, "ints": [1, 2]}));
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(from_str("{\"name\": ").is_err());
    }
}
