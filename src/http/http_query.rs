//! Query strings with bracket notation for nested input.
//!
//! `tags[]=a&tags[]=b&user[name]=x` decodes to
//! `{"tags": ["a", "b"], "user": {"name": "x"}}` and encoding walks the same
//! shape back out, numbering list entries (`tags[0]=a&tags[1]=b`).

use serde_json::{Map, Value};
use url::form_urlencoded::{self, Serializer};

/// Deepest bracket nesting accepted in a key; deeper pairs are dropped.
pub const MAX_INPUT_NESTING: usize = 64;

/// Encodes request input as an `application/x-www-form-urlencoded` string.
///
/// Nulls are skipped and booleans are written as `1`/`0`.
pub fn build_query(input: &Map<String, Value>) -> String {
    let mut serializer = Serializer::new(String::new());
    for (key, value) in input {
        append_value(&mut serializer, key, value);
    }
    serializer.finish()
}

fn append_value(serializer: &mut Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => {
            serializer.append_pair(key, if *flag { "1" } else { "0" });
        }
        Value::Number(number) => {
            serializer.append_pair(key, &number.to_string());
        }
        Value::String(text) => {
            serializer.append_pair(key, text);
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                append_value(serializer, &format!("{}[{}]", key, index), item);
            }
        }
        Value::Object(map) => {
            for (name, item) in map {
                append_value(serializer, &format!("{}[{}]", key, name), item);
            }
        }
    }
}

/// Decodes a query string (without the leading `?`) into an input mapping.
///
/// Keys nested deeper than [`MAX_INPUT_NESTING`] are skipped.
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut input = Map::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let Some((base, segments)) = split_key(&key) else {
            tracing::debug!("dropping input `{:.32}...` nested deeper than {}", key, MAX_INPUT_NESTING);
            continue;
        };
        if base.is_empty() {
            continue;
        }

        let mut slot = input.entry(base).or_insert(Value::Null);
        for segment in &segments {
            slot = child(slot, segment);
        }
        *slot = Value::String(value.into_owned());
    }
    input
}

fn split_key(key: &str) -> Option<(String, Vec<String>)> {
    let open = match key.find('[') {
        Some(open) if open > 0 => open,
        _ => return Some((key.to_string(), Vec::new())),
    };

    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            break;
        };
        if segments.len() == MAX_INPUT_NESTING {
            return None;
        }
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }

    if segments.is_empty() {
        return Some((key.to_string(), segments));
    }
    Some((key[..open].to_string(), segments))
}

fn list_index(segment: &str, len: usize) -> Option<usize> {
    if segment.is_empty() {
        return Some(len);
    }
    segment.parse::<usize>().ok().filter(|index| *index <= len)
}

// Containers start out as lists and turn into mappings once a segment is not the next list index.
fn child<'a>(slot: &'a mut Value, segment: &str) -> &'a mut Value {
    if !slot.is_array() && !slot.is_object() {
        *slot = Value::Array(Vec::new());
    }

    if let Value::Array(items) = slot {
        if list_index(segment, items.len()).is_none() {
            let items = std::mem::take(items);
            *slot = Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| (index.to_string(), item))
                    .collect(),
            );
        }
    }

    match slot {
        Value::Array(items) => {
            let index = list_index(segment, items.len()).unwrap_or(items.len());
            if index == items.len() {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        Value::Object(map) => {
            let key = if segment.is_empty() { map.len().to_string() } else { segment.to_string() };
            map.entry(key).or_insert(Value::Null)
        }
        other => other,
    }
}
