//! Protobuf-JSON codec for replayed messages.
//!
//! The replay stream delivers messages in the protobuf JSON mapping: field
//! values are wrapped in `simpleValue`, `messageValue`, `listValue` or
//! `nullValue`, and 64-bit integers may arrive as strings. Decoding unwraps
//! the typed values into a plain tree; encoding wraps them again so stored
//! resources can be parsed by the generated script.
use crate::message::{Direction, Fields, Message, Metadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid message payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown value kind at '{path}': {value}")]
    UnknownValueKind { path: String, value: String },
    #[error("invalid integer '{0}'")]
    InvalidInteger(String),
}

/// Payload of a `message` event. The body is null when the provider could
/// not resolve the message.
#[derive(Deserialize)]
struct MessageEvent {
    #[serde(default)]
    body: Value,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_event_id: Option<WireEventId>,
    metadata: WireMetadata,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Deserialize, Serialize)]
struct WireEventId {
    id: String,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    id: WireMessageId,
    #[serde(default)]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    message_type: String,
    #[serde(default)]
    protocol: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireMessageId {
    #[serde(default)]
    connection_id: WireConnectionId,
    #[serde(default)]
    direction: Direction,
    #[serde(default, deserialize_with = "deserialize_int64", serialize_with = "serialize_int64")]
    sequence: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subsequence: Vec<u32>,
}

#[derive(Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireConnectionId {
    #[serde(default)]
    session_alias: String,
}

/// Decode the data of a `message` event. Returns `None` for a null body.
pub fn decode_event(data: &str) -> Result<Option<Message>, WireError> {
    let event: MessageEvent = serde_json::from_str(data)?;
    match event.body {
        Value::Null => Ok(None),
        body => decode_message(body).map(Some),
    }
}

/// Decode one protobuf-JSON message.
pub fn decode_message(value: Value) -> Result<Message, WireError> {
    let wire: WireMessage = serde_json::from_value(value)?;
    let fields = decode_fields(&wire.fields, "")?;
    Ok(Message {
        metadata: Metadata {
            protocol: wire.metadata.protocol,
            message_type: wire.metadata.message_type,
            session_alias: wire.metadata.id.connection_id.session_alias,
            direction: wire.metadata.id.direction,
            sequence: wire.metadata.id.sequence,
            subsequence: wire.metadata.id.subsequence,
            timestamp: wire.metadata.timestamp,
            properties: wire.metadata.properties,
        },
        parent_event_id: wire.parent_event_id.map(|id| id.id),
        fields,
    })
}

/// Encode a message back into the protobuf-JSON mapping.
pub fn encode_message(message: &Message) -> Value {
    let meta = &message.metadata;
    let wire = WireMessage {
        parent_event_id: message
            .parent_event_id
            .as_ref()
            .map(|id| WireEventId { id: id.clone() }),
        metadata: WireMetadata {
            id: WireMessageId {
                connection_id: WireConnectionId {
                    session_alias: meta.session_alias.clone(),
                },
                direction: meta.direction,
                sequence: meta.sequence,
                subsequence: meta.subsequence.clone(),
            },
            timestamp: meta.timestamp,
            message_type: meta.message_type.clone(),
            protocol: meta.protocol.clone(),
            properties: meta.properties.clone(),
        },
        fields: encode_fields(&message.fields),
    };
    // The wire structs only hold strings, integers and maps.
    serde_json::to_value(wire).unwrap_or(Value::Null)
}

fn decode_fields(fields: &Map<String, Value>, path: &str) -> Result<Fields, WireError> {
    let mut decoded = Fields::new();
    for (name, value) in fields {
        let child = format!("{path}.{name}");
        decoded.insert(name.clone(), decode_value(value, &child)?);
    }
    Ok(decoded)
}

fn decode_value(value: &Value, path: &str) -> Result<Value, WireError> {
    let unknown = || WireError::UnknownValueKind {
        path: path.to_string(),
        value: value.to_string(),
    };
    let Value::Object(wrapper) = value else {
        return Err(unknown());
    };
    if let Some(simple) = wrapper.get("simpleValue") {
        return match simple {
            Value::String(text) => Ok(Value::String(text.clone())),
            Value::Number(_) | Value::Bool(_) => Ok(Value::String(simple.to_string())),
            _ => Err(unknown()),
        };
    }
    if let Some(message) = wrapper.get("messageValue") {
        let empty = Map::new();
        let fields = match message.get("fields") {
            Some(Value::Object(fields)) => fields,
            None => &empty,
            Some(_) => return Err(unknown()),
        };
        return Ok(Value::Object(decode_fields(fields, path)?));
    }
    if let Some(list) = wrapper.get("listValue") {
        let values = match list.get("values") {
            Some(Value::Array(values)) => values.as_slice(),
            None => &[],
            Some(_) => return Err(unknown()),
        };
        let decoded = values
            .iter()
            .enumerate()
            .map(|(idx, item)| decode_value(item, &format!("{path}[{idx}]")))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Array(decoded));
    }
    // A wrapper without a kind is an unset value.
    if wrapper.is_empty() || wrapper.contains_key("nullValue") {
        return Ok(Value::Null);
    }
    Err(unknown())
}

fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect()
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": "NULL_VALUE" }),
        Value::Bool(flag) => json!({ "simpleValue": flag.to_string() }),
        Value::Number(number) => json!({ "simpleValue": number.to_string() }),
        Value::String(text) => json!({ "simpleValue": text }),
        Value::Array(items) => json!({
            "listValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "messageValue": { "fields": encode_fields(fields) } }),
    }
}

fn deserialize_int64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(value) => Ok(value),
        Int64::Text(text) => text
            .parse()
            .map_err(|_| serde::de::Error::custom(WireError::InvalidInteger(text))),
    }
}

fn serialize_int64<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&value.to_string())
}
