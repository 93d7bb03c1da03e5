//! Domain entities and their wire codec.
//!
//! Decoding is tolerant: absent optional fields take documented defaults instead of
//! failing. Only a structurally-required shape mismatch (an object expected but
//! something else found, a list endpoint not returning an array, a message without
//! an `info` object) produces [`ApiError::Decode`].

use serde::ser::{Serialize, Serializer};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use time::OffsetDateTime;

use crate::error::ApiError;

/// Conversion from a wire JSON value into a domain entity.
pub trait Decode: Sized {
    fn decode(value: &Value) -> Result<Self, ApiError>;
}

/// Decode a JSON text body into `T`.
pub fn decode_str<T: Decode>(body: &str) -> Result<T, ApiError> {
    let value = serde_json::from_str::<Value>(body)?;
    T::decode(&value)
}

/// Decode a JSON array into a list of `T`.
pub fn decode_list<T: Decode>(value: &Value) -> Result<Vec<T>, ApiError> {
    let items = value.as_array().ok_or_else(|| {
        ApiError::decode(format!("expected an array, got {}", value_type_name(value)))
    })?;
    items.iter().map(T::decode).collect()
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        decode_list(value)
    }
}

/// Current wall-clock time in epoch milliseconds, used for missing timestamps.
pub fn now_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Error,
    Aborted,
}

impl SessionStatus {
    /// Case-insensitive status mapping. Unknown values are `Idle`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" | "busy" => Self::Running,
            "error" => Self::Error,
            "aborted" => Self::Aborted,
            _ => Self::Idle,
        }
    }

    /// Accepts the plain string form and the `{"type": "..."}` object form.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(status)) => Self::parse(status),
            Some(Value::Object(map)) => map
                .get("type")
                .and_then(Value::as_str)
                .map(Self::parse)
                .unwrap_or_default(),
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Error => "error",
            Self::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub status: SessionStatus,
    pub is_shared: bool,
}

pub const UNTITLED_SESSION: &str = "Untitled";

impl Decode for Session {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "session")?;
        Ok(Self {
            id: str_or(map, "id", ""),
            title: str_or(map, "title", UNTITLED_SESSION),
            created_at: timestamp(map, "createdAt", "created"),
            updated_at: timestamp(map, "updatedAt", "updated"),
            parent_id: non_empty_str(map, "parentID"),
            status: SessionStatus::from_value(map.get("status")),
            is_shared: bool_or(map, "isShared", false),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub role: MessageRole,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Decode for MessageInfo {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "message info")?;
        Ok(Self {
            id: str_or(map, "id", ""),
            session_id: str_or(map, "sessionID", ""),
            role: map
                .get("role")
                .and_then(Value::as_str)
                .map(MessageRole::parse)
                .unwrap_or_default(),
            created_at: timestamp(map, "createdAt", "created"),
            model: model_name(map),
            agent: non_empty_str(map, "agent"),
        })
    }
}

/// One fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text {
        content: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Wire shape, as accepted by [`MessagePart::decode_part`].
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text { content } => json!({"type": "text", "content": content}),
            Self::ToolCall {
                id,
                name,
                arguments,
            } => json!({
                "type": "tool_call",
                "toolCall": {"id": id, "name": name, "arguments": arguments},
            }),
            Self::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => json!({
                "type": "tool_result",
                "toolResult": {
                    "toolCallId": tool_call_id,
                    "content": content,
                    "isError": is_error,
                },
            }),
        }
    }

    /// Decode one part. Part kinds this client does not model yield `Ok(None)`.
    pub fn decode_part(value: &Value) -> Result<Option<Self>, ApiError> {
        let map = expect_object(value, "message part")?;
        let kind = map.get("type").and_then(Value::as_str).unwrap_or("text");

        match kind {
            "text" => Ok(Some(Self::Text {
                content: map
                    .get("content")
                    .or_else(|| map.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            })),
            "tool_call" | "toolCall" | "tool-call" => Ok(Some(tool_call(map))),
            "tool_result" | "toolResult" | "tool-result" => Ok(Some(tool_result(map))),
            _ if map.get("toolCall").is_some_and(Value::is_object) => Ok(Some(tool_call(map))),
            _ if map.get("toolResult").is_some_and(Value::is_object) => {
                Ok(Some(tool_result(map)))
            }
            _ => Ok(None),
        }
    }
}

fn tool_call(map: &Map<String, Value>) -> MessagePart {
    let inner = map
        .get("toolCall")
        .and_then(Value::as_object)
        .unwrap_or(map);
    MessagePart::ToolCall {
        id: str_or(inner, "id", ""),
        name: str_or(inner, "name", ""),
        // Absent arguments default to an empty object; an explicit null is kept.
        arguments: inner
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    }
}

fn tool_result(map: &Map<String, Value>) -> MessagePart {
    let inner = map
        .get("toolResult")
        .and_then(Value::as_object)
        .unwrap_or(map);
    MessagePart::ToolResult {
        tool_call_id: str_or(inner, "toolCallId", ""),
        content: str_or(inner, "content", ""),
        is_error: bool_or(inner, "isError", false),
    }
}

impl Serialize for MessagePart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Message {
    pub info: MessageInfo,
    pub parts: Vec<MessagePart>,
}

impl Message {
    /// All text parts joined by newline, in part order.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }
}

impl Decode for Message {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "message")?;
        let info = map
            .get("info")
            .ok_or_else(|| ApiError::decode("message is missing 'info'"))?;
        let info = MessageInfo::decode(info)?;

        let mut parts = Vec::new();
        if let Some(items) = map.get("parts").and_then(Value::as_array) {
            for item in items {
                if let Some(part) = MessagePart::decode_part(item)? {
                    parts.push(part);
                }
            }
        }

        Ok(Self { info, parts })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified_at: i64,
}

impl Decode for FileNode {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "file node")?;
        Ok(Self {
            path: str_or(map, "path", ""),
            name: str_or(map, "name", ""),
            is_directory: bool_or(map, "isDirectory", false),
            size: map.get("size").and_then(Value::as_u64).unwrap_or(0),
            modified_at: map
                .get("modifiedAt")
                .and_then(Value::as_i64)
                .unwrap_or_else(now_millis),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    pub encoding: String,
}

impl FileContent {
    /// Decode with the requested path as the fallback for a missing `path`.
    pub fn decode_for(value: &Value, requested_path: &str) -> Result<Self, ApiError> {
        let map = expect_object(value, "file content")?;
        Ok(Self {
            path: str_or(map, "path", requested_path),
            content: str_or(map, "content", ""),
            encoding: str_or(map, "encoding", "utf-8"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    pub path: String,
    pub old_content: Option<String>,
    pub new_content: String,
    pub is_deleted: bool,
}

impl Decode for FileDiff {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "file diff")?;
        Ok(Self {
            path: str_or(map, "path", ""),
            old_content: non_empty_str(map, "oldContent"),
            new_content: str_or(map, "newContent", ""),
            is_deleted: bool_or(map, "isDeleted", false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SearchResult {
    pub path: String,
    pub lines: String,
    pub line_number: u32,
}

impl Decode for SearchResult {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "search result")?;
        Ok(Self {
            path: text_field(map.get("path")),
            lines: text_field(map.get("lines")),
            line_number: map
                .get("line_number")
                .and_then(Value::as_u64)
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub path: String,
    pub is_git: bool,
}

impl Decode for Project {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "project")?;
        Ok(Self {
            id: str_or(map, "id", ""),
            name: str_or(map, "name", ""),
            path: str_or(map, "path", ""),
            is_git: bool_or(map, "isGit", false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub is_connected: bool,
    pub models: Vec<String>,
}

impl Decode for Provider {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "provider")?;
        let models = match map.get("models") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect(),
            Some(Value::Object(entries)) => entries.keys().cloned().collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            id: str_or(map, "id", ""),
            name: str_or(map, "name", ""),
            is_connected: bool_or(map, "isConnected", false),
            models,
        })
    }
}

/// `GET /provider` answers `{"all": [...]}`; a missing `all` is an empty catalog.
pub fn decode_provider_catalog(value: &Value) -> Result<Vec<Provider>, ApiError> {
    let map = expect_object(value, "provider catalog")?;
    match map.get("all") {
        Some(all) => decode_list(all),
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommandArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
    pub description: String,
}

impl Decode for CommandArgument {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "command argument")?;
        Ok(Self {
            name: str_or(map, "name", ""),
            kind: str_or(map, "type", ""),
            required: bool_or(map, "required", false),
            description: str_or(map, "description", ""),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub arguments: Vec<CommandArgument>,
}

impl Decode for Command {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "command")?;
        let arguments = match map.get("arguments") {
            Some(items @ Value::Array(_)) => decode_list(items)?,
            _ => Vec::new(),
        };
        Ok(Self {
            name: str_or(map, "name", ""),
            description: str_or(map, "description", ""),
            arguments,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ServerHealth {
    pub healthy: bool,
    pub version: String,
}

impl Decode for ServerHealth {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        let map = expect_object(value, "health")?;
        Ok(Self {
            healthy: bool_or(map, "healthy", false),
            version: str_or(map, "version", "unknown"),
        })
    }
}

impl Decode for String {
    fn decode(value: &Value) -> Result<Self, ApiError> {
        value
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ApiError::decode(format!("expected a string, got {}", value_type_name(value))))
    }
}

pub(crate) fn expect_object<'a>(
    value: &'a Value,
    what: &str,
) -> Result<&'a Map<String, Value>, ApiError> {
    value.as_object().ok_or_else(|| {
        ApiError::decode(format!(
            "expected {what} to be an object, got {}",
            value_type_name(value)
        ))
    })
}

fn str_or(map: &Map<String, Value>, key: &str, default: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_owned()
}

fn non_empty_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn bool_or(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) => str_or(map, "text", ""),
        _ => String::new(),
    }
}

/// `createdAt` style fields, falling back to the nested `time.created` shape.
fn timestamp(map: &Map<String, Value>, flat_key: &str, nested_key: &str) -> i64 {
    map.get(flat_key)
        .and_then(Value::as_i64)
        .or_else(|| {
            map.get("time")
                .and_then(|time| time.get(nested_key))
                .and_then(Value::as_i64)
        })
        .unwrap_or_else(now_millis)
}

/// `model` is a plain string, or `{providerID, modelID}` on newer servers.
fn model_name(map: &Map<String, Value>) -> Option<String> {
    match map.get("model") {
        Some(Value::String(model)) if !model.is_empty() => Some(model.clone()),
        Some(Value::Object(model)) => {
            let model_id = model.get("modelID").and_then(Value::as_str)?;
            match model.get("providerID").and_then(Value::as_str) {
                Some(provider) if !provider.is_empty() => Some(format!("{provider}/{model_id}")),
                _ => Some(model_id.to_owned()),
            }
        }
        _ => None,
    }
}

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
