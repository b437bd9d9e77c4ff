//! Tool argument types and their published input schemas.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Arguments accepted by a tool.
pub trait ToolArgs: DeserializeOwned + Serialize {
    /// Check constraints serde cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Parse, validate, and normalise raw tool arguments.
///
/// Missing arguments are treated as an empty object. The returned value has
/// every default filled in and is what gets relayed to the plugin.
pub fn normalize<T: ToolArgs>(arguments: Option<Value>) -> Result<Value, String> {
    let raw = arguments.unwrap_or_else(|| json!({}));
    let args: T = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    args.validate()?;
    serde_json::to_value(&args).map_err(|e| e.to_string())
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteArgs {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ToolArgs for CreateNoteArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchArgs {
    pub query: String,
    #[serde(default = "SearchArgs::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub include_content: bool,
}

impl SearchArgs {
    fn default_limit() -> i64 {
        20
    }
}

impl ToolArgs for SearchArgs {
    fn validate(&self) -> Result<(), String> {
        check_range("limit", self.limit, 1, 100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadNoteArgs {
    pub rem_id: String,
    #[serde(default = "ReadNoteArgs::default_depth")]
    pub depth: i64,
}

impl ReadNoteArgs {
    fn default_depth() -> i64 {
        3
    }
}

impl ToolArgs for ReadNoteArgs {
    fn validate(&self) -> Result<(), String> {
        check_range("depth", self.depth, 0, 10)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteArgs {
    pub rem_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_tags: Option<Vec<String>>,
}

impl ToolArgs for UpdateNoteArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendJournalArgs {
    pub content: String,
    #[serde(default = "AppendJournalArgs::default_timestamp")]
    pub timestamp: bool,
}

impl AppendJournalArgs {
    fn default_timestamp() -> bool {
        true
    }
}

impl ToolArgs for AppendJournalArgs {}

/// A tool as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

pub const CREATE_NOTE: &str = "remnote_create_note";
pub const SEARCH: &str = "remnote_search";
pub const READ_NOTE: &str = "remnote_read_note";
pub const UPDATE_NOTE: &str = "remnote_update_note";
pub const APPEND_JOURNAL: &str = "remnote_append_journal";
pub const STATUS: &str = "remnote_status";

/// Every tool the bridge exposes.
pub fn catalogue() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            CREATE_NOTE,
            "Create a new note in RemNote with optional content, parent, and tags",
            json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "The title of the note"},
                    "content": {"type": "string", "description": "Content as child bullets (newline-separated)"},
                    "parentId": {"type": "string", "description": "Parent Rem ID"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags to apply"}
                },
                "required": ["title"]
            }),
        ),
        ToolDefinition::new(
            SEARCH,
            "Search the RemNote knowledge base for notes matching a query",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query text"},
                    "limit": {"type": "number", "description": "Maximum results (1-100, default: 20)"},
                    "includeContent": {"type": "boolean", "description": "Include child content (default: false)"}
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::new(
            READ_NOTE,
            "Read a specific note from RemNote by its Rem ID",
            json!({
                "type": "object",
                "properties": {
                    "remId": {"type": "string", "description": "The Rem ID to read"},
                    "depth": {"type": "number", "description": "Depth of children to include (0-10, default: 3)"}
                },
                "required": ["remId"]
            }),
        ),
        ToolDefinition::new(
            UPDATE_NOTE,
            "Update an existing note in RemNote (change title, append content, or modify tags)",
            json!({
                "type": "object",
                "properties": {
                    "remId": {"type": "string", "description": "The Rem ID to update"},
                    "title": {"type": "string", "description": "New title"},
                    "appendContent": {"type": "string", "description": "Content to append as children"},
                    "addTags": {"type": "array", "items": {"type": "string"}, "description": "Tags to add"},
                    "removeTags": {"type": "array", "items": {"type": "string"}, "description": "Tags to remove"}
                },
                "required": ["remId"]
            }),
        ),
        ToolDefinition::new(
            APPEND_JOURNAL,
            "Append content to today's daily document in RemNote",
            json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "Content to append to today's daily document"},
                    "timestamp": {"type": "boolean", "description": "Include timestamp (default: true)"}
                },
                "required": ["content"]
            }),
        ),
        ToolDefinition::new(
            STATUS,
            "Check the connection status and statistics of the RemNote MCP bridge",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}
