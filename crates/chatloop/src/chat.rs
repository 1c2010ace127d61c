//! Conversation messages, tool calls, and completion responses.
//!
//! These types mirror the chat-completions wire format closely enough that
//! they serialize directly into a request body and deserialize directly
//! from a response body:
//!
//! - [`ChatMessage`] is tagged on `role` (`system`, `user`, `assistant`,
//!   `tool`).
//! - [`ToolCall`] carries its arguments as a JSON-encoded **string**, not
//!   a nested object.
//! - [`ToolMessage`] correlates back to its call through `tool_call_id`.
//!
//! Messages are plain values. A conversation grows by appending new
//! messages to a `Vec<ChatMessage>`; nothing here mutates history in place.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LlmError;
use crate::usage::Usage;

/// The role of a message's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// The human (or calling application).
    User,
    /// The model.
    Assistant,
    /// The output of a tool the model asked to run.
    Tool,
}

/// A single message in a conversation thread.
///
/// ```rust
/// use chatloop::ChatMessage;
/// use chatloop::chat::ChatRole;
///
/// let thread = vec![
///     ChatMessage::system("You are a helpful assistant."),
///     ChatMessage::user("What's the weather in Lyon?"),
/// ];
/// assert_eq!(thread[1].role(), ChatRole::User);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// A system message.
    System(SystemMessage),
    /// A user message.
    User(UserMessage),
    /// An assistant message, possibly carrying tool calls.
    Assistant(AssistantMessage),
    /// The result of one tool call.
    Tool(ToolMessage),
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(SystemMessage {
            content: content.into(),
            name: None,
        })
    }

    /// Creates a plain-text user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(UserMessage {
            content: MessageContent::Text(content.into()),
            name: None,
        })
    }

    /// Creates a user message made of several content parts.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::User(UserMessage {
            content: MessageContent::Parts(parts),
            name: None,
        })
    }

    /// Creates a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage {
            content: Some(content.into()),
            ..Default::default()
        })
    }

    /// Creates an assistant message that only carries tool calls.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant(AssistantMessage {
            tool_calls,
            ..Default::default()
        })
    }

    /// Creates a tool result message answering the call `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool(ToolMessage {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
        })
    }

    /// Returns the role of this message.
    pub fn role(&self) -> ChatRole {
        match self {
            Self::System(_) => ChatRole::System,
            Self::User(_) => ChatRole::User,
            Self::Assistant(_) => ChatRole::Assistant,
            Self::Tool(_) => ChatRole::Tool,
        }
    }

    /// Returns the text of this message, if it has any.
    ///
    /// For multi-part user messages, this is the first text part.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System(m) => Some(&m.content),
            Self::User(m) => m.content.text(),
            Self::Assistant(m) => m.content.as_deref(),
            Self::Tool(m) => Some(&m.content),
        }
    }

    /// Returns the tool calls carried by an assistant message.
    ///
    /// Empty for every other role.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant(m) => &m.tool_calls,
            _ => &[],
        }
    }

    /// Returns the call id a tool message answers.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool(m) => Some(&m.tool_call_id),
            _ => None,
        }
    }
}

/// Body of a `system` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessage {
    /// The instruction text.
    pub content: String,
    /// Optional participant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of a `user` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Text or multi-part content.
    pub content: MessageContent,
    /// Optional participant name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of an `assistant` message.
///
/// This is also the message type found in each response [`Choice`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Generated text. `None` when the model only requested tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// A refusal message, if the model declined to answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
    /// Tool invocations requested by the model, in the order emitted.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
}

/// Body of a `tool` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMessage {
    /// The tool's output, usually JSON text.
    pub content: String,
    /// The [`ToolCall::id`] this result answers.
    pub tool_call_id: String,
}

/// Content of a user message: a plain string or an array of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Typed content parts (text, images).
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Returns the plain text, or the first text part.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            }),
        }
    }
}

/// A typed part of multi-part user content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text fragment.
    Text {
        /// The text.
        text: String,
    },
    /// An image referenced by URL or `data:` URL.
    ImageUrl {
        /// The image location.
        image_url: ImageUrl,
    },
}

/// Image location for [`ContentPart::ImageUrl`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// `https://` or `data:` URL.
    pub url: String,
    /// Resolution hint (`"low"`, `"high"`, `"auto"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The kind of a tool. Only functions exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// A function tool.
    #[default]
    Function,
}

/// A single tool invocation requested by the model.
///
/// On the wire: `{"id": "...", "type": "function", "function": {"name": "...",
/// "arguments": "{...}"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque id that the matching [`ToolMessage`] must echo back.
    pub id: String,
    /// Always [`ToolKind::Function`].
    #[serde(rename = "type", default)]
    pub kind: ToolKind,
    /// The function name and its JSON-encoded arguments.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Creates a function tool call.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ToolKind::Function,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// The name of the function to invoke.
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Function name plus serialized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The function to invoke.
    pub name: String,
    /// A JSON object, encoded as a string.
    pub arguments: String,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the message.
    Stop,
    /// The token limit was reached.
    Length,
    /// Output was withheld by a content filter.
    ContentFilter,
    /// The model wants tools executed.
    ToolCalls,
    /// Legacy single-function call.
    FunctionCall,
    /// A value this client does not recognise (or none at all).
    #[default]
    #[serde(other)]
    Unknown,
}

/// One candidate completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Position in [`CompletionResponse::choices`].
    #[serde(default)]
    pub index: u32,
    /// Why generation stopped.
    #[serde(default, deserialize_with = "null_as_default")]
    pub finish_reason: FinishReason,
    /// The generated message.
    pub message: AssistantMessage,
}

/// The result of one chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Server-assigned completion id.
    #[serde(default)]
    pub id: String,
    /// Unix timestamp (seconds) of creation.
    #[serde(default)]
    pub created: u64,
    /// The model that produced the completion.
    #[serde(default)]
    pub model: String,
    /// Candidate completions. Only the first is used by the loops.
    pub choices: Vec<Choice>,
    /// Token accounting, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Backend configuration fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

impl CompletionResponse {
    /// Returns `choices[0]`.
    ///
    /// A response without choices violates the protocol and yields
    /// [`LlmError::NoChoices`].
    pub fn first_choice(&self) -> Result<&Choice, LlmError> {
        self.choices.first().ok_or(LlmError::NoChoices)
    }

    /// Finish reason of the first choice, if there is one.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().map(|c| c.finish_reason)
    }

    /// Text of the first choice, if there is any.
    pub fn text(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }

    /// Tool calls of the first choice.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.choices
            .first()
            .map_or(&[], |c| c.message.tool_calls.as_slice())
    }
}

/// Treats an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
