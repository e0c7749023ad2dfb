//! Wire messages.
//!
//! Every frame is a flat JSON object carrying `protocolVersion` and
//! `messageType` next to the payload fields. [`Message`] keeps the version
//! and flattens the payload through the internally tagged [`MessageBody`].

use glimpse_types::Capabilities;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PROTOCOL_VERSION: &str = "1.0";

/// Handler lookup key for a version and message type.
pub fn handler_key(protocol_version: &str, message_type: &str) -> String {
    format!("{protocol_version}:{message_type}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub protocol_version: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    /// Wrap `body` in the current protocol version.
    pub fn new(body: MessageBody) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            body,
        }
    }

    pub fn message_type(&self) -> &'static str {
        self.body.message_type()
    }

    pub fn key(&self) -> String {
        handler_key(&self.protocol_version, self.message_type())
    }

    pub fn init(capabilities: Capabilities) -> Self {
        Self::new(MessageBody::Init(Init { capabilities }))
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::new(MessageBody::Log(Log {
            level,
            message: message.into(),
        }))
    }

    pub fn shutdown(reason: impl Into<String>, code: i32) -> Self {
        Self::new(MessageBody::Shutdown(Shutdown {
            reason: reason.into(),
            code,
        }))
    }
}

impl From<MessageBody> for Message {
    fn from(body: MessageBody) -> Self {
        Self::new(body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "snake_case")]
pub enum MessageBody {
    // host -> engine
    Start(Start),
    UpdateFilesystem(UpdateFilesystem),
    RequestPreview(RequestPreview),
    /// Sent by either side.
    Shutdown(Shutdown),

    // engine -> host
    Init(Init),
    Acknowledge(Acknowledge),
    Reject(Reject),
    PreviewAcknowledge(PreviewAcknowledge),
    PreviewProgress(PreviewProgress),
    PreviewComplete(PreviewComplete),
    PreviewFail(PreviewFail),
    Log(Log),
    InitProgress(InitProgress),

    /// A type this build has no payload definition for.
    #[serde(other)]
    Unknown,
}

impl MessageBody {
    pub fn message_type(&self) -> &'static str {
        match self {
            MessageBody::Start(_) => "start",
            MessageBody::UpdateFilesystem(_) => "update_filesystem",
            MessageBody::RequestPreview(_) => "request_preview",
            MessageBody::Shutdown(_) => "shutdown",
            MessageBody::Init(_) => "init",
            MessageBody::Acknowledge(_) => "acknowledge",
            MessageBody::Reject(_) => "reject",
            MessageBody::PreviewAcknowledge(_) => "preview_acknowledge",
            MessageBody::PreviewProgress(_) => "preview_progress",
            MessageBody::PreviewComplete(_) => "preview_complete",
            MessageBody::PreviewFail(_) => "preview_fail",
            MessageBody::Log(_) => "log",
            MessageBody::InitProgress(_) => "init_progress",
            MessageBody::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Start {
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFilesystem {
    pub updates: Vec<FileUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Create,
    Update,
    Delete,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub action: FileAction,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<FileContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Base64,
}

/// File bytes as sent by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub base64: String,
    pub original_encoding: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPreview {
    pub path: String,
    #[serde(default)]
    pub live_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shutdown {
    pub reason: String,
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Init {
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledge {
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reject {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewAcknowledge {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewProgress {
    pub path: String,
    pub progress: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewComplete {
    pub path: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewFail {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const ALL: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitProgress {
    pub renderer_name: String,
    pub progress: f64,
    pub message: String,
}
