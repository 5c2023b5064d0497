//! Outgoing message model

use serde::{Deserialize, Serialize};

/// A file sent alongside a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the recipient
    pub filename: String,

    /// MIME type, e.g. `image/png`
    pub content_type: String,

    /// Raw contents
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// A composed notification, ready for every channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Subject / title line
    pub subject: String,

    /// Plain-text body
    pub body: String,

    /// Optional HTML rendition (used by e-mail)
    pub html: Option<String>,

    /// Files to attach
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Create a text-only message
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            html: None,
            attachments: Vec::new(),
        }
    }

    /// Join several rendered sections into one message
    ///
    /// Bodies are concatenated in order, separated by a blank line.
    pub fn compose(subject: impl Into<String>, sections: Vec<Message>) -> Self {
        let mut body = String::new();
        let mut attachments = Vec::new();

        for section in sections {
            if !body.is_empty() {
                body.push_str("\n\n");
            }
            body.push_str(&section.body);
            attachments.extend(section.attachments);
        }

        Self {
            subject: subject.into(),
            body,
            html: None,
            attachments,
        }
    }
}
