use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{DeliveryError, DeliveryResult};

/// Upper bound on the text body, counted in characters.
pub const MAX_TEXT_LENGTH: usize = 100_000;

/// Status of a single delivery entry and, derived from those, of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
        }
    }

    /// A message counts as delivered once any of its entries is.
    pub fn aggregate<I>(entries: I) -> DeliveryStatus
    where
        I: IntoIterator<Item = DeliveryStatus>,
    {
        if entries
            .into_iter()
            .any(|status| status == DeliveryStatus::Delivered)
        {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Sent
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = DeliveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            other => Err(DeliveryError::internal(format!(
                "unknown delivery status '{other}'"
            ))),
        }
    }
}

/// Attachment reference. The bytes live in object storage, only the pointer is kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileDescriptor {
    pub url: String,
    pub name: Option<String>,
    pub size: Option<i64>,
    /// MIME type
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub storage: Option<String>,
}

/// Body of a send request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageContent {
    #[serde(default)]
    pub text: Option<String>,
    /// Legacy single-image URL
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub file: Option<FileDescriptor>,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Drops blank parts and checks that something is left to send.
    pub fn normalized(self) -> DeliveryResult<Self> {
        let text = self.text.filter(|text| !text.trim().is_empty());
        let image = self
            .image
            .map(|image| image.trim().to_string())
            .filter(|image| !image.is_empty());
        let file = self.file.filter(|file| !file.url.trim().is_empty());

        if text.is_none() && image.is_none() && file.is_none() {
            return Err(DeliveryError::validation(
                "message must contain text, an image or a file",
            ));
        }

        if let Some(text) = &text {
            if text.chars().count() > MAX_TEXT_LENGTH {
                return Err(DeliveryError::validation(format!(
                    "text exceeds {MAX_TEXT_LENGTH} characters"
                )));
            }
        }

        Ok(Self { text, image, file })
    }
}

/// Display identity of the sender, joined in on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SenderProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryEntry {
    #[serde(skip)]
    pub recipient_id: i64,
    /// Public id of the recipient
    #[serde(rename = "recipient")]
    pub recipient_public_id: String,
    pub status: DeliveryStatus,
    pub delivered_at: Option<String>,
}

impl DeliveryEntry {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Message {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    /// Public id of the conversation
    pub conversation_id: String,
    #[serde(skip)]
    pub sender_id: i64,
    pub sender: SenderProfile,
    pub text: Option<String>,
    pub image: Option<String>,
    pub file: Option<FileDescriptor>,
    pub status: DeliveryStatus,
    pub deliveries: Vec<DeliveryEntry>,
    pub created_at: String,
}

impl Message {
    pub fn entry_for(&self, recipient_id: i64) -> Option<&DeliveryEntry> {
        self.deliveries
            .iter()
            .find(|entry| entry.recipient_id == recipient_id)
    }

    pub fn recipient_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.deliveries.iter().map(|entry| entry.recipient_id)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}
