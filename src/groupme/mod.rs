pub mod poster;
pub mod service;

use serde::{Deserialize, Deserializer, Serialize};

/// A message delivered to a bot callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_attachments")]
    pub attachments: Vec<Attachment>,
    /// Present on direct messages instead of `group_id`.
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
}

impl InboundMessage {
    pub fn is_group_message(&self) -> bool {
        self.group_id.as_deref().is_some_and(|g| !g.is_empty())
    }

    /// Group message with some text to look at.
    pub fn is_actionable(&self) -> bool {
        self.is_group_message() && self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The reply this message is threaded under. The first one wins if the
    /// platform sent several.
    pub fn existing_reply(&self) -> Option<&ReplyAttachment> {
        self.attachments.iter().find_map(|a| match a {
            Attachment::Reply(reply) => Some(reply),
            _ => None,
        })
    }
}

/// `null` reads as empty, and an element that fits no known shape becomes
/// `Attachment::Other` instead of failing the whole message.
fn lenient_attachments<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Attachment>, D::Error> {
    let values: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or(Attachment::Other))
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    Emoji(EmojiAttachment),
    Reply(ReplyAttachment),
    Image(ImageAttachment),
    Mentions(MentionsAttachment),
    /// Any attachment type the bots never look at (video, location, poll, ...).
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiAttachment {
    pub placeholder: String,
    /// `[pack_id, emoji_id]` per placeholder, in the order they appear in the text.
    pub charmap: Vec<[u32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyAttachment {
    /// Empty when the platform sent none; an empty id is never replied to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reply_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_reply_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttachment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionsAttachment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub loci: Vec<[u32; 2]>,
}

/// Body of `POST /bots/post`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotPostRequest {
    pub bot_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl BotPostRequest {
    /// A plain text message with no attachments.
    pub fn text(bot_id: &str, text: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.to_string(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}
