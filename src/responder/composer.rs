use std::time::Duration;

use crate::groupme::{Attachment, BotPostRequest, EmojiAttachment, ReplyAttachment};

/// Glyph GroupMe swaps for the emoji named in the charmap.
pub const EMOJI_PLACEHOLDER: &str = "\u{FFFD}";

/// An emoji identity: pack and index within the pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emoji {
    pub pack_id: u32,
    pub emoji_id: u32,
}

pub const DINO: Emoji = Emoji {
    pack_id: 1,
    emoji_id: 62,
};

pub const RANDY: Emoji = Emoji {
    pack_id: 8,
    emoji_id: 47,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDirective {
    pub emoji: Emoji,
    pub count: u32,
    pub delay: Duration,
    pub reply_to: Option<String>,
    pub base_reply_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingPost {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl OutgoingPost {
    pub fn into_request(self, bot_id: &str) -> BotPostRequest {
        BotPostRequest {
            bot_id: bot_id.to_string(),
            text: self.text,
            attachments: self.attachments,
        }
    }
}

pub fn compose(directive: &ReplyDirective) -> OutgoingPost {
    let count = directive.count as usize;
    let text = EMOJI_PLACEHOLDER.repeat(count);
    let charmap = vec![[directive.emoji.pack_id, directive.emoji.emoji_id]; count];

    let mut attachments = vec![Attachment::Emoji(EmojiAttachment {
        placeholder: EMOJI_PLACEHOLDER.to_string(),
        charmap,
    })];

    if let Some(reply_to) = directive.reply_to.as_deref().filter(|id| !id.is_empty()) {
        // A reply with no thread root is its own root.
        let base = directive
            .base_reply_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(reply_to);
        attachments.push(Attachment::Reply(ReplyAttachment {
            reply_id: reply_to.to_string(),
            base_reply_id: Some(base.to_string()),
        }));
    }

    OutgoingPost { text, attachments }
}

/// Wait out the directive's delay, then compose.
pub async fn compose_after_delay(directive: &ReplyDirective) -> OutgoingPost {
    if !directive.delay.is_zero() {
        tokio::time::sleep(directive.delay).await;
    }
    compose(directive)
}
