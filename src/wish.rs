use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::platform::{ChannelMessage, Embed, EmbedField, SentMessage};

/// Label of the embed field carrying the guest's name
pub const NAME_FIELD: &str = "👤 Nama";
/// Label of the embed field carrying the attendance answer
pub const ATTENDANCE_FIELD: &str = "📋 Kehadiran";
/// How many recent channel messages a wish listing looks at
pub const FETCH_WINDOW: u8 = 100;

const ANONYMOUS: &str = "Anonim";
const WISH_TITLE: &str = "💌 Ucapan & Doa Baru";

/// RSVP answer. Serialized with the invitation page's form values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Attendance {
    #[serde(rename = "hadir")]
    Attending,
    #[serde(rename = "tidak")]
    NotAttending,
    #[default]
    #[serde(rename = "ragu")]
    Undecided,
}

impl Attendance {
    /// Parse a submitted form value. Unknown or missing values are undecided.
    pub fn from_form(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("hadir") => Attendance::Attending,
            Some("tidak") => Attendance::NotAttending,
            _ => Attendance::Undecided,
        }
    }

    /// Classify the rendered attendance field of a stored wish.
    /// "tidak" is checked first: the not-attending label itself contains "hadir".
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("tidak") {
            Attendance::NotAttending
        } else if text.contains("hadir") {
            Attendance::Attending
        } else {
            Attendance::Undecided
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Attendance::Attending => "✅",
            Attendance::NotAttending => "❌",
            Attendance::Undecided => "❓",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Attendance::Attending => "Hadir",
            Attendance::NotAttending => "Tidak Hadir",
            Attendance::Undecided => "Ragu-ragu",
        }
    }

    pub fn colour(self) -> u32 {
        match self {
            Attendance::Attending => 0x22c55e,
            Attendance::NotAttending => 0xef4444,
            Attendance::Undecided => 0xeab308,
        }
    }
}

impl std::fmt::Display for Attendance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author: String,
    pub message: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wish {
    pub id: String,
    pub name: String,
    pub message: String,
    pub attendance: Attendance,
    pub created_at: i64,
    pub replies: Vec<Reply>,
}

impl Wish {
    /// Read a wish back from a message the relay posted. `None` when the
    /// message has no embed or was not authored by `bot_id`.
    pub fn from_message(message: &ChannelMessage, bot_id: u64) -> Option<Self> {
        if message.author_id != bot_id {
            return None;
        }
        let embed = message.embeds.first()?;

        Some(Wish {
            id: message.id.to_string(),
            name: embed
                .field(NAME_FIELD)
                .map(|f| f.value.clone())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| ANONYMOUS.to_string()),
            message: embed.description.clone().unwrap_or_default(),
            attendance: embed
                .field(ATTENDANCE_FIELD)
                .map(|f| Attendance::classify(&f.value))
                .unwrap_or_default(),
            created_at: message.created_at,
            replies: Vec::new(),
        })
    }
}

/// Reshape a window of channel messages into wishes with their replies.
/// Replies are oldest first; wishes are newest first.
pub fn collect_wishes(messages: &[ChannelMessage], bot_id: u64) -> Vec<Wish> {
    let mut wishes: Vec<Wish> = messages
        .iter()
        .filter_map(|m| Wish::from_message(m, bot_id))
        .collect();

    let index: HashMap<String, usize> = wishes
        .iter()
        .enumerate()
        .map(|(i, w)| (w.id.clone(), i))
        .collect();

    for message in messages.iter().filter(|m| !m.author_is_bot) {
        let Some(parent) = message.reply_to else {
            continue;
        };
        if let Some(&i) = index.get(&parent.to_string()) {
            wishes[i].replies.push(Reply {
                id: message.id.to_string(),
                author: message.author_name.clone(),
                message: message.content.clone(),
                created_at: message.created_at,
            });
        }
    }

    for wish in &mut wishes {
        wish.replies.sort_by_key(|r| r.created_at);
    }
    wishes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    wishes
}

/// A validated wish submission, not yet posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWish {
    pub name: String,
    pub message: String,
    pub attendance: Attendance,
}

impl NewWish {
    /// `None` when the name or message is blank.
    pub fn new(name: Option<&str>, message: Option<&str>, attendance: Option<&str>) -> Option<Self> {
        let name = name.map(str::trim).filter(|s| !s.is_empty())?;
        let message = message.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            name: name.to_string(),
            message: message.to_string(),
            attendance: Attendance::from_form(attendance),
        })
    }

    pub fn to_embed(&self, footer: &str) -> Embed {
        Embed {
            title: Some(WISH_TITLE.to_string()),
            description: Some(self.message.clone()),
            colour: Some(self.attendance.colour()),
            fields: vec![
                EmbedField {
                    name: NAME_FIELD.to_string(),
                    value: self.name.clone(),
                    inline: true,
                },
                EmbedField {
                    name: ATTENDANCE_FIELD.to_string(),
                    value: self.attendance.to_string(),
                    inline: true,
                },
            ],
            footer: Some(footer.to_string()),
            timestamped: true,
        }
    }

    pub fn into_wish(self, sent: SentMessage) -> Wish {
        Wish {
            id: sent.id.to_string(),
            name: self.name,
            message: self.message,
            attendance: self.attendance,
            created_at: sent.created_at,
            replies: Vec::new(),
        }
    }
}
