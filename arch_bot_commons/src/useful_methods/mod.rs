mod split_msg;
pub use split_msg::*;

use teloxide::types::{Message, MessageId};

pub trait MessageStuff {
    /// Tries to name the sender of this message in the prettiest way possible, with either
    /// `@username`, chat title, or full name. Never empty.
    fn sender_display_name(&self) -> String;
    /// ID of the message this one replies to, if it's a reply.
    fn reply_to_id(&self) -> Option<MessageId>;
}

impl MessageStuff for Message {
    fn sender_display_name(&self) -> String {
        if let Some(chat) = &self.sender_chat {
            // Anonymous admins and linked channels post as a chat.
            if let Some(username) = chat.username() {
                return format!("@{username}");
            }
            if let Some(title) = chat.title() {
                return title.to_string();
            }
        }

        if let Some(user) = &self.from {
            if let Some(username) = &user.username {
                return format!("@{username}");
            }
            return user.full_name();
        }

        // Shouldn't happen, but eh.
        "a private sender".to_string()
    }

    fn reply_to_id(&self) -> Option<MessageId> {
        self.reply_to_message().map(|x| x.id)
    }
}
