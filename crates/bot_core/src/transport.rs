use async_trait::async_trait;
use shared::domain::{ChatId, UserId};

use crate::screens::Screen;

/// Where a reply goes. Button presses carry the pressed message and the
/// callback to acknowledge; text messages carry neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: ChatId,
    pub message_id: Option<i64>,
    pub callback_id: Option<String>,
}

impl ReplyTarget {
    pub fn chat(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            message_id: None,
            callback_id: None,
        }
    }

    pub fn is_callback(&self) -> bool {
        self.callback_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Action {
        target: ReplyTarget,
        user_id: UserId,
        token: String,
    },
    Text {
        target: ReplyTarget,
        user_id: UserId,
        display_name: Option<String>,
        text: String,
    },
}

impl InboundEvent {
    pub fn target(&self) -> &ReplyTarget {
        match self {
            InboundEvent::Action { target, .. } | InboundEvent::Text { target, .. } => target,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            InboundEvent::Action { user_id, .. } | InboundEvent::Text { user_id, .. } => *user_id,
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// One poll; may return an empty batch.
    async fn receive(&self) -> anyhow::Result<Vec<InboundEvent>>;

    async fn send_screen(&self, target: &ReplyTarget, screen: &Screen) -> anyhow::Result<()>;

    async fn send_notice(&self, target: &ReplyTarget, notice: &str) -> anyhow::Result<()>;

    /// Clears the client-side spinner of a button press that got no notice.
    async fn acknowledge(&self, _target: &ReplyTarget) -> anyhow::Result<()> {
        Ok(())
    }
}
