use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use anyhow::{bail, Context};
use async_trait::async_trait;
use bot_core::{ActionTarget, ChatTransport, InboundEvent, ReplyTarget, Screen};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use shared::domain::{ChatId, UserId};
use tracing::{debug, warn};
use url::Url;

/// Telegram rejects `callback_data` above this many bytes.
const MAX_CALLBACK_DATA_BYTES: usize = 64;
const NOT_MODIFIED: &str = "message is not modified";

/// Bot API client speaking long polling.
pub struct TelegramTransport {
    http: Client,
    api_base: Url,
    poll_timeout: Duration,
    offset: AtomicI64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}

impl TelegramTransport {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            // The long poll itself must finish before the client gives up.
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .context("failed to build telegram http client")?;
        // Joining `bot<token>/` would read the token's `123:` prefix as a scheme.
        let api_base = Url::parse(&format!("{}/bot{token}/", api_url.trim_end_matches('/')))
            .with_context(|| format!("invalid telegram api url '{api_url}'"))?;
        Ok(Self {
            http,
            api_base,
            poll_timeout,
            offset: AtomicI64::new(0),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> anyhow::Result<T> {
        let url = self.api_base.join(method)?;
        let response: ApiResponse<T> = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("telegram {method} request failed"))?
            .json()
            .await
            .with_context(|| format!("telegram {method} returned an unreadable body"))?;
        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => bail!(
                "telegram {method} failed: {}",
                description.unwrap_or_else(|| "no description".into())
            ),
        }
    }

    async fn edit_or_send(&self, target: &ReplyTarget, screen: &Screen) -> anyhow::Result<()> {
        let Some(message_id) = target.message_id else {
            return self.send_message(target.chat_id, screen).await;
        };
        let mut body = json!({
            "chat_id": target.chat_id.0,
            "message_id": message_id,
            "text": screen.body(),
        });
        if let Some(markup) = keyboard_json(screen) {
            body["reply_markup"] = markup;
        }
        match self.call::<Value>("editMessageText", &body).await {
            Ok(_) => Ok(()),
            Err(err) if err.to_string().contains(NOT_MODIFIED) => {
                debug!(chat_id = %target.chat_id, "screen unchanged; edit skipped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn send_message(&self, chat_id: ChatId, screen: &Screen) -> anyhow::Result<()> {
        let mut body = json!({ "chat_id": chat_id.0, "text": screen.body() });
        if let Some(markup) = keyboard_json(screen) {
            body["reply_markup"] = markup;
        }
        self.call::<Value>("sendMessage", &body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> anyhow::Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call::<Value>("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn receive(&self) -> anyhow::Result<Vec<InboundEvent>> {
        let body = json!({
            "offset": self.offset.load(Ordering::SeqCst),
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<Update> = self.call("getUpdates", &body).await?;
        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
        }
        Ok(updates.into_iter().filter_map(event_from_update).collect())
    }

    async fn send_screen(&self, target: &ReplyTarget, screen: &Screen) -> anyhow::Result<()> {
        if target.is_callback() {
            self.edit_or_send(target, screen).await
        } else {
            self.send_message(target.chat_id, screen).await
        }
    }

    async fn send_notice(&self, target: &ReplyTarget, notice: &str) -> anyhow::Result<()> {
        match &target.callback_id {
            Some(callback_id) => self.answer_callback(callback_id, Some(notice)).await,
            None => self.send_message(target.chat_id, &Screen::new(notice)).await,
        }
    }

    async fn acknowledge(&self, target: &ReplyTarget) -> anyhow::Result<()> {
        match &target.callback_id {
            Some(callback_id) => self.answer_callback(callback_id, None).await,
            None => Ok(()),
        }
    }
}

pub(crate) fn event_from_update(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        // Buttons on messages too old for Telegram to attach arrive without
        // one; private chats share the user's id, so reply with a new message.
        let (chat_id, message_id) = match query.message {
            Some(message) => (message.chat.id, Some(message.message_id)),
            None => (query.from.id, None),
        };
        return Some(InboundEvent::Action {
            target: ReplyTarget {
                chat_id: ChatId(chat_id),
                message_id,
                callback_id: Some(query.id),
            },
            user_id: UserId(query.from.id),
            token: query.data.unwrap_or_default(),
        });
    }

    let message = update.message?;
    let text = message.text?;
    let from = message.from?;
    Some(InboundEvent::Text {
        target: ReplyTarget::chat(ChatId(message.chat.id)),
        user_id: UserId(from.id),
        display_name: from.first_name,
        text,
    })
}

/// `inline_keyboard` markup, or `None` for a screen without actions.
pub fn keyboard_json(screen: &Screen) -> Option<Value> {
    if screen.rows().is_empty() {
        return None;
    }
    let rows: Vec<Vec<Value>> = screen
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|action| match &action.target {
                    ActionTarget::Route(routed) => {
                        let token = routed.encode();
                        if token.len() > MAX_CALLBACK_DATA_BYTES {
                            warn!(%token, "callback data exceeds telegram limit");
                        }
                        json!({ "text": action.label, "callback_data": token })
                    }
                    ActionTarget::External(url) => json!({ "text": action.label, "url": url }),
                })
                .collect()
        })
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

#[cfg(test)]
#[path = "tests/telegram_tests.rs"]
mod tests;
