//! WeCom (corporate WeChat) REST client
//!
//! Covers access token management with in-process caching, the appchat
//! create/get/update endpoints, group chat messages and app text messages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::set::StringSet;

const API_BASE: &str = "https://qyapi.weixin.qq.com/cgi-bin";

// =============================================================================
// Access Token Management
// =============================================================================

/// Cached access token with expiry tracking
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(access_token: String, expires_in_secs: u64) -> Self {
        // Refresh 5 minutes before expiry to be safe
        let buffer_secs = 300;
        let effective_expiry = expires_in_secs.saturating_sub(buffer_secs);
        Self {
            access_token,
            expires_at: Instant::now() + Duration::from_secs(effective_expiry),
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    errcode: i64,
    errmsg: String,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

// =============================================================================
// Wire Types
// =============================================================================

/// The errcode/errmsg envelope every WeCom endpoint responds with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Error code (0 means success)
    pub errcode: i64,
    /// Error message
    pub errmsg: String,
}

/// Group chat description used by the appchat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfo {
    pub name: String,
    pub owner: String,
    pub userlist: Vec<String>,
    pub chatid: String,
}

#[derive(Debug, Deserialize)]
struct ChatInfoResponse {
    errcode: i64,
    errmsg: String,
    chat_info: Option<ChatInfo>,
}

#[derive(Debug, Deserialize)]
struct CreateChatResponse {
    errcode: i64,
    errmsg: String,
    chatid: Option<String>,
}

/// Message payload for `appchat/send`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub chatid: String,
    pub msgtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textcard: Option<TextCard>,
    pub safe: i64,
}

impl ChatMessage {
    /// A plain text group message.
    pub fn text(chatid: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chatid: chatid.into(),
            msgtype: "text".to_string(),
            text: Some(TextContent {
                content: content.into(),
            }),
            textcard: None,
            safe: 0,
        }
    }

    /// A text card group message.
    pub fn text_card(chatid: impl Into<String>, card: TextCard) -> Self {
        Self {
            chatid: chatid.into(),
            msgtype: "textcard".to_string(),
            text: None,
            textcard: Some(card),
            safe: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextCard {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub btntxt: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// WeCom API client.
#[derive(Clone)]
pub struct CorpWechatClient {
    corp_id: String,
    corp_secret: String,
    agent_id: i64,
    http: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl CorpWechatClient {
    pub fn new(corp_id: String, corp_secret: String, agent_id: i64) -> Self {
        Self {
            corp_id,
            corp_secret,
            agent_id,
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing it when the cached one expired.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let guard = self.cached_token.read();
            if let Some(ref token) = *guard
                && token.is_valid()
            {
                debug!("using cached access token");
                return Ok(token.access_token.clone());
            }
        }

        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<String> {
        debug!("fetching new access token");

        let url = format!("{API_BASE}/gettoken");
        let response: TokenResponse = self
            .http
            .get(&url)
            .query(&[
                ("corpid", self.corp_id.as_str()),
                ("corpsecret", self.corp_secret.as_str()),
            ])
            .send()
            .await
            .context("token request failed")?
            .json()
            .await
            .context("failed to parse token response")?;

        if response.errcode != 0 {
            error!(
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "token request rejected"
            );
            return Err(anyhow!(
                "wecom token error {}: {}",
                response.errcode,
                response.errmsg
            ));
        }

        let token = response
            .access_token
            .ok_or_else(|| anyhow!("token response missing access_token"))?;
        let expires_in = response.expires_in.unwrap_or(7200);

        {
            let mut guard = self.cached_token.write();
            *guard = Some(CachedToken::new(token.clone(), expires_in));
        }

        info!(expires_in, "access token refreshed");
        Ok(token)
    }

    /// Create a group chat and return its chatid.
    ///
    /// errcode 86215 means the chatid or name is already taken.
    pub async fn create_chat(&self, chat: &ChatInfo) -> Result<String> {
        info!(
            chatid = %chat.chatid,
            name = %chat.name,
            owner = %chat.owner,
            users = chat.userlist.len(),
            "creating chat"
        );

        let token = self.get_access_token().await?;
        let url = format!("{API_BASE}/appchat/create?access_token={token}");
        let response: CreateChatResponse = self
            .http
            .post(&url)
            .json(chat)
            .send()
            .await
            .context("create chat request failed")?
            .json()
            .await
            .context("failed to parse create chat response")?;

        if response.errcode != 0 {
            warn!(
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "create chat rejected"
            );
            return Err(anyhow!(
                "wecom error {}: {}",
                response.errcode,
                response.errmsg
            ));
        }

        response
            .chatid
            .ok_or_else(|| anyhow!("create chat response missing chatid"))
    }

    /// Fetch a group chat. A rejected lookup means the chat does not exist.
    pub async fn get_chat(&self, chatid: &str) -> Result<Option<ChatInfo>> {
        let token = self.get_access_token().await?;
        let url = format!("{API_BASE}/appchat/get");
        let response: ChatInfoResponse = self
            .http
            .get(&url)
            .query(&[("access_token", token.as_str()), ("chatid", chatid)])
            .send()
            .await
            .context("get chat request failed")?
            .json()
            .await
            .context("failed to parse chat info response")?;

        if response.errcode != 0 {
            debug!(
                chatid,
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "chat lookup came back empty"
            );
            return Ok(None);
        }

        Ok(response.chat_info)
    }

    /// Update a group chat's name, owner and membership.
    ///
    /// The member changes are sent as add/remove lists, computed from the
    /// difference between the chat's current user list and `chat.userlist`.
    pub async fn update_chat(&self, chat: &ChatInfo) -> Result<()> {
        info!(chatid = %chat.chatid, name = %chat.name, "updating chat");

        let current = self
            .get_chat(&chat.chatid)
            .await?
            .ok_or_else(|| anyhow!("chat {} does not exist", chat.chatid))?;
        let (add_user_list, del_user_list) = user_list_diff(&current.userlist, &chat.userlist);

        let token = self.get_access_token().await?;
        let url = format!("{API_BASE}/appchat/update?access_token={token}");
        let body = serde_json::json!({
            "chatid": chat.chatid,
            "name": chat.name,
            "owner": chat.owner,
            "add_user_list": add_user_list,
            "del_user_list": del_user_list,
        });

        let response: ApiResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("update chat request failed")?
            .json()
            .await
            .context("failed to parse update chat response")?;

        if response.errcode != 0 {
            warn!(
                chatid = %chat.chatid,
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "update chat rejected"
            );
            return Err(anyhow!(
                "wecom error {}: {}",
                response.errcode,
                response.errmsg
            ));
        }

        info!(
            chatid = %chat.chatid,
            added = add_user_list.len(),
            removed = del_user_list.len(),
            "chat updated"
        );
        Ok(())
    }

    /// Send a message to a group chat.
    pub async fn send_chat_message(&self, message: &ChatMessage) -> Result<()> {
        debug!(
            chatid = %message.chatid,
            msgtype = %message.msgtype,
            "sending chat message"
        );

        let token = self.get_access_token().await?;
        let url = format!("{API_BASE}/appchat/send?access_token={token}");
        let response: ApiResponse = self
            .http
            .post(&url)
            .json(message)
            .send()
            .await
            .context("send chat message request failed")?
            .json()
            .await
            .context("failed to parse chat message response")?;

        if response.errcode != 0 {
            warn!(
                chatid = %message.chatid,
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "send chat message rejected"
            );
            return Err(anyhow!(
                "wecom error {}: {}",
                response.errcode,
                response.errmsg
            ));
        }

        info!(chatid = %message.chatid, "chat message sent");
        Ok(())
    }

    /// Send a plain text message to a single user through the app.
    pub async fn send_text_message(&self, user_id: &str, content: &str) -> Result<()> {
        debug!(user_id, chars = content.len(), "sending text message");

        let token = self.get_access_token().await?;
        let url = format!("{API_BASE}/message/send?access_token={token}");
        let body = serde_json::json!({
            "touser": user_id,
            "msgtype": "text",
            "agentid": self.agent_id,
            "text": { "content": content },
            "safe": 0,
        });

        let response: ApiResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("send text message request failed")?
            .json()
            .await
            .context("failed to parse text message response")?;

        if response.errcode != 0 {
            warn!(
                user_id,
                errcode = response.errcode,
                errmsg = %response.errmsg,
                "send text message rejected"
            );
            return Err(anyhow!(
                "wecom error {}: {}",
                response.errcode,
                response.errmsg
            ));
        }

        info!(user_id, "text message sent");
        Ok(())
    }
}

/// Users to add and to remove to get from `old` to `new`, sorted for
/// deterministic request bodies.
fn user_list_diff(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set = StringSet::new(old.iter().cloned());
    let new_set = StringSet::new(new.iter().cloned());
    let to_add = new_set.minus([&old_set]).to_sorted_vec();
    let to_remove = old_set.minus([&new_set]).to_sorted_vec();
    (to_add, to_remove)
}

// =============================================================================
// Tests
// =============================================================================
