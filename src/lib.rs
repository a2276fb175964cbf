//! # svckit
//!
//! Utilities for building small internal services: configuration loading,
//! logging setup, HTTP plumbing on both sides, a concurrent string set, an
//! Elasticsearch query helper and a WeCom (corporate WeChat) REST client.
//!
//! # Modules
//!
//! - [`config`] — named-file configuration with search paths, defaults and
//!   an environment overlay
//! - [`logging`] — one-call `tracing` subscriber setup
//! - [`http`] — GET/POST request helpers and a minimal JSON API server with
//!   response-header plumbing
//! - [`set`] — [`StringSet`], a concurrent set of unique strings with
//!   union/minus/intersect
//! - [`elastic`] — search and count against an Elasticsearch cluster
//! - [`wechat`] — WeCom access tokens, group chat management and messages
//!
//! # Usage
//!
//! ```rust,ignore
//! use svckit::prelude::*;
//!
//! svckit::logging::init("info");
//! let settings = SettingsLoader::new("service").search_path("conf").load()?;
//!
//! let wechat = CorpWechatClient::new(
//!     settings.get_string("wecom.corp_id")?,
//!     settings.get_string("wecom.corp_secret")?,
//!     settings.get_int("wecom.agent_id")?,
//! );
//! wechat.send_text_message("zhangsan", "service started").await?;
//! ```

pub mod config;
pub mod elastic;
pub mod http;
pub mod logging;
pub mod set;
pub mod wechat;

pub use config::{Settings, SettingsLoader};
pub use elastic::{ElasticClient, ElasticConfig};
pub use http::server::{ApiServer, ResponseHeaders};
pub use set::StringSet;
pub use wechat::{ChatInfo, ChatMessage, CorpWechatClient};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{Settings, SettingsLoader};
    pub use crate::elastic::{ElasticClient, ElasticConfig};
    pub use crate::http::server::{ApiServer, ResponseHeaders};
    pub use crate::set::StringSet;
    pub use crate::wechat::{ChatInfo, ChatMessage, CorpWechatClient};
}
