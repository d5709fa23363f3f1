//! Conversation log backends.

pub mod sqlite;
pub mod supabase;

pub use sqlite::SqliteLog;
pub use supabase::SupabaseLog;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dashchat_core::config::{StoreBackend, StoreSettings};
use dashchat_core::conversation::ConversationLog;
use dashchat_core::error::{DashChatError, Result};

/// Build the configured conversation log.
pub fn from_settings(settings: &StoreSettings, timeout: Duration) -> Result<Arc<dyn ConversationLog>> {
    match settings.backend {
        StoreBackend::Supabase => {
            let (Some(url), Some(key)) = (settings.url.as_deref(), settings.key.as_deref()) else {
                return Err(DashChatError::Config(
                    "SUPABASE_URL and SUPABASE_KEY are required for the supabase store".to_string(),
                ));
            };
            tracing::info!("Conversation log: Supabase at {}", url);
            Ok(Arc::new(SupabaseLog::with_timeout(url, key, timeout)))
        }
        StoreBackend::Sqlite => match settings.sqlite_path.as_deref() {
            Some(path) => {
                tracing::info!("Conversation log: SQLite at {}", path);
                Ok(Arc::new(SqliteLog::open(Path::new(path))?))
            }
            None => {
                tracing::info!("Conversation log: in-memory SQLite");
                Ok(Arc::new(SqliteLog::in_memory()?))
            }
        },
    }
}
