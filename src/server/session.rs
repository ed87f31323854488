use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Local};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Clone)]
struct Session {
    client_ip: String,
    created: Instant,
    created_at: DateTime<Local>,
    last_access: DateTime<Local>,
}

/// `/debug/session` 顯示用
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub client_ip: String,
    pub created_at: String,
    pub last_access: String,
    pub age_secs: u64,
    pub expires_in_secs: u64,
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 記憶體內的登入會話；自建立起算 `timeout` 後失效
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn create(&self, client_ip: &str) -> String {
        self.create_at(client_ip, Instant::now()).await
    }

    pub async fn create_at(&self, client_ip: &str, now: Instant) -> String {
        let id = new_token();
        let mut sessions = self.sessions.lock().await;
        Self::purge(&mut sessions, now, self.timeout);
        sessions.insert(
            id.clone(),
            Session {
                client_ip: client_ip.to_string(),
                created: now,
                created_at: Local::now(),
                last_access: Local::now(),
            },
        );
        tracing::info!("✅ Session created: {}... IP: {}", short(&id), client_ip);
        id
    }

    pub async fn validate(&self, id: &str) -> bool {
        self.validate_at(id, Instant::now()).await
    }

    pub async fn validate_at(&self, id: &str, now: Instant) -> bool {
        let mut sessions = self.sessions.lock().await;
        let Some(session) = sessions.get_mut(id) else {
            tracing::debug!("❌ Unknown session: {}...", short(id));
            return false;
        };

        if now.saturating_duration_since(session.created) > self.timeout {
            tracing::info!("⏰ Session expired: {}...", short(id));
            sessions.remove(id);
            return false;
        }

        session.last_access = Local::now();
        true
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id).is_some();
        if removed {
            tracing::info!("🧹 Session removed on logout: {}...", short(id));
        }
        removed
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock().await;
        Self::purge(&mut sessions, now, self.timeout)
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn info(&self, id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(id)?;
        let age = session.created.elapsed();
        Some(SessionInfo {
            client_ip: session.client_ip.clone(),
            created_at: session.created_at.to_rfc3339(),
            last_access: session.last_access.to_rfc3339(),
            age_secs: age.as_secs(),
            expires_in_secs: self.timeout.saturating_sub(age).as_secs(),
        })
    }

    fn purge(sessions: &mut HashMap<String, Session>, now: Instant, timeout: Duration) -> usize {
        let before = sessions.len();
        sessions.retain(|id, session| {
            let alive = now.saturating_duration_since(session.created) <= timeout;
            if !alive {
                tracing::info!("🧹 Expired session cleaned: {}...", short(id));
            }
            alive
        });
        before - sessions.len()
    }
}
