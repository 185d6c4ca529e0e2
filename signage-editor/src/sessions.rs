//! Several editors open at once (multi-preview). Each session owns its own controller and
//! frame, so element identities never collide across sessions.

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::EditorConfig;
use crate::controller::HostController;
use crate::frame::FrameHandle;

#[derive(Clone)]
pub struct EditorSession {
    pub id: Uuid,
    pub controller: Arc<HostController>,
    pub frame: FrameHandle,
}

pub struct SessionStore {
    config: EditorConfig,
    sessions: DashMap<Uuid, EditorSession>,
}

impl SessionStore {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Mount `template_html` in a new session.
    pub fn open(&self, template_html: &str) -> EditorSession {
        let id = Uuid::new_v4();
        let controller = Arc::new(HostController::new(self.config.clone()));
        let frame = controller.mount(template_html);
        let session = EditorSession {
            id,
            controller,
            frame,
        };
        self.sessions.insert(id, session.clone());
        tracing::debug!(session_id = %id, "editor session opened");
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<EditorSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Close and forget a session. Returns false for unknown ids.
    pub fn close(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.controller.close();
                tracing::debug!(session_id = %id, "editor session closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_get_close() {
        let store = SessionStore::default();
        let a = store.open("<body><p data-editable=\"true\">a</p></body>");
        let b = store.open("<body><p data-editable=\"true\">b</p></body>");
        assert_eq!(store.len(), 2);
        assert_ne!(a.id, b.id);

        a.controller.wait_ready().await.unwrap();
        assert!(store.get(&a.id).is_some());
        assert!(store.close(&a.id));
        assert!(!store.close(&a.id));
        assert_eq!(store.ids(), vec![b.id]);
    }
}
