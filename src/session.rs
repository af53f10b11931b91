//! One drafting session.
//!
//! Owns the ingested record, the conversation state and the current reply,
//! and drives the workflow: ingest, generate (recomposing the threaded
//! document on every streamed increment), revise, export. The record and
//! conversation belong to exactly this session and are never shared.

use std::sync::Arc;
use std::time::Duration;

use crate::ai::{
    CompletionBackend, Conversation, GenerationHandle, GenerationPool, StreamUpdate, prompts,
    split_reasoning,
};
use crate::compose::{self, ComposedThread};
use crate::config::{GenerationConfig, IdentityConfig};
use crate::constants::POLL_TIMEOUT_MS;
use crate::error::{DraftError, Result};
use crate::export;
use crate::mail::{DocumentParser, EmailRecord, validate_upload};
use crate::workflow::{Panel, Stage, StageTracker};

/// Outcome of one bounded poll of the in-flight generation.
#[derive(Debug)]
pub enum SessionEvent {
    /// New text arrived; the composed thread was refreshed.
    Progress,
    /// Generation finished; the session moved to Review.
    Completed,
    /// Terminal failure for this attempt. The generation action is available
    /// again; output rendered so far is preserved.
    Failed(String),
    /// Nothing arrived within the poll window.
    Idle,
}

pub struct Session<B: CompletionBackend> {
    pool: Arc<GenerationPool<B>>,
    identity: IdentityConfig,
    generation: GenerationConfig,
    tracker: StageTracker,
    record: Option<EmailRecord>,
    conversation: Option<Conversation>,
    reply: String,
    reasoning: Option<String>,
    revision: bool,
    key_messages: String,
    active: Option<GenerationHandle>,
    composed: Option<ComposedThread>,
    last_error: Option<String>,
}

impl<B: CompletionBackend> Session<B> {
    pub fn new(
        pool: Arc<GenerationPool<B>>,
        identity: IdentityConfig,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            pool,
            identity,
            generation,
            tracker: StageTracker::new(),
            record: None,
            conversation: None,
            reply: String::new(),
            reasoning: None,
            revision: false,
            key_messages: String::new(),
            active: None,
            composed: None,
            last_error: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.tracker.current()
    }

    pub fn visible_panels(&self) -> &'static [Panel] {
        self.tracker.visible_panels()
    }

    pub fn record(&self) -> Option<&EmailRecord> {
        self.record.as_ref()
    }

    pub fn reply(&self) -> &str {
        &self.reply
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn composed(&self) -> Option<&ComposedThread> {
        self.composed.as_ref()
    }

    #[allow(dead_code)]
    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    #[allow(dead_code)]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[allow(dead_code)]
    pub fn is_generating(&self) -> bool {
        self.active.is_some()
    }

    #[allow(dead_code)]
    pub fn in_revision(&self) -> bool {
        self.revision
    }

    /// Key messages the current conversation was started from.
    #[allow(dead_code)]
    pub fn key_messages(&self) -> &str {
        &self.key_messages
    }

    /// Ingest one uploaded document. Validation failures and parse errors
    /// surface before any background work and put the session back on a
    /// clean Upload stage.
    pub fn ingest(
        &mut self,
        filename: &str,
        payload: &[u8],
        parser: &dyn DocumentParser,
    ) -> Result<&EmailRecord> {
        let parsed = validate_upload(filename, payload.len() as u64, parser)
            .and_then(|_| parser.parse(payload));

        match parsed {
            Ok(record) => {
                self.clear_generation_state();
                self.tracker.ingestion_succeeded();
                Ok(self.record.insert(record))
            }
            Err(e) => {
                self.clear_generation_state();
                self.record = None;
                self.tracker.ingestion_failed();
                Err(e)
            }
        }
    }

    /// Start a fresh reply generation from the key messages.
    pub async fn begin_reply(&mut self, key_messages: &str, model: &str) -> Result<()> {
        if self.active.is_some() {
            return Err(DraftError::Backend(
                "a generation is already in flight".to_string(),
            ));
        }
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| DraftError::Ingestion("no message has been ingested".to_string()))?;

        let system = prompts::system_context(
            record,
            &self.identity,
            &self.generation.instructions,
            self.generation.email_token_limit,
        );
        let conversation =
            Conversation::start(system, prompts::key_messages_turn(key_messages));

        let handle = self.pool.submit(&conversation, model).await?;

        self.conversation = Some(conversation);
        self.revision = false;
        self.key_messages = key_messages.to_string();
        self.reply.clear();
        self.reasoning = None;
        self.composed = None;
        self.last_error = None;
        self.active = Some(handle);
        Ok(())
    }

    /// Revision round: the prior completed reply stays in the conversation
    /// and the instructions modify it rather than replace it.
    pub async fn request_revision(&mut self, instructions: &str, model: &str) -> Result<()> {
        if self.active.is_some() {
            return Err(DraftError::Backend(
                "a generation is already in flight".to_string(),
            ));
        }
        if self.reply.trim().is_empty() {
            return Err(DraftError::Backend(
                "no completed reply to revise".to_string(),
            ));
        }
        let Some(conversation) = self.conversation.as_mut() else {
            return Err(DraftError::Backend(
                "no conversation to extend".to_string(),
            ));
        };

        conversation.add_revision(&self.reply, instructions);
        let handle = self.pool.submit(conversation, model).await?;

        self.revision = true;
        self.reply.clear();
        self.reasoning = None;
        self.composed = None;
        self.last_error = None;
        self.active = Some(handle);
        Ok(())
    }

    /// One bounded poll of the in-flight generation. Never blocks longer
    /// than the poll window; an empty poll reports [`SessionEvent::Idle`].
    pub async fn poll(&mut self) -> SessionEvent {
        let Some(handle) = self.active.as_mut() else {
            return SessionEvent::Idle;
        };

        match handle.poll(Duration::from_millis(POLL_TIMEOUT_MS)).await {
            None => SessionEvent::Idle,
            Some(StreamUpdate::Chunk { text, done }) => {
                let (visible, reasoning) = split_reasoning(&text);
                self.reply = visible;
                self.reasoning = reasoning;
                self.recompose();

                if done {
                    self.active = None;
                    self.tracker.generation_completed();
                    SessionEvent::Completed
                } else {
                    SessionEvent::Progress
                }
            }
            Some(StreamUpdate::Error { message }) => {
                // Terminal for this attempt. Rendered output stays; the
                // generation action is available again.
                self.active = None;
                self.last_error = Some(message.clone());
                SessionEvent::Failed(message)
            }
        }
    }

    /// Explicit stage navigation with the reset semantics of each target.
    /// Returns false for a locked stage (nothing changes).
    pub fn navigate(&mut self, target: Stage) -> bool {
        if !self.tracker.navigate(target) {
            return false;
        }
        match target {
            Stage::Upload => {
                // Full reset.
                self.record = None;
                self.clear_generation_state();
            }
            Stage::Compose => {
                // Keep the record, drop everything generated.
                self.clear_generation_state();
            }
            Stage::Review => {}
        }
        true
    }

    /// Serialize the finalized thread as a draft file.
    /// Returns the suggested filename and the file contents.
    pub fn export_draft(&self) -> Result<(String, String)> {
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| DraftError::Composition("no message to reply to".to_string()))?;
        let thread = self
            .composed
            .as_ref()
            .ok_or_else(|| DraftError::Composition("no composed reply to export".to_string()))?;

        let eml = export::draft_eml(thread, &self.identity)?;
        Ok((export::draft_filename(record.subject_or_placeholder()), eml))
    }

    /// Recompute the composed thread from the current reply. Runs on every
    /// increment; a composition failure degrades to the plain fallback
    /// instead of aborting the stream.
    fn recompose(&mut self) {
        let Some(record) = self.record.as_ref() else {
            return;
        };
        if self.reply.trim().is_empty() {
            self.composed = None;
            return;
        }

        self.composed = Some(
            match compose::compose_thread(&self.reply, record, &self.identity.email) {
                Ok(thread) => thread,
                Err(e) => {
                    tracing::warn!("composition failed, degrading to plain rendering: {e}");
                    compose::plain_fallback(&self.reply, record, &self.identity.email)
                }
            },
        );
    }

    fn clear_generation_state(&mut self) {
        self.conversation = None;
        self.reply.clear();
        self.reasoning = None;
        self.revision = false;
        self.key_messages.clear();
        self.composed = None;
        self.last_error = None;
        // Dropping the handle abandons consumption; the pool task still
        // runs to completion and its output is discarded.
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::backend::testing::ScriptedBackend;
    use crate::mail::EmlParser;

    const SAMPLE: &[u8] = b"From: Alice <a@x.com>\r\n\
To: Bob <b@x.com>\r\n\
Cc: Alice <a@x.com>, Carol <c@x.com>\r\n\
Subject: Quarterly Report\r\n\
Date: Tue, 3 Jun 2025 18:26:00 +0800\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please review the numbers.\r\n";

    fn session(backend: ScriptedBackend) -> Session<ScriptedBackend> {
        let pool = Arc::new(GenerationPool::with_workers(Arc::new(backend), 1));
        Session::new(
            pool,
            IdentityConfig {
                name: "Bob".to_string(),
                email: "b@x.com".to_string(),
            },
            GenerationConfig::default(),
        )
    }

    async fn drive(session: &mut Session<ScriptedBackend>) -> SessionEvent {
        loop {
            match session.poll().await {
                SessionEvent::Idle | SessionEvent::Progress => continue,
                terminal => return terminal,
            }
        }
    }

    #[tokio::test]
    async fn test_full_workflow_to_export() {
        let mut session = session(ScriptedBackend::completing(vec![
            "Dear Alice,\n\n",
            "Thanks, **confirmed**.",
        ]));

        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();
        assert_eq!(session.stage(), Stage::Compose);

        session.begin_reply("confirm receipt", "test-model").await.unwrap();
        assert!(session.is_generating());

        let outcome = drive(&mut session).await;
        assert!(matches!(outcome, SessionEvent::Completed));
        assert_eq!(session.stage(), Stage::Review);
        assert!(!session.is_generating());

        let thread = session.composed().unwrap();
        assert_eq!(thread.subject, "RE: Quarterly Report");
        assert_eq!(thread.to.address, "a@x.com");
        assert_eq!(thread.cc.len(), 1);
        assert_eq!(thread.cc[0].address, "c@x.com");

        let (filename, eml) = session.export_draft().unwrap();
        assert!(filename.starts_with("Draft_Quarterly_Report_"));
        assert!(eml.contains("X-Unsent: 1"));
        assert!(eml.contains("multipart/alternative"));
    }

    #[tokio::test]
    async fn test_revision_extends_conversation() {
        let mut session = session(ScriptedBackend::completing(vec!["First draft."]));
        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();
        session.begin_reply("confirm", "m").await.unwrap();
        drive(&mut session).await;

        assert!(!session.in_revision());
        assert_eq!(session.conversation().unwrap().len(), 2);

        session.request_revision("shorter please", "m").await.unwrap();
        assert!(session.in_revision());
        assert_eq!(session.conversation().unwrap().len(), 4);

        let outcome = drive(&mut session).await;
        assert!(matches!(outcome, SessionEvent::Completed));
        assert_eq!(session.reply(), "First draft.");
    }

    #[tokio::test]
    async fn test_backend_unavailable_holds_at_compose() {
        let mut session = session(ScriptedBackend::unhealthy());
        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();

        let result = session.begin_reply("confirm", "m").await;
        assert!(matches!(result, Err(DraftError::BackendUnavailable(_))));
        assert_eq!(session.stage(), Stage::Compose);
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_preserves_partial_output() {
        let mut session = session(ScriptedBackend::failing(vec!["Partial reply."], "boom"));
        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();
        session.begin_reply("confirm", "m").await.unwrap();

        let outcome = drive(&mut session).await;
        assert!(matches!(outcome, SessionEvent::Failed(ref m) if m.contains("boom")));

        // Output rendered before the error is preserved, and the action is
        // available again.
        assert_eq!(session.reply(), "Partial reply.");
        assert!(session.composed().is_some());
        assert!(!session.is_generating());
        assert_eq!(session.stage(), Stage::Compose);
        assert!(session.last_error().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_reasoning_is_split_from_reply() {
        let mut session = session(ScriptedBackend::completing(vec![
            "<think>keep it brief</think>",
            "Dear Alice, done.",
        ]));
        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();
        session.begin_reply("confirm", "m").await.unwrap();
        drive(&mut session).await;

        assert_eq!(session.reply(), "Dear Alice, done.");
        assert_eq!(session.reasoning(), Some("keep it brief"));
        let thread = session.composed().unwrap();
        assert!(!thread.html.contains("keep it brief"));
        assert!(!thread.plain.contains("keep it brief"));
    }

    #[tokio::test]
    async fn test_ingest_failure_resets_to_upload() {
        let mut session = session(ScriptedBackend::completing(vec!["x"]));
        let result = session.ingest("mail.eml", &[0x84, 0x85, 0x86], &EmlParser);
        assert!(matches!(result, Err(DraftError::Ingestion(_))));
        assert_eq!(session.stage(), Stage::Upload);
        assert!(session.record().is_none());
    }

    #[tokio::test]
    async fn test_wrong_extension_rejected_before_parsing() {
        let mut session = session(ScriptedBackend::completing(vec!["x"]));
        let result = session.ingest("mail.pdf", SAMPLE, &EmlParser);
        assert!(matches!(result, Err(DraftError::Ingestion(_))));
    }

    #[tokio::test]
    async fn test_upload_navigation_is_full_reset() {
        let mut session = session(ScriptedBackend::completing(vec!["Reply text."]));
        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();
        session.begin_reply("confirm", "m").await.unwrap();
        drive(&mut session).await;

        assert!(session.navigate(Stage::Upload));
        assert_eq!(session.stage(), Stage::Upload);
        assert!(session.record().is_none());
        assert!(session.conversation().is_none());
        assert!(session.reply().is_empty());
        assert!(!session.in_revision());
        assert!(session.composed().is_none());
    }

    #[tokio::test]
    async fn test_compose_navigation_keeps_record() {
        let mut session = session(ScriptedBackend::completing(vec!["Reply text."]));
        session.ingest("mail.eml", SAMPLE, &EmlParser).unwrap();
        session.begin_reply("confirm", "m").await.unwrap();
        drive(&mut session).await;
        assert_eq!(session.stage(), Stage::Review);

        assert!(session.navigate(Stage::Compose));
        assert_eq!(session.stage(), Stage::Compose);
        assert!(session.record().is_some());
        assert!(session.conversation().is_none());
        assert!(session.reply().is_empty());
        assert!(!session.in_revision());
        assert!(session.key_messages().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_to_locked_stage_is_noop() {
        let mut session = session(ScriptedBackend::completing(vec!["x"]));
        assert!(!session.navigate(Stage::Review));
        assert_eq!(session.stage(), Stage::Upload);
    }
}
