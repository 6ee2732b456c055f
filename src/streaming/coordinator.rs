//! Stream Coordinator
//!
//! Owns one generation session end to end: drives the provider call,
//! decodes tool invocations, fans artifact handlers out as tasks, folds
//! every resulting event into a single ordered stream, and persists that
//! stream through the resumable store before any subscriber sees it.
//!
//! Ordering contract: the subscriber lock is held across the
//! append-then-broadcast of every event, and attaching a subscriber holds
//! the same lock across its replay read. A subscriber therefore sees every
//! persisted event exactly once, in sequence order, with no gap between
//! replay and live delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loomchat_core::{ArtifactKind, SequencedEvent, StreamEvent, Suggestion, TransportEvent};

use crate::artifacts::ArtifactKindRegistry;
use crate::models::{ArtifactDocument, Session, SessionState};
use crate::provider::{GenerationProvider, GenerationRequest, RawIncrement, StopReason};
use crate::schema::tools;
use crate::storage::{DocumentPersistence, ResumableStreamStore};
use crate::streaming::parser::{parse_tool_call, ToolInvocation};
use crate::streaming::suggestions;
use crate::utils::error::AppResult;

/// Coordinator tuning knobs.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Hard wall-clock limit for one session.
    pub max_session_duration: Duration,
    /// Per-subscriber channel headroom beyond the replayed backlog.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_session_duration: Duration::from_secs(120),
            channel_capacity: 256,
        }
    }
}

/// One subscriber's view of a session stream.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::Receiver<TransportEvent>,
}

impl Subscription {
    /// Replay-only subscription over an already-terminal session.
    pub(crate) fn replay(events: Vec<SequencedEvent>) -> Self {
        let (tx, receiver) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers the full backlog, so this cannot fail.
            let _ = tx.try_send(TransportEvent::stored(event));
        }
        Self { receiver }
    }

    /// Next event, or `None` once the stream is exhausted.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.receiver.recv().await
    }

    /// Adapt into a `Stream` for transport layers.
    pub fn into_stream(self) -> ReceiverStream<TransportEvent> {
        ReceiverStream::new(self.receiver)
    }
}

struct SubscriberHandle {
    id: u64,
    tx: mpsc::Sender<TransportEvent>,
}

/// State shared between the running coordinator and its session handles.
struct Shared {
    session_id: String,
    store: Arc<dyn ResumableStreamStore>,
    subscribers: Mutex<Vec<SubscriberHandle>>,
    next_seq: AtomicU64,
    next_subscriber_id: AtomicU64,
    headroom: usize,
    cancel: CancellationToken,
}

impl Shared {
    /// Persist (unless transient) and broadcast one event.
    async fn emit(&self, event: StreamEvent) -> AppResult<()> {
        let mut subscribers = self.subscribers.lock().await;

        let transport = if event.is_transient() {
            TransportEvent::transient(event)
        } else {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            let sequenced = SequencedEvent::new(seq, event);
            self.store.append(&self.session_id, &sequenced).await?;
            TransportEvent::stored(sequenced)
        };

        Self::broadcast(&mut subscribers, &transport);
        Ok(())
    }

    fn broadcast(subscribers: &mut Vec<SubscriberHandle>, event: &TransportEvent) {
        subscribers.retain(|sub| match sub.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscriber = sub.id, "subscriber lagging, detaching");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(subscriber = sub.id, "subscriber disconnected");
                false
            }
        });
    }

    /// Attach a live subscriber, replaying everything past `after_seq`.
    async fn attach(&self, after_seq: u64) -> AppResult<Subscription> {
        let mut subscribers = self.subscribers.lock().await;

        let backlog = self.store.read_from(&self.session_id, after_seq).await?;
        let (tx, receiver) = mpsc::channel(backlog.len() + self.headroom.max(1));
        for event in backlog {
            let _ = tx.try_send(TransportEvent::stored(event));
        }

        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        subscribers.push(SubscriberHandle { id, tx });
        Ok(Subscription { receiver })
    }
}

/// Handle onto a running session, cloneable across transports.
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub chat_id: String,
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Subscribe from a resumption cursor (`0` for the full stream).
    pub async fn subscribe(&self, after_seq: u64) -> AppResult<Subscription> {
        self.shared.attach(after_seq).await
    }

    /// Request cancellation of the running session.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }
}

/// An in-flight artifact generation spawned from a tool call.
struct ArtifactTask {
    document_id: String,
    kind: ArtifactKind,
    title: String,
    /// Latest persisted version when this is an update.
    prior: Option<ArtifactDocument>,
    join: JoinHandle<AppResult<String>>,
}

struct FinishedArtifact {
    document_id: String,
    kind: ArtifactKind,
    title: String,
    prior: Option<ArtifactDocument>,
    content: String,
}

type SuggestionTask = JoinHandle<AppResult<Vec<Suggestion>>>;

/// Drives one session from request to terminal state.
pub struct StreamCoordinator {
    provider: Arc<dyn GenerationProvider>,
    registry: Arc<ArtifactKindRegistry>,
    documents: Arc<dyn DocumentPersistence>,
    session: Session,
    shared: Arc<Shared>,
    config: StreamConfig,
}

impl StreamCoordinator {
    pub fn new(
        session: Session,
        provider: Arc<dyn GenerationProvider>,
        registry: Arc<ArtifactKindRegistry>,
        store: Arc<dyn ResumableStreamStore>,
        documents: Arc<dyn DocumentPersistence>,
        config: StreamConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            session_id: session.id.clone(),
            store,
            subscribers: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(1),
            next_subscriber_id: AtomicU64::new(1),
            headroom: config.channel_capacity,
            cancel: CancellationToken::new(),
        });
        Self {
            provider,
            registry,
            documents,
            session,
            shared,
            config,
        }
    }

    /// Handle for subscribing to and cancelling this session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.session.id.clone(),
            chat_id: self.session.chat_id.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Run the session to completion.
    ///
    /// Returns the terminal state reached, or an error if the store itself
    /// failed (in which case no terminal state was recorded).
    pub async fn run(self, prompt: impl Into<String>) -> AppResult<SessionState> {
        self.shared.store.register(&self.session).await?;
        info!(session_id = %self.session.id, chat_id = %self.session.chat_id, "session started");

        let request = GenerationRequest {
            prompt: prompt.into(),
            system: None,
            schema: None,
            tools: tools::tool_definitions(),
        };

        let (incr_tx, incr_rx) = mpsc::channel::<RawIncrement>(64);
        let provider = self.provider.clone();
        let call = tokio::spawn(async move { provider.stream(request, incr_tx).await });

        // Handlers and suggestion tasks feed their events back through the
        // sink; the coordinator's clone is dropped once the provider is done
        // so the channel closes when the last task finishes.
        let (sink_tx, mut sink_rx) = mpsc::channel::<StreamEvent>(64);
        let mut sink_tx = Some(sink_tx);
        let mut incr_rx = Some(incr_rx);

        let mut artifacts: Vec<ArtifactTask> = Vec::new();
        let mut suggestion_tasks: Vec<SuggestionTask> = Vec::new();

        let deadline = tokio::time::sleep(self.config.max_session_duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => {
                    call.abort();
                    return self.abort("cancelled", artifacts, suggestion_tasks).await;
                }
                _ = &mut deadline => {
                    call.abort();
                    return self
                        .abort("exceeded maximum duration", artifacts, suggestion_tasks)
                        .await;
                }
                event = sink_rx.recv() => match event {
                    Some(event) => self.shared.emit(event).await?,
                    // Every task is done and the provider stream has ended.
                    None => break,
                },
                increment = recv_opt(&mut incr_rx), if incr_rx.is_some() => match increment {
                    Some(RawIncrement::Text(content)) => {
                        self.shared.emit(StreamEvent::TextDelta { content }).await?;
                    }
                    Some(RawIncrement::Structured(_)) => {
                        debug!(session_id = %self.session.id,
                            "ignoring structured increment on the conversational stream");
                    }
                    Some(RawIncrement::ToolCall { name, arguments }) => {
                        if let Some(sink) = sink_tx.as_ref() {
                            self.on_tool_call(
                                &name,
                                &arguments,
                                sink,
                                &mut artifacts,
                                &mut suggestion_tasks,
                            )
                            .await?;
                        }
                    }
                    None => {
                        incr_rx = None;
                        sink_tx = None;
                    }
                },
            }
        }

        let stop = match call.await {
            Ok(Ok(stop)) => stop,
            Ok(Err(err)) => {
                warn!(session_id = %self.session.id, error = %err, "generation failed");
                return self.abort("generation failed", artifacts, suggestion_tasks).await;
            }
            Err(err) => {
                warn!(session_id = %self.session.id, error = %err, "generation task panicked");
                return self.abort("generation failed", artifacts, suggestion_tasks).await;
            }
        };

        self.finalize(stop, artifacts, suggestion_tasks).await
    }

    /// Decode and dispatch one tool call. Invalid calls surface a visible
    /// error event and leave the session running; only store failures
    /// propagate.
    async fn on_tool_call(
        &self,
        name: &str,
        arguments: &Value,
        sink: &mpsc::Sender<StreamEvent>,
        artifacts: &mut Vec<ArtifactTask>,
        suggestion_tasks: &mut Vec<SuggestionTask>,
    ) -> AppResult<()> {
        let invocation = match parse_tool_call(name, arguments) {
            Ok(invocation) => invocation,
            Err(err) => {
                warn!(session_id = %self.session.id, tool = name, error = %err,
                    "rejecting malformed tool call");
                return self
                    .shared
                    .emit(StreamEvent::Error {
                        message: format!("The '{}' request was invalid and was skipped.", name),
                    })
                    .await;
            }
        };

        match invocation {
            ToolInvocation::CreateDocument(args) => {
                // A kind with no handler is a deployment misconfiguration,
                // not a user error.
                let handler = self.registry.get(args.kind)?;

                let document_id = uuid::Uuid::new_v4().to_string();
                self.shared
                    .emit(StreamEvent::ArtifactKindTag { kind: args.kind })
                    .await?;
                self.shared
                    .emit(StreamEvent::ArtifactId {
                        document_id: document_id.clone(),
                    })
                    .await?;
                self.shared
                    .emit(StreamEvent::ArtifactTitle {
                        title: args.title.clone(),
                    })
                    .await?;

                let sink = sink.clone();
                let title = args.title.clone();
                let join = tokio::spawn(async move { handler.on_create(&title, &sink).await });
                artifacts.push(ArtifactTask {
                    document_id,
                    kind: args.kind,
                    title: args.title,
                    prior: None,
                    join,
                });
            }

            ToolInvocation::UpdateDocument(args) => {
                let prior = match self.documents.get_document_by_id(&args.id).await? {
                    Some(prior) => prior,
                    None => {
                        return self
                            .shared
                            .emit(StreamEvent::Error {
                                message: format!("Document '{}' was not found.", args.id),
                            })
                            .await;
                    }
                };
                let handler = self.registry.get(prior.kind)?;

                // Reset the pane before the rewrite starts streaming.
                self.shared.emit(StreamEvent::Clear).await?;
                self.shared
                    .emit(StreamEvent::ArtifactKindTag { kind: prior.kind })
                    .await?;
                self.shared
                    .emit(StreamEvent::ArtifactId {
                        document_id: prior.id.clone(),
                    })
                    .await?;
                self.shared
                    .emit(StreamEvent::ArtifactTitle {
                        title: prior.title.clone(),
                    })
                    .await?;

                let sink = sink.clone();
                let content = prior.content.clone();
                let description = args.description;
                let join = tokio::spawn(async move {
                    handler.on_update(&content, &description, &sink).await
                });
                artifacts.push(ArtifactTask {
                    document_id: prior.id.clone(),
                    kind: prior.kind,
                    title: prior.title.clone(),
                    prior: Some(prior),
                    join,
                });
            }

            ToolInvocation::RequestSuggestions(args) => {
                let document = match self.documents.get_document_by_id(&args.document_id).await? {
                    Some(document) => document,
                    None => {
                        return self
                            .shared
                            .emit(StreamEvent::Error {
                                message: format!(
                                    "Document '{}' was not found.",
                                    args.document_id
                                ),
                            })
                            .await;
                    }
                };

                let provider = self.provider.clone();
                let sink = sink.clone();
                let join = tokio::spawn(async move {
                    suggestions::generate(provider, &document, &sink).await
                });
                suggestion_tasks.push(join);
            }
        }
        Ok(())
    }

    /// Join every sub-task, persist the results, and close the stream.
    /// Nothing is persisted if any sub-task failed.
    async fn finalize(
        &self,
        stop: StopReason,
        artifacts: Vec<ArtifactTask>,
        suggestion_tasks: Vec<SuggestionTask>,
    ) -> AppResult<SessionState> {
        let mut artifacts = artifacts;
        let mut finished: Vec<FinishedArtifact> = Vec::new();
        while let Some(task) = artifacts.pop() {
            let ArtifactTask {
                document_id,
                kind,
                title,
                prior,
                join,
            } = task;
            match join.await {
                Ok(Ok(content)) => finished.push(FinishedArtifact {
                    document_id,
                    kind,
                    title,
                    prior,
                    content,
                }),
                Ok(Err(err)) => {
                    warn!(session_id = %self.session.id, error = %err,
                        "artifact generation failed");
                    return self
                        .abort("artifact generation failed", artifacts, suggestion_tasks)
                        .await;
                }
                Err(err) => {
                    warn!(session_id = %self.session.id, error = %err,
                        "artifact task panicked");
                    return self
                        .abort("artifact generation failed", artifacts, suggestion_tasks)
                        .await;
                }
            }
        }

        let mut suggestion_tasks = suggestion_tasks;
        let mut all_suggestions: Vec<Suggestion> = Vec::new();
        while let Some(join) = suggestion_tasks.pop() {
            match join.await {
                Ok(Ok(mut suggestions)) => all_suggestions.append(&mut suggestions),
                Ok(Err(err)) => {
                    warn!(session_id = %self.session.id, error = %err,
                        "suggestion generation failed");
                    return self
                        .abort("suggestion generation failed", Vec::new(), suggestion_tasks)
                        .await;
                }
                Err(err) => {
                    warn!(session_id = %self.session.id, error = %err,
                        "suggestion task panicked");
                    return self
                        .abort("suggestion generation failed", Vec::new(), suggestion_tasks)
                        .await;
                }
            }
        }

        // Finalization order: documents become visible before suggestions
        // that reference them.
        for artifact in finished.into_iter().rev() {
            let document = match artifact.prior {
                Some(prior) => prior.next_version(artifact.content),
                None => ArtifactDocument::first_version(
                    artifact.document_id,
                    self.session.chat_id.clone(),
                    artifact.kind,
                    artifact.title,
                    artifact.content,
                ),
            };
            self.documents.save_document(&document).await?;
        }
        if !all_suggestions.is_empty() {
            self.documents.save_suggestions(&all_suggestions).await?;
        }

        self.shared
            .emit(StreamEvent::Finish {
                stop_reason: Some(stop.as_str().to_string()),
            })
            .await?;
        self.shared
            .store
            .mark_terminal(&self.session.id, SessionState::Completed)
            .await?;
        info!(session_id = %self.session.id, "session completed");
        Ok(SessionState::Completed)
    }

    /// Tear the session down: cancel outstanding work, surface a generic
    /// error marker to subscribers, and record the aborted state. Internal
    /// failure details go to the log, never onto the stream.
    async fn abort(
        &self,
        reason: &str,
        artifacts: Vec<ArtifactTask>,
        suggestion_tasks: Vec<SuggestionTask>,
    ) -> AppResult<SessionState> {
        warn!(session_id = %self.session.id, reason, "aborting session");
        self.shared.cancel.cancel();
        for task in &artifacts {
            task.join.abort();
        }
        for join in &suggestion_tasks {
            join.abort();
        }

        let marker = StreamEvent::Error {
            message: "Generation was interrupted.".to_string(),
        };
        if let Err(err) = self.shared.emit(marker).await {
            warn!(session_id = %self.session.id, error = %err,
                "failed to record abort marker");
        }
        let finish = StreamEvent::Finish {
            stop_reason: Some("aborted".to_string()),
        };
        if let Err(err) = self.shared.emit(finish).await {
            warn!(session_id = %self.session.id, error = %err,
                "failed to record abort finish");
        }
        self.shared
            .store
            .mark_terminal(&self.session.id, SessionState::Aborted)
            .await?;
        Ok(SessionState::Aborted)
    }
}

async fn recv_opt(rx: &mut Option<mpsc::Receiver<RawIncrement>>) -> Option<RawIncrement> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
