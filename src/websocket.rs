//! # WebSocket Connection Handling
//!
//! One actor per client connection, owning everything that connection
//! touches: its audio accumulator, its transcription pipeline handle, and
//! its place in the session registry. Heavy work (transcription, question
//! generation, persistence, evaluation) runs in spawned tasks that report
//! back through an outbound frame channel drained by the actor, so the
//! receive loop never blocks on an external service. Once the actor is gone
//! the channel's receiver is dropped and late sends vanish, which is exactly
//! the wire semantics for a closed connection.
//!
//! ## Keepalive:
//! The server pings every 30 seconds so intermediaries keep the connection
//! alive during long silences. There is deliberately no pong deadline: a
//! client stalled on audio encoding must not be cut off for answering late.
//!
//! ## Teardown:
//! Cleanup is guarded to run once per connection, whatever triggered the
//! close, so the registry entry, the connection counter, and the disconnect
//! event are all released exactly once.

use crate::artifacts::{upload_artifact, DocumentKind};
use crate::audio::AudioAccumulator;
use crate::config::AppConfig;
use crate::pipeline::{TranscriptPipeline, TranscriptUpdate};
use crate::protocol::{ClientFrame, ServerFrame};
use crate::providers::{SpeechTone, Synthesizer};
use crate::session::driver::{ConversationDriver, TurnOutcome};
use crate::session::{ConnectionId, Difficulty, InterviewLog, SessionState};
use crate::state::AppState;
use crate::storage::ArtifactCategory;
use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

/// Interval between server pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outbound frame channel from spawned tasks into the connection actor.
type FrameSink = mpsc::UnboundedSender<ServerFrame>;

/// HTTP entry point that upgrades to the WebSocket protocol.
pub async fn ws_route(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    ws::start(
        InterviewWebSocket::new(state.get_ref().clone()),
        &req,
        stream,
    )
}

pub struct InterviewWebSocket {
    id: ConnectionId,
    state: AppState,
    accumulator: AudioAccumulator,
    pipeline: Option<TranscriptPipeline>,
    frames: Option<FrameSink>,
    cleaned: bool,
}

impl InterviewWebSocket {
    pub fn new(state: AppState) -> Self {
        let window = state.get_config().audio.window_config();
        Self {
            id: ConnectionId::new(),
            state,
            accumulator: AudioAccumulator::new(window),
            pipeline: None,
            frames: None,
            cleaned: false,
        }
    }

    fn send_frame(&self, ctx: &mut ws::WebsocketContext<Self>, frame: &ServerFrame) {
        match serde_json::to_string(frame) {
            Ok(json) => ctx.text(json),
            Err(err) => error!(connection = %self.id, error = %err, "Frame serialization failed"),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |_act, ctx| {
            ctx.ping(b"");
        });
    }

    /// Release this connection's shared resources. Idempotent: close frames,
    /// protocol errors, and actor teardown may all race here, but only the
    /// first caller emits the disconnect event.
    fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        self.state.registry.remove(&self.id);
        self.state.connection_closed(self.id);
        info!(connection = %self.id, "WebSocket disconnected");
    }

    /// Binary frame: buffer the audio and feed any completed windows to the
    /// transcription pipeline, in arrival order.
    fn handle_audio(&mut self, data: &[u8]) {
        if !self.accumulator.is_recording() {
            return;
        }
        self.accumulator.append(data);
        if let Some(pipeline) = &self.pipeline {
            while let Some(window) = self.accumulator.next_window() {
                pipeline.submit_window(window);
            }
        }
    }

    fn handle_frame(&mut self, frame: ClientFrame, ctx: &mut ws::WebsocketContext<Self>) {
        match frame {
            ClientFrame::StartAudio => self.handle_start_audio(ctx),
            ClientFrame::StopAudio => self.handle_stop_audio(ctx),
            ClientFrame::InterviewSetup { role, difficulty } => {
                self.handle_interview_setup(role, difficulty, ctx)
            }
            ClientFrame::DocumentUpload {
                doc_type,
                filename,
                content,
            } => self.handle_document_upload(doc_type, filename, content),
            ClientFrame::EndInterview => self.handle_end_interview(ctx),
        }
    }

    fn handle_start_audio(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        info!(connection = %self.id, "Audio capture started");
        self.accumulator.start_recording();
        if let Some(pipeline) = &self.pipeline {
            pipeline.reset();
        }
        self.send_frame(
            ctx,
            &ServerFrame::ServerMessage {
                text: "Audio capture started".to_string(),
            },
        );
    }

    /// End of a take: drain the pipeline, persist the recording, and run one
    /// interview turn against the finalized answer.
    fn handle_stop_audio(&mut self, _ctx: &mut ws::WebsocketContext<Self>) {
        if !self.accumulator.is_recording() {
            debug!(connection = %self.id, "stop_audio without active recording, ignoring");
            return;
        }

        let (remainder, recording) = self.accumulator.stop_recording();
        info!(
            connection = %self.id,
            recorded_bytes = recording.len(),
            "Audio capture stopped"
        );

        let (Some(pipeline), Some(frames)) = (self.pipeline.clone(), self.frames.clone()) else {
            return;
        };
        let state = self.state.clone();
        let id = self.id;

        tokio::spawn(async move {
            let answer = pipeline.finalize(remainder).await;
            if !answer.is_empty() {
                let _ = frames.send(ServerFrame::CandidateTranscript {
                    text: answer.clone(),
                });
                if let Err(err) = state.artifacts.save_transcript(&answer).await {
                    warn!(connection = %id, error = %err, "Transcript persistence failed");
                }
            }

            persist_recording(&state, &frames, recording).await;
            run_turn(state, id, frames, answer).await;
        });
    }

    fn handle_interview_setup(
        &mut self,
        role: String,
        difficulty: String,
        ctx: &mut ws::WebsocketContext<Self>,
    ) {
        let difficulty = Difficulty::normalize(&difficulty);
        info!(
            connection = %self.id,
            role = %role,
            difficulty = difficulty.as_str(),
            "Interview setup"
        );

        let config = self.state.get_config();
        let driver = driver_for(&config, &self.state);

        let mut session = driver.start_session(&role, difficulty);
        let opening = driver.opening_question(&role);
        driver.accept_question(&mut session, &opening);
        self.state.registry.insert(self.id, session);

        self.send_frame(
            ctx,
            &ServerFrame::InterviewerText {
                text: opening.clone(),
            },
        );

        // The text is already out; speech is delivered after. Any synthesis
        // failure on the setup path is reported to the client explicitly.
        let Some(frames) = self.frames.clone() else {
            return;
        };
        let synthesizer = self.state.collaborators.synthesizer.clone();
        tokio::spawn(async move {
            deliver_speech(&frames, synthesizer.as_ref(), &opening, SpeechTone::Intro, true).await;
        });
    }

    fn handle_document_upload(&mut self, doc_type: String, filename: String, content: String) {
        let Some(frames) = self.frames.clone() else {
            return;
        };
        let state = self.state.clone();
        let kind = DocumentKind::from_wire(&doc_type);

        tokio::spawn(async move {
            process_document_upload(state, frames, kind, filename, content).await;
        });
    }

    fn handle_end_interview(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let removed = self.state.registry.remove(&self.id);
        info!(connection = %self.id, removed, "Interview ended by client");
        self.send_frame(
            ctx,
            &ServerFrame::ServerMessage {
                text: "Interview ended".to_string(),
            },
        );
    }
}

impl Actor for InterviewWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(connection = %self.id, "WebSocket connected");
        self.state.connection_opened(self.id);
        self.heartbeat(ctx);

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        self.frames = Some(frames_tx);
        ctx.add_stream(UnboundedReceiverStream::new(frames_rx));

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let floor = self.accumulator.config().min_transcribe_bytes();
        self.pipeline = Some(TranscriptPipeline::spawn(
            self.id,
            self.state.collaborators.transcriber.clone(),
            floor,
            updates_tx,
        ));
        ctx.add_stream(UnboundedReceiverStream::new(updates_rx));

        self.send_frame(
            ctx,
            &ServerFrame::ServerMessage {
                text: "Connected to interview server".to_string(),
            },
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.cleanup();
    }
}

/// Outbound frames queued by spawned tasks.
impl StreamHandler<ServerFrame> for InterviewWebSocket {
    fn handle(&mut self, frame: ServerFrame, ctx: &mut Self::Context) {
        self.send_frame(ctx, &frame);
    }

    // The sink closing must not tear down the connection; the default
    // implementation would stop the actor.
    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

/// Running-transcript snapshots from the pipeline, forwarded as
/// `candidate_transcript` frames.
impl StreamHandler<TranscriptUpdate> for InterviewWebSocket {
    fn handle(&mut self, update: TranscriptUpdate, ctx: &mut Self::Context) {
        self.send_frame(ctx, &ServerFrame::CandidateTranscript { text: update.0 });
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for InterviewWebSocket {
    fn handle(
        &mut self,
        msg: Result<ws::Message, ws::ProtocolError>,
        ctx: &mut Self::Context,
    ) {
        match msg {
            Ok(ws::Message::Ping(payload)) => ctx.pong(&payload),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Binary(data)) => self.handle_audio(&data),
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => self.handle_frame(frame, ctx),
                Err(err) => {
                    // Protocol errors are reported, never fatal.
                    warn!(connection = %self.id, error = %err, "Unparseable control frame");
                    self.send_frame(
                        ctx,
                        &ServerFrame::ServerMessage {
                            text: format!("Unrecognized message: {}", err),
                        },
                    );
                }
            },
            Ok(ws::Message::Close(reason)) => {
                debug!(connection = %self.id, ?reason, "Close frame received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(connection = %self.id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

fn driver_for(config: &AppConfig, state: &AppState) -> ConversationDriver {
    ConversationDriver::new(
        config.interview.clone(),
        state.collaborators.question_generator.clone(),
    )
}

/// Decode, store, and (for resumes) parse an uploaded document, reporting
/// the outcome in a single result frame.
async fn process_document_upload(
    state: AppState,
    frames: FrameSink,
    kind: DocumentKind,
    filename: String,
    content: String,
) {
    if content.trim().is_empty() {
        let _ = frames.send(ServerFrame::DocumentUploadResult {
            success: false,
            local_path: None,
            storage_url: None,
            error: Some("missing document content".to_string()),
        });
        return;
    }

    let bytes = match BASE64.decode(content.as_bytes()) {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = frames.send(ServerFrame::DocumentUploadResult {
                success: false,
                local_path: None,
                storage_url: None,
                error: Some(format!("invalid base64 content: {}", err)),
            });
            return;
        }
    };

    let local = match state.artifacts.save_document(kind, &filename, &bytes).await {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Document persistence failed");
            let _ = frames.send(ServerFrame::DocumentUploadResult {
                success: false,
                local_path: None,
                storage_url: None,
                error: Some("could not store the document".to_string()),
            });
            return;
        }
    };

    let config = state.get_config();
    let uploaded = upload_artifact(
        &state.storage,
        &local,
        &config.storage.owner,
        ArtifactCategory::Document,
        None,
    )
    .await;

    // A parsed resume becomes background context for the next session.
    // Parsing failures degrade to an un-contextualized interview, never to
    // an upload failure.
    if kind == DocumentKind::Resume {
        match state.collaborators.document_parser.parse(&local).await {
            Ok(text) if !text.trim().is_empty() => {
                if let Err(err) = state
                    .artifacts
                    .write_context(&config.interview.context_path, &text)
                    .await
                {
                    warn!(error = %err, "Failed to write resume context");
                }
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "Resume parsing unavailable");
            }
        }
    }

    let _ = frames.send(ServerFrame::DocumentUploadResult {
        success: true,
        local_path: Some(local.display().to_string()),
        storage_url: uploaded.map(|a| a.url),
        error: None,
    });
}

/// Write the take's WAV artifact and report the result, with upload on top
/// when remote storage is configured.
async fn persist_recording(state: &AppState, frames: &FrameSink, recording: Vec<u8>) {
    if recording.is_empty() {
        return;
    }

    let config = state.get_config();
    match state
        .artifacts
        .save_recording(&recording, config.audio.sample_rate)
    {
        Ok(path) => {
            let uploaded = upload_artifact(
                &state.storage,
                &path,
                &config.storage.owner,
                ArtifactCategory::Recording,
                None,
            )
            .await;
            let _ = frames.send(ServerFrame::AudioSaved {
                success: true,
                local_path: Some(path.display().to_string()),
                storage_url: uploaded.map(|a| a.url),
            });
        }
        Err(err) => {
            error!(error = %err, "Recording persistence failed");
            let _ = frames.send(ServerFrame::AudioSaved {
                success: false,
                local_path: None,
                storage_url: None,
            });
        }
    }
}

/// One interview turn: record the finalized answer, then either ask the
/// next generated question or close out the session.
///
/// A take that transcribed to nothing consumes no turn: the current
/// question stays pending and the candidate simply answers again.
async fn run_turn(state: AppState, id: ConnectionId, frames: FrameSink, answer: String) {
    if answer.trim().is_empty() {
        debug!(connection = %id, "Empty transcript, leaving the current question pending");
        return;
    }

    let Some(handle) = state.registry.get(&id) else {
        debug!(connection = %id, "No active session for this take");
        return;
    };

    let config = state.get_config();
    let driver = driver_for(&config, &state);

    let session_id = {
        let session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.session_id.clone()
    };

    let outcome = {
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        if session.state != SessionState::AwaitingAnswer {
            debug!(connection = %id, "Take finished outside an answer window, ignoring");
            return;
        }
        driver.record_answer(&mut session, &answer)
    };

    match outcome {
        TurnOutcome::AskNext(history) => match driver.generate_question(&history).await {
            Ok(question) => {
                {
                    let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
                    driver.accept_question(&mut session, &question);
                }
                let _ = frames.send(ServerFrame::InterviewerText {
                    text: question.clone(),
                });
                deliver_speech(
                    &frames,
                    state.collaborators.synthesizer.as_ref(),
                    &question,
                    SpeechTone::Followup,
                    false,
                )
                .await;
            }
            Err(err) => {
                warn!(connection = %id, error = %err, "Question generation failed");
                let _ = frames.send(ServerFrame::InterviewError {
                    error: err.user_facing_message(),
                    quota_exceeded: err.is_quota_exhausted(),
                });
            }
        },
        TurnOutcome::Finished => {
            let closing = driver.closing_text().to_string();
            let _ = frames.send(ServerFrame::InterviewerText {
                text: closing.clone(),
            });
            deliver_speech(
                &frames,
                state.collaborators.synthesizer.as_ref(),
                &closing,
                SpeechTone::Closing,
                false,
            )
            .await;

            let log = {
                let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
                session.finalize_log();
                session.state = SessionState::Closed;
                session.log.clone()
            };
            finalize_interview(&state, id, &frames, &session_id, &log).await;
        }
    }
}

/// Persist the finalized log, announce completion, and run the asynchronous
/// evaluation. `interview_complete` goes out before evaluation starts; the
/// `evaluation_result` frame may arrive much later.
async fn finalize_interview(
    state: &AppState,
    id: ConnectionId,
    frames: &FrameSink,
    session_id: &str,
    log: &InterviewLog,
) {
    let config = state.get_config();
    match state.artifacts.save_log(session_id, log).await {
        Ok(path) => {
            upload_artifact(
                &state.storage,
                &path,
                &config.storage.owner,
                ArtifactCategory::Log,
                None,
            )
            .await;
        }
        Err(err) => error!(error = %err, "Interview log persistence failed"),
    }

    let _ = frames.send(ServerFrame::InterviewComplete);
    state.registry.remove(&id);

    run_evaluation(state, frames, session_id, log).await;
}

async fn run_evaluation(
    state: &AppState,
    frames: &FrameSink,
    session_id: &str,
    log: &InterviewLog,
) {
    let log_value = match serde_json::to_value(log) {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "Interview log serialization failed");
            return;
        }
    };

    match state.collaborators.evaluator.evaluate(&log_value).await {
        Ok(result) => {
            match state.artifacts.save_evaluation(session_id, &result).await {
                Ok(path) => {
                    let config = state.get_config();
                    upload_artifact(
                        &state.storage,
                        &path,
                        &config.storage.owner,
                        ArtifactCategory::Evaluation,
                        None,
                    )
                    .await;
                }
                Err(err) => warn!(error = %err, "Evaluation persistence failed"),
            }
            let _ = frames.send(ServerFrame::EvaluationResult {
                success: true,
                result: Some(result),
                error: None,
            });
        }
        Err(err) => {
            warn!(session = %session_id, error = %err, "Evaluation failed");
            let _ = frames.send(ServerFrame::EvaluationResult {
                success: false,
                result: None,
                error: Some(err.to_string()),
            });
        }
    }
}

/// Synthesize speech for an interviewer line, best-effort: the text frame
/// has always been delivered before this runs. Quota exhaustion is always
/// reported; other failures are reported only when `report_failures` is set
/// (the interview-setup path), otherwise delivery degrades to text-only.
async fn deliver_speech(
    frames: &FrameSink,
    synthesizer: &dyn Synthesizer,
    text: &str,
    tone: SpeechTone,
    report_failures: bool,
) {
    match synthesizer.synthesize(text, tone).await {
        Ok(audio) => {
            let _ = frames.send(ServerFrame::InterviewerAudio {
                audio_base64: BASE64.encode(&audio),
                text: text.to_string(),
            });
        }
        Err(err) if err.is_quota_exhausted() => {
            warn!(error = %err, "Speech synthesis quota exhausted");
            let _ = frames.send(ServerFrame::InterviewError {
                error: err.user_facing_message(),
                quota_exceeded: true,
            });
        }
        Err(err) if report_failures => {
            warn!(error = %err, "Speech synthesis failed during setup");
            let _ = frames.send(ServerFrame::InterviewError {
                error: err.user_facing_message(),
                quota_exceeded: false,
            });
        }
        Err(err) => {
            debug!(error = %err, "Speech synthesis unavailable, text-only delivery");
        }
    }
}
