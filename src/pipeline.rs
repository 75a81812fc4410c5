//! # Streaming Transcription Pipeline
//!
//! Per-connection worker that turns overlapping audio windows into one
//! running transcript. The connection's receive loop stays free: windows are
//! posted into an unbounded command queue and a single dedicated task
//! consumes them, so merges happen strictly in submission order by
//! construction — there is no lock whose discipline could be broken.
//!
//! Out-of-order completion of overlapping windows is the failure mode this
//! design exists to prevent: two windows transcribed concurrently can merge
//! in completion order and duplicate or drop the boundary words.

use crate::providers::Transcriber;
use crate::session::ConnectionId;
use crate::transcript::merge_transcripts;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// A merged-transcript snapshot pushed to the connection after each window.
#[derive(Debug)]
pub struct TranscriptUpdate(pub String);

enum Command {
    /// One full window of PCM16 audio to transcribe and merge
    Window(Vec<u8>),

    /// End of the take: transcribe the sub-window remainder, merge it, and
    /// reply with the final transcript. The transcript resets afterwards.
    Finalize {
        remainder: Vec<u8>,
        reply: oneshot::Sender<String>,
    },

    /// Discard transcript state (new recording started)
    Reset,
}

/// Handle to a connection's transcription worker. Clones share the same
/// worker and queue.
#[derive(Clone)]
pub struct TranscriptPipeline {
    tx: mpsc::UnboundedSender<Command>,
}

impl TranscriptPipeline {
    /// Spawn the worker task for one connection. Merged snapshots are sent
    /// through `updates`; if the connection is gone the sends are dropped
    /// silently and the worker winds down when the handle is dropped.
    pub fn spawn(
        connection_id: ConnectionId,
        transcriber: Arc<dyn Transcriber>,
        floor_bytes: usize,
        updates: mpsc::UnboundedSender<TranscriptUpdate>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut transcript = String::new();

            while let Some(command) = rx.recv().await {
                match command {
                    Command::Window(window) => {
                        match transcriber.transcribe_pcm16(&window, floor_bytes).await {
                            Ok(text) if !text.is_empty() => {
                                transcript = merge_transcripts(&transcript, &text);
                                debug!(
                                    connection = %connection_id,
                                    chars = transcript.len(),
                                    "Merged window transcription"
                                );
                                // The receiver disappears when the client
                                // disconnects mid-window; that is not an error.
                                let _ = updates.send(TranscriptUpdate(transcript.clone()));
                            }
                            Ok(_) => {}
                            Err(err) => {
                                warn!(
                                    connection = %connection_id,
                                    error = %err,
                                    "Window transcription failed, skipping window"
                                );
                            }
                        }
                    }
                    Command::Finalize { remainder, reply } => {
                        if !remainder.is_empty() {
                            match transcriber.transcribe_pcm16(&remainder, floor_bytes).await {
                                Ok(text) if !text.is_empty() => {
                                    transcript = merge_transcripts(&transcript, &text);
                                }
                                Ok(_) => {}
                                Err(err) => {
                                    warn!(
                                        connection = %connection_id,
                                        error = %err,
                                        "Remainder transcription failed"
                                    );
                                }
                            }
                        }
                        let final_text = std::mem::take(&mut transcript);
                        let _ = reply.send(final_text.trim().to_string());
                    }
                    Command::Reset => {
                        transcript.clear();
                    }
                }
            }

            debug!(connection = %connection_id, "Transcription pipeline stopped");
        });

        Self { tx }
    }

    /// Queue one window. Never blocks the caller.
    pub fn submit_window(&self, window: Vec<u8>) {
        let _ = self.tx.send(Command::Window(window));
    }

    /// Clear transcript state at the start of a new recording.
    pub fn reset(&self) {
        let _ = self.tx.send(Command::Reset);
    }

    /// Drain the queue: every window submitted before this call is merged
    /// first, then the remainder, then the final transcript comes back.
    pub async fn finalize(&self, remainder: Vec<u8>) -> String {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Finalize { remainder, reply })
            .is_err()
        {
            warn!("Transcription pipeline already stopped at finalize");
            return String::new();
        }
        rx.await.unwrap_or_default()
    }
}
