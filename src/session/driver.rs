//! # Conversation Driver
//!
//! Turn progression for an interview session: building the initial
//! conversation history, recording answered turns, and deciding between
//! asking the next question and closing the interview.
//!
//! The opening question is generated deterministically from the role
//! template — not via the LLM — so a session can greet the candidate even
//! if question generation is down. The turn limit and templates are policy
//! data owned by configuration, not constants.

use crate::config::InterviewConfig;
use crate::providers::{ChatMessage, CollaboratorError, QuestionGenerator};
use crate::session::{Difficulty, InterviewSession, QaPair, SessionState};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Built-in system prompt used when no prompt file is configured on disk.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional interviewer conducting a live \
interview for the {role} position at {difficulty} difficulty. Ask one concise question at a \
time, follow up on the candidate's answers, and never answer on their behalf.";

/// What should happen after an answer is recorded.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Ask another question, generated from this history snapshot
    AskNext(Vec<ChatMessage>),
    /// Turn limit reached: deliver the closing statement and finalize
    Finished,
}

pub struct ConversationDriver {
    config: InterviewConfig,
    generator: Arc<dyn QuestionGenerator>,
}

impl ConversationDriver {
    pub fn new(config: InterviewConfig, generator: Arc<dyn QuestionGenerator>) -> Self {
        Self { config, generator }
    }

    /// The deterministic role-parameterized opening question.
    pub fn opening_question(&self, role: &str) -> String {
        self.config.opening_template.replace("{role}", role)
    }

    /// The fixed closing statement delivered when the turn limit is hit.
    pub fn closing_text(&self) -> &str {
        &self.config.closing_text
    }

    /// Build a new session: system instructions from the prompt template
    /// plus background context (parsed resume text) when present on disk.
    pub fn start_session(&self, role: &str, difficulty: Difficulty) -> InterviewSession {
        let template = match std::fs::read_to_string(&self.config.prompt_path) {
            Ok(text) => text,
            Err(err) => {
                debug!(
                    path = %self.config.prompt_path,
                    error = %err,
                    "No prompt template file, using built-in prompt"
                );
                DEFAULT_SYSTEM_PROMPT.to_string()
            }
        };

        let system_prompt = template
            .replace("{role}", role)
            .replace("{difficulty}", difficulty.as_str());

        let mut messages = vec![ChatMessage::system(system_prompt)];

        match std::fs::read_to_string(&self.config.context_path) {
            Ok(context) if !context.trim().is_empty() => {
                messages.push(ChatMessage::system(format!(
                    "Background resume context (read-only).\n<<<<\n{}\n>>>>",
                    context
                )));
            }
            Ok(_) => {}
            Err(_) => {
                debug!(path = %self.config.context_path, "No background context available");
            }
        }

        InterviewSession::new(role, difficulty, messages)
    }

    /// Mark a question as the one now awaiting an answer.
    pub fn accept_question(&self, session: &mut InterviewSession, question: &str) {
        session.current_question = question.to_string();
        session.messages.push(ChatMessage::assistant(question));
        session.questions_asked += 1;
        session.state = SessionState::AwaitingAnswer;
    }

    /// Record the candidate's answer against the pending question and decide
    /// whether the interview continues.
    pub fn record_answer(&self, session: &mut InterviewSession, answer: &str) -> TurnOutcome {
        session.log.qa_pairs.push(QaPair {
            question: session.current_question.clone(),
            answer: answer.to_string(),
            answered_at: Utc::now(),
        });
        session
            .messages
            .push(ChatMessage::user(format!("Candidate response: {}", answer)));

        if session.questions_asked >= self.config.max_questions {
            session.state = SessionState::Evaluating;
            TurnOutcome::Finished
        } else {
            TurnOutcome::AskNext(session.messages.clone())
        }
    }

    /// Ask the question-generation collaborator for the next question and
    /// clean any leaked role-prefix artifacts from its output.
    pub async fn generate_question(
        &self,
        history: &[ChatMessage],
    ) -> Result<String, CollaboratorError> {
        let raw = self.generator.next_question(history).await?;
        let cleaned = strip_role_artifacts(&raw);
        if cleaned.is_empty() {
            warn!("Question generator returned empty output");
            return Err(CollaboratorError::Failed(
                "generator produced no question".to_string(),
            ));
        }
        Ok(cleaned)
    }
}

/// Remove literal role labels the generator sometimes echoes back into its
/// output (e.g. `Candidate:` prefixes).
fn strip_role_artifacts(text: &str) -> String {
    let mut cleaned = text.to_string();
    for artifact in ["Candidate:", "candidate:", "Interviewer:", "interviewer:"] {
        cleaned = cleaned.replace(artifact, "");
    }
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Deterministic generator fake: pops canned questions in order.
    struct ScriptedGenerator {
        questions: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(questions: &[&str]) -> Self {
            Self {
                questions: Mutex::new(questions.iter().rev().map(|q| q.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl QuestionGenerator for ScriptedGenerator {
        async fn next_question(
            &self,
            _history: &[ChatMessage],
        ) -> Result<String, CollaboratorError> {
            self.questions
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| CollaboratorError::Failed("script exhausted".to_string()))
        }
    }

    fn test_config(max_questions: u32) -> InterviewConfig {
        InterviewConfig {
            max_questions,
            opening_template:
                "Hi, I'll be interviewing you for the {role} position. Could you briefly introduce yourself?"
                    .to_string(),
            closing_text: "That concludes our interview. Thank you for your time.".to_string(),
            prompt_path: "/nonexistent/prompt.md".to_string(),
            context_path: "/nonexistent/context.md".to_string(),
        }
    }

    fn driver_with(max_questions: u32, questions: &[&str]) -> ConversationDriver {
        ConversationDriver::new(test_config(max_questions), Arc::new(ScriptedGenerator::new(questions)))
    }

    #[test]
    fn test_opening_substitutes_role() {
        let driver = driver_with(5, &[]);
        let opening = driver.opening_question("Data Engineer");
        assert!(opening.contains("Data Engineer"));
        assert!(!opening.contains("{role}"));
    }

    #[test]
    fn test_start_session_has_system_instructions() {
        let driver = driver_with(5, &[]);
        let session = driver.start_session("Backend Engineer", Difficulty::Hard);
        assert_eq!(session.state, SessionState::SettingUp);
        assert_eq!(session.messages.len(), 1);
        assert!(session.messages[0].content.contains("Backend Engineer"));
        assert!(session.messages[0].content.contains("HARD"));
    }

    #[test]
    fn test_record_answer_logs_pair_and_continues() {
        let driver = driver_with(3, &[]);
        let mut session = driver.start_session("SRE", Difficulty::Medium);
        driver.accept_question(&mut session, "Tell me about yourself.");

        let outcome = driver.record_answer(&mut session, "I keep systems up.");
        assert!(matches!(outcome, TurnOutcome::AskNext(_)));
        assert_eq!(session.log.qa_pairs.len(), 1);
        assert_eq!(session.log.qa_pairs[0].question, "Tell me about yourself.");
        assert_eq!(session.log.qa_pairs[0].answer, "I keep systems up.");
    }

    #[test]
    fn test_turn_limit_finishes_interview() {
        let driver = driver_with(2, &[]);
        let mut session = driver.start_session("SRE", Difficulty::Medium);

        driver.accept_question(&mut session, "Q1");
        assert!(matches!(
            driver.record_answer(&mut session, "A1"),
            TurnOutcome::AskNext(_)
        ));

        driver.accept_question(&mut session, "Q2");
        assert!(matches!(
            driver.record_answer(&mut session, "A2"),
            TurnOutcome::Finished
        ));
        assert_eq!(session.state, SessionState::Evaluating);
        assert_eq!(session.log.qa_pairs.len(), 2);
    }

    #[tokio::test]
    async fn test_generate_question_strips_role_artifacts() {
        let driver = driver_with(5, &["Candidate: How do you shard a database?"]);
        let question = driver.generate_question(&[]).await.unwrap();
        assert_eq!(question, "How do you shard a database?");
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let driver = driver_with(5, &[]);
        assert!(driver.generate_question(&[]).await.is_err());
    }

    #[test]
    fn test_strip_role_artifacts_trims() {
        assert_eq!(strip_role_artifacts("  candidate: hello  "), "hello");
        assert_eq!(strip_role_artifacts("plain question?"), "plain question?");
    }
}
