use serde::{Deserialize, Serialize};

/// Prebuilt voice identifiers accepted by the conversational service.
pub const VOICES: [&str; 4] = ["Kore", "Puck", "Fenrir", "Zephyr"];

/// Outbound capture wire format: mono 16 kHz i16 LE PCM.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
/// Inbound synthesized audio: mono 24 kHz i16 LE PCM.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Session configuration for one mock interview.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the conversational service.
    pub server_url: String,
    /// Bearer token for the service.
    pub api_token: String,
    /// Voice identifier, one of [`VOICES`].
    pub voice: String,
    /// The fixed, ordered question script the interviewer must follow.
    pub questions: Vec<String>,
    /// Job description excerpt fed into the system instruction.
    pub job_description: String,
    /// Candidate resume excerpt fed into the system instruction.
    pub resume: String,
    /// Request transcription of both directions of the conversation.
    pub transcribe_both_directions: bool,
    /// Lowercase substring that, when spoken by the interviewer, ends the
    /// session after the grace delay.
    pub termination_phrase: String,
    /// Pause between termination-phrase detection and teardown, so
    /// trailing synthesized speech can finish playing.
    pub end_grace_delay_ms: u64,
    /// Gain applied to capture RMS before clamping to [0, 1].
    pub meter_gain: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "wss://localhost:9292/v1/live".to_string(),
            api_token: String::new(),
            voice: VOICES[0].to_string(),
            questions: Vec::new(),
            job_description: String::new(),
            resume: String::new(),
            transcribe_both_directions: true,
            termination_phrase: "concludes our interview".to_string(),
            end_grace_delay_ms: 3000,
            meter_gain: 5.0,
        }
    }
}

impl SessionConfig {
    /// Build the interviewer system instruction: persona, truncated JD and
    /// resume excerpts, the numbered question script, and the rules that
    /// force the agent to lead and to close with the termination phrase.
    pub fn system_instruction(&self) -> String {
        let script = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("Question {}: {}", i + 1, q))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a professional, polite, and encouraging technical interviewer.\n\
             Your task is to interview a candidate for a job.\n\
             \n\
             JOB DESCRIPTION:\n{jd}...\n\
             \n\
             CANDIDATE RESUME:\n{resume}...\n\
             \n\
             INTERVIEW SCRIPT:\n\
             You must ask exactly these {n} questions, one by one.\n\
             {script}\n\
             \n\
             RULES:\n\
             1. Start immediately by introducing yourself and asking Question 1. \
             Do NOT wait for the user to speak.\n\
             2. Wait for the candidate to answer.\n\
             3. Acknowledge their answer briefly, then ask the next question.\n\
             4. Do not deviate from the question list.\n\
             5. After the final question, say \"Thank you, that concludes our interview.\"",
            jd = truncate_chars(&self.job_description, 1000),
            resume = truncate_chars(&self.resume, 1000),
            n = self.questions.len(),
            script = script,
        )
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
