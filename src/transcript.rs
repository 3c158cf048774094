//! Turn-structured transcript assembly.
//!
//! Transcript text arrives as incremental fragments tagged by speaker
//! role; the service marks utterance boundaries with a turn-complete
//! signal. The aggregator buffers fragments per role and flushes whole
//! turns at each boundary. Pure accumulate/flush state machine — no
//! timers, no network.

use serde::{Deserialize, Serialize};

/// Who is speaking. Pairwise conversation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Interviewer,
    Candidate,
}

/// One complete utterance by one speaker. Immutable once appended to the
/// session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Speaker,
    pub text: String,
    /// Flush time, epoch milliseconds.
    pub timestamp_ms: u64,
}

/// Reassembles discrete turns from streamed fragments.
///
/// At most one turn is being assembled per role at any time; a role's
/// buffer only grows until the next turn-complete flush clears it.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    candidate_pending: String,
    interviewer_pending: String,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a streamed fragment to the role's pending buffer.
    pub fn append_fragment(&mut self, role: Speaker, text: &str) {
        self.pending_mut(role).push_str(text);
    }

    /// The text accumulated so far for `role` (used for live captions).
    pub fn pending(&self, role: Speaker) -> &str {
        match role {
            Speaker::Candidate => &self.candidate_pending,
            Speaker::Interviewer => &self.interviewer_pending,
        }
    }

    /// Flush completed utterances at a turn boundary.
    ///
    /// Emits a turn for each role whose buffer holds non-whitespace text,
    /// candidate first, then interviewer (both may legitimately flush on
    /// the same boundary). Empty and whitespace-only buffers are skipped,
    /// so this returns 0, 1, or 2 turns. Buffers are cleared either way.
    pub fn on_turn_complete(&mut self, timestamp_ms: u64) -> Vec<ConversationTurn> {
        let mut turns = Vec::with_capacity(2);
        for role in [Speaker::Candidate, Speaker::Interviewer] {
            let pending = self.pending_mut(role);
            if !pending.trim().is_empty() {
                turns.push(ConversationTurn {
                    role,
                    text: std::mem::take(pending),
                    timestamp_ms,
                });
            } else {
                pending.clear();
            }
        }
        turns
    }

    fn pending_mut(&mut self, role: Speaker) -> &mut String {
        match role {
            Speaker::Candidate => &mut self.candidate_pending,
            Speaker::Interviewer => &mut self.interviewer_pending,
        }
    }
}
