use shared_protocol::AGENT_SPEAKER_LABEL;

/// Append-only interleaved transcript of caller and agent lines. Agent text
/// only lands in the transcript when a response-completed event flushes the
/// buffer; partial deltas never do.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    transcript: String,
    agent_buffer: String,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_caller_line(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.transcript.push_str("\nCaller: ");
        self.transcript.push_str(trimmed);
        self.transcript.push('\n');
    }

    pub fn push_agent_delta(&mut self, delta: &str) {
        self.agent_buffer.push_str(delta);
    }

    /// Flush the agent buffer into the transcript. A response-completed
    /// event with an empty (or already-flushed) buffer is a no-op.
    pub fn commit_agent_buffer(&mut self) {
        let trimmed = self.agent_buffer.trim();
        if !trimmed.is_empty() {
            self.transcript.push('\n');
            self.transcript.push_str(AGENT_SPEAKER_LABEL);
            self.transcript.push_str(": ");
            self.transcript.push_str(trimmed);
            self.transcript.push('\n');
        }
        self.agent_buffer.clear();
    }

    pub fn raw(&self) -> &str {
        &self.transcript
    }

    pub fn trimmed(&self) -> String {
        self.transcript.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transcript_matches_expected_serialization() {
        let mut t = TranscriptAssembler::new();
        t.append_caller_line("hello there");
        t.push_agent_delta("Hi,");
        t.push_agent_delta(" this is Dipsy");
        t.commit_agent_buffer();
        assert_eq!(t.raw(), "\nCaller: hello there\n\nDipsy: Hi, this is Dipsy\n");
    }

    #[test]
    fn empty_agent_buffer_commit_is_a_no_op() {
        let mut t = TranscriptAssembler::new();
        t.append_caller_line("hi");
        t.commit_agent_buffer();
        t.commit_agent_buffer();
        assert_eq!(t.raw(), "\nCaller: hi\n");
    }

    #[test]
    fn whitespace_only_agent_buffer_never_commits() {
        let mut t = TranscriptAssembler::new();
        t.push_agent_delta("   ");
        t.push_agent_delta("\n");
        t.commit_agent_buffer();
        assert_eq!(t.raw(), "");
    }

    #[test]
    fn blank_caller_text_is_dropped() {
        let mut t = TranscriptAssembler::new();
        t.append_caller_line("   ");
        assert_eq!(t.raw(), "");
    }

    #[test]
    fn short_call_trims_to_expected_length() {
        let mut t = TranscriptAssembler::new();
        t.append_caller_line("hi");
        assert_eq!(t.raw(), "\nCaller: hi\n");
        assert_eq!(t.trimmed().len(), 9);
    }
}
