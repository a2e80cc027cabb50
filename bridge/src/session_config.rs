use shared_protocol::{CallType, Direction, InputAudioTranscriptionConfig, SessionConfig, TurnDetectionConfig};

use crate::config::Config;

/// Call metadata captured off the telephony `start` event, used to produce
/// the realtime session configuration and the opening-turn directive.
#[derive(Debug, Clone)]
pub struct CallMetadata {
    pub direction: Direction,
    pub call_type: CallType,
    pub last_summary: Option<String>,
    pub last_transcript: Option<String>,
}

const FIRST_CALL_NOTE: &str =
    "There is no prior memory of this caller. Treat this as a first-time conversation.";

const NO_PRIOR_SUMMARY_PLACEHOLDER: &str = "(none available)";
const NO_PRIOR_TRANSCRIPT_PLACEHOLDER: &str = "(none available)";

fn followup_block(last_summary: Option<&str>, last_transcript: Option<&str>) -> String {
    format!(
        "This is a follow-up call. Do not repeat baseline qualification questions already \
         answered in the prior call; acknowledge the prior call naturally.\n\
         Prior summary: {}\n\
         Prior transcript: {}",
        last_summary.unwrap_or(NO_PRIOR_SUMMARY_PLACEHOLDER),
        last_transcript.unwrap_or(NO_PRIOR_TRANSCRIPT_PLACEHOLDER),
    )
}

pub fn compose_instructions(base_prompt: &str, metadata: &CallMetadata) -> String {
    let block = match metadata.call_type {
        CallType::First => FIRST_CALL_NOTE.to_string(),
        CallType::Followup => followup_block(
            metadata.last_summary.as_deref(),
            metadata.last_transcript.as_deref(),
        ),
    };
    format!("{base_prompt}\n\n{block}")
}

/// The first message handed to the realtime peer once it reports ready.
pub fn build_session_config(config: &Config, metadata: &CallMetadata) -> SessionConfig {
    SessionConfig {
        modalities: vec!["audio".to_string(), "text".to_string()],
        instructions: compose_instructions(&config.base_prompt, metadata),
        voice: config.realtime_voice.clone(),
        input_audio_format: "pcm16",
        output_audio_format: "g711_ulaw",
        input_audio_transcription: InputAudioTranscriptionConfig {
            model: config.transcription_model.clone(),
        },
        turn_detection: TurnDetectionConfig::default(),
    }
}

/// The second message: a short instruction to produce the opening utterance.
pub fn build_initial_directive(direction: Direction, call_type: CallType) -> &'static str {
    match (direction, call_type) {
        (Direction::Outbound, CallType::First) => {
            "Greet the caller warmly, introduce yourself by name, and state the purpose of \
             this call in one or two sentences."
        }
        (Direction::Outbound, CallType::Followup) => {
            "Greet the caller, acknowledge you have spoken before, briefly reference why \
             you're calling again, and get to the point."
        }
        (Direction::Inbound, CallType::First) => {
            "Answer the call, introduce yourself by name, and ask how you can help."
        }
        (Direction::Inbound, CallType::Followup) => {
            "Answer the call, acknowledge the prior conversation, and ask how you can help \
             continue from there."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_prompt(prompt: &str) -> Config {
        Config {
            listen_addr: "[::]".to_string(),
            listen_port: 8001,
            realtime_ws_url: "wss://example".to_string(),
            realtime_api_key: "key".to_string(),
            realtime_model: "model".to_string(),
            realtime_voice: "alloy".to_string(),
            transcription_model: "whisper-1".to_string(),
            summary_endpoint: "https://example/summary".to_string(),
            summary_model: "gpt-4o-mini".to_string(),
            summary_system_prompt: "summarize".to_string(),
            call_log_endpoint: "https://example/call-log".to_string(),
            call_log_anon_key: "anon".to_string(),
            call_log_shared_secret: "secret".to_string(),
            org_id: None,
            base_prompt: prompt.to_string(),
            energy_threshold: shared_vad::ENERGY_THRESHOLD,
            vad_hangover_ms: shared_vad::HANGOVER_MS,
            http_client: reqwest::Client::new(),
        }
    }

    #[test]
    fn first_call_note_has_no_prior_context() {
        let metadata = CallMetadata {
            direction: Direction::Outbound,
            call_type: CallType::First,
            last_summary: None,
            last_transcript: None,
        };
        let instructions = compose_instructions("base prompt", &metadata);
        assert!(instructions.contains("no prior memory"));
        assert!(instructions.starts_with("base prompt\n\n"));
    }

    #[test]
    fn followup_inlines_prior_summary_and_transcript() {
        let metadata = CallMetadata {
            direction: Direction::Inbound,
            call_type: CallType::Followup,
            last_summary: Some("prior notes".to_string()),
            last_transcript: Some("prior excerpt".to_string()),
        };
        let instructions = compose_instructions("base", &metadata);
        assert!(instructions.contains("prior notes"));
        assert!(instructions.contains("prior excerpt"));
    }

    #[test]
    fn followup_without_prior_context_uses_placeholders() {
        let metadata = CallMetadata {
            direction: Direction::Inbound,
            call_type: CallType::Followup,
            last_summary: None,
            last_transcript: None,
        };
        let instructions = compose_instructions("base", &metadata);
        assert!(instructions.contains(NO_PRIOR_SUMMARY_PLACEHOLDER));
        assert!(instructions.contains(NO_PRIOR_TRANSCRIPT_PLACEHOLDER));
    }

    #[test]
    fn four_initial_directive_variants_are_distinct() {
        let variants = [
            build_initial_directive(Direction::Outbound, CallType::First),
            build_initial_directive(Direction::Outbound, CallType::Followup),
            build_initial_directive(Direction::Inbound, CallType::First),
            build_initial_directive(Direction::Inbound, CallType::Followup),
        ];
        for i in 0..variants.len() {
            for j in (i + 1)..variants.len() {
                assert_ne!(variants[i], variants[j]);
            }
        }
    }

    #[test]
    fn session_config_declares_spec_required_fields() {
        let config = config_with_prompt("base");
        let metadata = CallMetadata {
            direction: Direction::Outbound,
            call_type: CallType::First,
            last_summary: None,
            last_transcript: None,
        };
        let session_config = build_session_config(&config, &metadata);
        assert_eq!(session_config.input_audio_format, "pcm16");
        assert_eq!(session_config.output_audio_format, "g711_ulaw");
        assert_eq!(session_config.turn_detection.threshold, 0.5);
        assert_eq!(session_config.turn_detection.silence_duration_ms, 300);
        assert_eq!(session_config.turn_detection.prefix_padding_ms, 300);
        assert_eq!(session_config.modalities, vec!["audio", "text"]);
    }
}
