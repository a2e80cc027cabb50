//! Wire types shared between the telephony peer link, the realtime peer
//! link, and the finalizer's HTTP calls, plus the tunable constants named in
//! the bridging spec.

use serde::{Deserialize, Serialize};

pub const TELEPHONY_SAMPLE_RATE_HZ: u32 = 8000;
pub const REALTIME_SAMPLE_RATE_HZ: u32 = 16000;

pub const SUMMARY_MIN_TRANSCRIPT_LEN: usize = 40;
pub const SUMMARY_MAX_TOKENS: u32 = 800;
pub const SUMMARY_TEMPERATURE: f32 = 0.4;

pub const SERVER_VAD_THRESHOLD: f32 = 0.5;
pub const SERVER_VAD_SILENCE_DURATION_MS: u32 = 300;
pub const SERVER_VAD_PREFIX_PADDING_MS: u32 = 300;

/// Speaker label used in the transcript serialization for agent lines.
pub const AGENT_SPEAKER_LABEL: &str = "Dipsy";

// ---------------------------------------------------------------------
// Call metadata
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    Inbound,
    #[default]
    Outbound,
}

impl Direction {
    /// Unknown or absent values default to OUTBOUND, per the wire contract.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("INBOUND") => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "INBOUND",
            Direction::Outbound => "OUTBOUND",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CallType {
    #[default]
    First,
    Followup,
}

impl CallType {
    /// Unknown or absent values default to FIRST, per the wire contract.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("FOLLOWUP") => CallType::Followup,
            _ => CallType::First,
        }
    }
}

// ---------------------------------------------------------------------
// Telephony peer link (inbound JSON frames)
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
#[serde(rename_all = "lowercase")]
pub enum TelephonyEvent {
    Connected,
    Start {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        start: TelephonyStart,
    },
    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        mark: Option<MarkPayload>,
    },
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct TelephonyStart {
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: CustomParameters,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomParameters {
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub last_summary: Option<String>,
    #[serde(default)]
    pub last_transcript: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded µ-law audio at 8kHz.
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkPayload {
    #[serde(default)]
    pub name: String,
}

/// Outbound media frame sent back to the telephony peer.
#[derive(Debug, Serialize)]
pub struct OutboundMediaFrame {
    pub event: &'static str,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    pub media: OutboundMediaPayload,
}

#[derive(Debug, Serialize)]
pub struct OutboundMediaPayload {
    pub payload: String,
}

impl OutboundMediaFrame {
    pub fn new(stream_sid: impl Into<String>, payload_b64: impl Into<String>) -> Self {
        Self {
            event: "media",
            stream_sid: stream_sid.into(),
            media: OutboundMediaPayload {
                payload: payload_b64.into(),
            },
        }
    }
}

// ---------------------------------------------------------------------
// Realtime peer link
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum RealtimeClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseCreateBody },
}

#[derive(Debug, Serialize)]
pub struct ResponseCreateBody {
    pub instructions: String,
}

#[derive(Debug, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: &'static str,
    pub output_audio_format: &'static str,
    pub input_audio_transcription: InputAudioTranscriptionConfig,
    pub turn_detection: TurnDetectionConfig,
}

#[derive(Debug, Serialize)]
pub struct InputAudioTranscriptionConfig {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct TurnDetectionConfig {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub threshold: f32,
    pub silence_duration_ms: u32,
    pub prefix_padding_ms: u32,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        Self {
            kind: "server_vad",
            threshold: SERVER_VAD_THRESHOLD,
            silence_duration_ms: SERVER_VAD_SILENCE_DURATION_MS,
            prefix_padding_ms: SERVER_VAD_PREFIX_PADDING_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeServerEvent {
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta { delta: String },
    #[serde(rename = "response.output_text.delta")]
    ResponseTextDelta { delta: String },
    #[serde(rename = "response.completed")]
    ResponseCompleted,
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted { transcript: String },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<RealtimeErrorBody>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct RealtimeErrorBody {
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------
// Finalizer HTTP payloads
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl SummaryRequest {
    pub fn new(model: impl Into<String>, system_prompt: &str, transcript: &str) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: transcript.to_string(),
                },
            ],
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: SUMMARY_TEMPERATURE,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub choices: Vec<SummaryChoice>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryChoice {
    pub message: SummaryChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct SummaryChoiceMessage {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallLogRecord {
    pub twilio_call_sid: Option<String>,
    pub org_id: Option<String>,
    pub prospect_id: Option<String>,
    pub status: String,
    pub direction: String,
    pub to_number: Option<String>,
    pub from_number: Option<String>,
    pub transcript: String,
    pub ai_summary: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: String,
    pub model: String,
    pub recording_url: Option<String>,
    pub recording_duration_seconds: Option<u32>,
}

impl CallLogRecord {
    pub fn status_completed() -> String {
        "COMPLETED".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_defaults_outbound_on_unknown() {
        assert_eq!(Direction::from_wire(Some("sideways")), Direction::Outbound);
        assert_eq!(Direction::from_wire(None), Direction::Outbound);
        assert_eq!(Direction::from_wire(Some("INBOUND")), Direction::Inbound);
    }

    #[test]
    fn call_type_defaults_first_on_unknown() {
        assert_eq!(CallType::from_wire(Some("whatever")), CallType::First);
        assert_eq!(CallType::from_wire(Some("FOLLOWUP")), CallType::Followup);
    }

    #[test]
    fn parses_start_event_with_custom_parameters() {
        let raw = r#"{
            "event": "start",
            "streamSid": "MZ123",
            "start": {
                "callSid": "CA456",
                "customParameters": {
                    "direction": "INBOUND",
                    "call_type": "FOLLOWUP",
                    "last_summary": "prior notes"
                }
            }
        }"#;
        let event: TelephonyEvent = serde_json::from_str(raw).unwrap();
        match event {
            TelephonyEvent::Start { stream_sid, start } => {
                assert_eq!(stream_sid, "MZ123");
                assert_eq!(start.call_sid.as_deref(), Some("CA456"));
                assert_eq!(start.custom_parameters.direction.as_deref(), Some("INBOUND"));
                assert_eq!(start.custom_parameters.last_transcript, None);
            }
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn parses_media_event() {
        let raw = r#"{"event":"media","streamSid":"MZ1","media":{"payload":"abcd"}}"#;
        let event: TelephonyEvent = serde_json::from_str(raw).unwrap();
        match event {
            TelephonyEvent::Media { media, .. } => assert_eq!(media.payload, "abcd"),
            _ => panic!("expected Media"),
        }
    }

    #[test]
    fn unrecognized_event_falls_back_to_unknown() {
        let raw = r#"{"event":"connectedSomethingElse"}"#;
        let event: TelephonyEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, TelephonyEvent::Unknown));
    }

    #[test]
    fn outbound_media_frame_serializes_expected_shape() {
        let frame = OutboundMediaFrame::new("MZ1", "base64payload");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ1");
        assert_eq!(json["media"]["payload"], "base64payload");
    }

    #[test]
    fn call_log_record_serializes_absent_fields_as_explicit_null() {
        let record = CallLogRecord {
            twilio_call_sid: Some("CA1".to_string()),
            org_id: None,
            prospect_id: None,
            status: CallLogRecord::status_completed(),
            direction: Direction::Outbound.as_str().to_string(),
            to_number: None,
            from_number: None,
            transcript: "hi".to_string(),
            ai_summary: None,
            started_at: None,
            ended_at: "2026-07-27T00:00:00Z".to_string(),
            model: "gpt-4o-mini".to_string(),
            recording_url: None,
            recording_duration_seconds: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["org_id"].is_null());
        assert!(json["ai_summary"].is_null());
        assert_eq!(json["status"], "COMPLETED");
    }

    #[test]
    fn realtime_server_event_parses_known_and_unknown_types() {
        let delta: RealtimeServerEvent =
            serde_json::from_str(r#"{"type":"response.audio.delta","delta":"xx"}"#).unwrap();
        assert!(matches!(delta, RealtimeServerEvent::ResponseAudioDelta { delta } if delta == "xx"));

        let unknown: RealtimeServerEvent =
            serde_json::from_str(r#"{"type":"session.created"}"#).unwrap();
        assert!(matches!(unknown, RealtimeServerEvent::Unknown));
    }
}
