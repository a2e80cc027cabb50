use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use shared_codec::{mulaw_to_pcm16, pcm16_le_to_samples, upsample_8k_to_16k};
use shared_protocol::{CallType, CustomParameters, Direction, OutboundMediaFrame, RealtimeServerEvent, TelephonyEvent};
use shared_vad::Vad;

use crate::config::Config;
use crate::finalizer;
use crate::realtime::RealtimeLink;
use crate::session_config::{self, CallMetadata};
use crate::telephony::TelephonyLink;
use crate::transcript::TranscriptAssembler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Configuring,
    Active,
    Finalizing,
    Closed,
}

/// Per-connection state for one bridged telephone call. Owns the VAD and
/// transcript assembler, and the bookkeeping needed for barge-in and
/// at-most-once finalization.
pub struct CallSession {
    pub connection_id: String,
    pub stream_id: Option<String>,
    pub call_id: Option<String>,
    pub direction: Direction,
    pub call_type: CallType,
    pub last_summary: Option<String>,
    pub last_transcript: Option<String>,
    pub vad: Vad,
    pub transcript: TranscriptAssembler,
    pub realtime_ready: bool,
    pub finalized: bool,
    pub state: State,
    pub dropped_egress_frames: u64,
    pub dropped_ingress_frames: u64,
}

impl CallSession {
    pub fn new(connection_id: String, energy_threshold: i64, hangover_ms: u64) -> Self {
        Self {
            connection_id,
            stream_id: None,
            call_id: None,
            direction: Direction::Outbound,
            call_type: CallType::First,
            last_summary: None,
            last_transcript: None,
            vad: Vad::new(energy_threshold, hangover_ms),
            transcript: TranscriptAssembler::new(),
            realtime_ready: false,
            finalized: false,
            state: State::Init,
            dropped_egress_frames: 0,
            dropped_ingress_frames: 0,
        }
    }

    /// First non-empty of call_id, stream_id, connection_id.
    pub fn correlation_id(&self) -> String {
        for candidate in [self.call_id.as_deref(), self.stream_id.as_deref()] {
            if let Some(id) = candidate {
                if !id.trim().is_empty() {
                    return id.to_string();
                }
            }
        }
        self.connection_id.clone()
    }

    pub fn apply_start(
        &mut self,
        stream_id: String,
        call_id: Option<String>,
        params: &CustomParameters,
    ) {
        self.stream_id = Some(stream_id);
        self.call_id = call_id;
        self.direction = Direction::from_wire(params.direction.as_deref());
        self.call_type = CallType::from_wire(params.call_type.as_deref());
        self.last_summary = params.last_summary.clone();
        self.last_transcript = params.last_transcript.clone();
        self.state = State::Configuring;
    }

    pub fn metadata(&self) -> CallMetadata {
        CallMetadata {
            direction: self.direction,
            call_type: self.call_type,
            last_summary: self.last_summary.clone(),
            last_transcript: self.last_transcript.clone(),
        }
    }

    pub fn mark_active(&mut self) {
        self.realtime_ready = true;
        self.state = State::Active;
    }

    pub fn mark_realtime_disconnected(&mut self) {
        self.realtime_ready = false;
    }

    /// Decode an inbound µ-law frame, feed it to the VAD, and return the
    /// upsampled 16kHz PCM ready for the realtime peer, or `None` if the
    /// realtime peer isn't ready to receive audio yet.
    pub fn ingest_media(&mut self, mulaw_bytes: &[u8], now: Instant) -> Option<Vec<u8>> {
        let pcm8k = mulaw_to_pcm16(mulaw_bytes);
        let samples = pcm16_le_to_samples(&pcm8k);
        self.vad.observe_local_frame(&samples, now);

        if !self.realtime_ready {
            self.dropped_ingress_frames += 1;
            debug!(
                correlation_id = %self.correlation_id(),
                total_dropped = self.dropped_ingress_frames,
                "dropping inbound frame: realtime peer not ready"
            );
            return None;
        }
        Some(upsample_8k_to_16k(&pcm8k))
    }

    /// Whether an outbound realtime audio-delta frame should be dropped
    /// because the human is currently talking (barge-in).
    pub fn should_drop_egress(&mut self) -> bool {
        if self.vad.human_speaking() {
            self.dropped_egress_frames += 1;
            debug!(
                correlation_id = %self.correlation_id(),
                total_dropped = self.dropped_egress_frames,
                "dropping outbound audio delta: barge-in gate active"
            );
            true
        } else {
            false
        }
    }

    pub fn on_peer_speech_started(&mut self, now: Instant) {
        self.vad.on_peer_speech_started(now);
    }

    pub fn on_peer_speech_stopped(&mut self) {
        self.vad.on_peer_speech_stopped();
    }

    pub fn on_caller_transcript(&mut self, text: &str) {
        self.transcript.append_caller_line(text);
    }

    pub fn on_agent_delta(&mut self, delta: &str) {
        self.transcript.push_agent_delta(delta);
    }

    pub fn on_response_completed(&mut self) {
        self.transcript.commit_agent_buffer();
    }

    /// Idempotency guard: returns `false` if finalization already ran.
    pub fn begin_finalizing(&mut self) -> bool {
        if self.finalized {
            return false;
        }
        self.finalized = true;
        self.state = State::Finalizing;
        true
    }

    pub fn mark_closed(&mut self) {
        self.state = State::Closed;
    }
}

/// Drive one telephony connection end to end: accept, wait for `start`,
/// bridge audio both ways against the realtime peer, and finalize on hangup.
pub async fn run(stream: TcpStream, connection_id: String, config: Arc<Config>) -> Result<()> {
    let mut telephony = TelephonyLink::accept(stream).await?;
    let mut session =
        CallSession::new(connection_id, config.energy_threshold, config.vad_hangover_ms);

    loop {
        match telephony.next_event().await {
            Some(Ok(TelephonyEvent::Connected)) => continue,
            Some(Ok(TelephonyEvent::Start { stream_sid, start })) => {
                session.apply_start(stream_sid, start.call_sid, &start.custom_parameters);
                break;
            }
            Some(Ok(other)) => {
                warn!(?other, "unexpected event before start");
            }
            Some(Err(err)) => {
                error!(%err, "error waiting for start event");
                return Err(err);
            }
            None => {
                info!("telephony peer closed before start event");
                return Ok(());
            }
        }
    }

    info!(correlation_id = %session.correlation_id(), "call starting");

    let mut realtime =
        RealtimeLink::connect(&config.realtime_ws_url, &config.realtime_api_key, &config.realtime_model)
            .await?;
    let metadata = session.metadata();
    realtime
        .send_session_config(session_config::build_session_config(&config, &metadata))
        .await?;
    realtime
        .send_initial_directive(session_config::build_initial_directive(
            session.direction,
            session.call_type,
        ))
        .await?;
    session.mark_active();
    let mut realtime: Option<RealtimeLink> = Some(realtime);

    loop {
        tokio::select! {
            telephony_event = telephony.next_event() => {
                match telephony_event {
                    Some(Ok(TelephonyEvent::Media { media, .. })) => {
                        let mulaw = match BASE64.decode(media.payload.as_bytes()) {
                            Ok(bytes) => bytes,
                            Err(err) => {
                                warn!(%err, "failed to decode media payload");
                                continue;
                            }
                        };
                        if let Some(pcm16k) = session.ingest_media(&mulaw, Instant::now()) {
                            if let Some(link) = realtime.as_mut() {
                                if let Err(err) = link.append_audio(&pcm16k).await {
                                    error!(%err, "failed to forward audio to realtime peer");
                                    session.mark_realtime_disconnected();
                                    realtime = None;
                                }
                            }
                        }
                    }
                    Some(Ok(TelephonyEvent::Mark { .. })) => {}
                    Some(Ok(TelephonyEvent::Stop { .. })) => {
                        info!(correlation_id = %session.correlation_id(), "telephony peer sent stop");
                        break;
                    }
                    Some(Ok(TelephonyEvent::Connected)) | Some(Ok(TelephonyEvent::Start { .. })) => {
                        warn!("unexpected duplicate connected/start event mid-call");
                    }
                    Some(Ok(TelephonyEvent::Unknown)) => {}
                    Some(Err(err)) => {
                        error!(%err, "telephony transport error");
                        break;
                    }
                    None => {
                        info!(correlation_id = %session.correlation_id(), "telephony peer disconnected");
                        break;
                    }
                }
            }
            realtime_event = async {
                match realtime.as_mut() {
                    Some(link) => link.next_event().await,
                    None => std::future::pending().await,
                }
            }, if realtime.is_some() => {
                match realtime_event {
                    Some(Ok(RealtimeServerEvent::SpeechStarted)) => {
                        session.on_peer_speech_started(Instant::now());
                    }
                    Some(Ok(RealtimeServerEvent::SpeechStopped)) => {
                        session.on_peer_speech_stopped();
                    }
                    Some(Ok(RealtimeServerEvent::ResponseAudioDelta { delta })) => {
                        if session.should_drop_egress() {
                            continue;
                        }
                        if let Some(stream_sid) = session.stream_id.clone() {
                            let frame = OutboundMediaFrame::new(stream_sid, delta);
                            if let Err(err) = telephony.send_media(frame).await {
                                error!(%err, "failed to forward audio to telephony peer");
                                break;
                            }
                        }
                    }
                    Some(Ok(RealtimeServerEvent::ResponseTextDelta { delta })) => {
                        session.on_agent_delta(&delta);
                    }
                    Some(Ok(RealtimeServerEvent::ResponseCompleted)) => {
                        session.on_response_completed();
                    }
                    Some(Ok(RealtimeServerEvent::InputAudioTranscriptionCompleted { transcript })) => {
                        session.on_caller_transcript(&transcript);
                    }
                    Some(Ok(RealtimeServerEvent::Error { error: body })) => {
                        warn!(?body, "realtime peer reported an error");
                    }
                    Some(Ok(RealtimeServerEvent::Unknown)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "realtime transport error, continuing audio-only");
                        session.mark_realtime_disconnected();
                        realtime = None;
                    }
                    None => {
                        info!(correlation_id = %session.correlation_id(), "realtime peer disconnected, continuing until telephony stop");
                        session.mark_realtime_disconnected();
                        realtime = None;
                    }
                }
            }
        }
    }

    let _ = telephony.close().await;
    if let Some(mut link) = realtime {
        let _ = link.close().await;
    }

    finalizer::finalize(&mut session, &config).await;
    info!(correlation_id = %session.correlation_id(), "call finalized");
    Ok(())
}
