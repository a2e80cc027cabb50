use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use shared_protocol::{
    CallLogRecord, SUMMARY_MIN_TRANSCRIPT_LEN, SummaryRequest, SummaryResponse,
};

use crate::config::Config;
use crate::session::CallSession;

/// Whether the assembled transcript is long enough to be worth summarizing.
pub fn needs_summary(transcript: &str) -> bool {
    transcript.trim().len() >= SUMMARY_MIN_TRANSCRIPT_LEN
}

/// A call with no call id or an empty transcript has nothing worth logging.
fn finalization_precondition(call_id: Option<&str>, transcript: &str) -> bool {
    let has_call_id = call_id.map(|c| !c.trim().is_empty()).unwrap_or(false);
    has_call_id && !transcript.trim().is_empty()
}

/// Run the end-of-call pipeline at most once per session: summarize (when
/// the transcript is long enough), post the call-log record, then close.
pub async fn finalize(session: &mut CallSession, config: &Config) {
    if !session.begin_finalizing() {
        return;
    }

    let call_id = session.call_id.clone();
    let transcript = session.transcript.trimmed();

    if !finalization_precondition(call_id.as_deref(), &transcript) {
        warn!(
            correlation_id = %session.correlation_id(),
            "skipping finalization: missing call id or empty transcript"
        );
        session.mark_closed();
        return;
    }

    let summary = if needs_summary(&transcript) {
        request_summary(config, &transcript).await
    } else {
        None
    };

    let record = CallLogRecord {
        twilio_call_sid: call_id,
        org_id: config.org_id.clone(),
        prospect_id: None,
        status: CallLogRecord::status_completed(),
        direction: session.direction.as_str().to_string(),
        to_number: None,
        from_number: None,
        transcript,
        ai_summary: summary,
        started_at: None,
        ended_at: chrono::Utc::now().to_rfc3339(),
        model: config.summary_model.clone(),
        recording_url: None,
        recording_duration_seconds: None,
    };

    if let Err(err) = post_call_log(config, &record).await {
        error!(correlation_id = %session.correlation_id(), %err, "failed to post call log record");
    }

    session.mark_closed();
}

async fn request_summary(config: &Config, transcript: &str) -> Option<String> {
    let request = SummaryRequest::new(
        config.summary_model.clone(),
        &config.summary_system_prompt,
        transcript,
    );

    let response = match config
        .http_client
        .post(&config.summary_endpoint)
        .bearer_auth(&config.realtime_api_key)
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!(%err, "summary request failed");
            return None;
        }
    };

    if !response.status().is_success() {
        warn!(status = %response.status(), "summary endpoint returned an error status");
        return None;
    }

    let parsed: SummaryResponse = match response.json().await {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(%err, "failed to parse summary response");
            return None;
        }
    };

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string());

    content.filter(|c| !c.is_empty())
}

async fn post_call_log(config: &Config, record: &CallLogRecord) -> Result<()> {
    let response = config
        .http_client
        .post(&config.call_log_endpoint)
        .bearer_auth(&config.call_log_anon_key)
        .header("x-shared-secret", &config.call_log_shared_secret)
        .json(record)
        .send()
        .await
        .context("call log request failed")?;

    if !response.status().is_success() {
        bail!("call log endpoint returned status {}", response.status());
    }

    info!("call log record posted");
    Ok(())
}
