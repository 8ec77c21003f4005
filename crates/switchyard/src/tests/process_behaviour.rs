//! End-to-end tests for serving a bridge over in-memory streams.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rstest::rstest;
use serde_json::json;
use switchyard_protocol::{DISPATCH, ERROR_EVENT, ErrorCode, READY_EVENT};
use tokio::io::{AsyncRead, BufReader, ReadBuf};

use crate::bridge::BridgeSettings;
use crate::process::{ProcessError, serve};

use super::support::{HealthEvent, RecordingHealthReporter, SharedBuffer, test_bridge};

/// Input stream whose first read fails.
struct BrokenInput;

impl AsyncRead for BrokenInput {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin went away")))
    }
}

async fn serve_input(
    input: &'static [u8],
    reporter: &Arc<RecordingHealthReporter>,
) -> (Result<u64, ProcessError>, SharedBuffer) {
    serve_with(BridgeSettings::default(), input, reporter).await
}

async fn serve_with(
    settings: BridgeSettings,
    input: &'static [u8],
    reporter: &Arc<RecordingHealthReporter>,
) -> (Result<u64, ProcessError>, SharedBuffer) {
    let (bridge, receiver, client) = test_bridge(settings);
    drop(client);
    let output = SharedBuffer::default();
    let result = serve(bridge, receiver, input, output.clone(), reporter.as_ref()).await;
    (result, output)
}

#[tokio::test]
async fn ready_is_written_before_any_response() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (result, output) = serve_input(b"{\"nonce\":\"1\",\"cmd\":\"PING\"}\n", &reporter).await;

    assert_eq!(result.expect("serve"), 1);
    let envelopes = output.envelopes();
    assert_eq!(envelopes.len(), 2, "output: {envelopes:?}");
    assert_eq!(envelopes[0].cmd, DISPATCH);
    assert_eq!(envelopes[0].evt.as_deref(), Some(READY_EVENT));
    assert_eq!(envelopes[1].nonce.as_deref(), Some("1"));
    assert_eq!(envelopes[1].data, json!({ "pong": true }));
}

#[rstest]
#[case::empty(b"", 0)]
#[case::blank_lines(b"\n   \n\t\n", 0)]
#[case::mixed(b"{\"nonce\":\"1\",\"cmd\":\"PING\"}\n\n{\"nonce\":\"2\",\"cmd\":\"PING\"}\n", 2)]
#[case::no_trailing_newline(b"{\"nonce\":\"1\",\"cmd\":\"PING\"}", 1)]
#[tokio::test]
async fn every_command_line_gets_one_envelope(
    #[case] input: &'static [u8],
    #[case] commands: u64,
) {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (result, output) = serve_input(input, &reporter).await;

    assert_eq!(result.expect("serve"), commands);
    let responses = output.envelopes().len() - 1;
    assert_eq!(u64::try_from(responses).expect("count"), commands);
    assert_eq!(
        reporter.events(),
        vec![HealthEvent::BridgeReady, HealthEvent::InputClosed(commands)]
    );
}

#[tokio::test]
async fn bad_lines_do_not_stop_the_stream() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let input: &'static [u8] =
        b"{oops\n{\"nonce\":\"2\",\"cmd\":\"EXPLODE\"}\n{\"nonce\":\"3\",\"cmd\":\"PING\"}\n";
    let (result, output) = serve_input(input, &reporter).await;

    assert_eq!(result.expect("serve"), 3);
    let envelopes = output.envelopes();
    let codes: Vec<Option<ErrorCode>> = envelopes[1..]
        .iter()
        .map(|envelope| envelope.error_payload().map(|error| error.code))
        .collect();
    assert!(codes.contains(&Some(ErrorCode::InvalidPayload)));
    assert!(codes.contains(&Some(ErrorCode::UnknownError)));
    assert!(
        envelopes
            .iter()
            .any(|envelope| envelope.nonce.as_deref() == Some("3") && !envelope.is_error()),
        "PING after failures was not answered: {envelopes:?}"
    );
}

#[tokio::test]
async fn read_failures_are_reported_to_the_host() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (bridge, receiver, client) = test_bridge(BridgeSettings::default());
    drop(client);
    let output = SharedBuffer::default();

    let result = serve(
        bridge,
        receiver,
        BufReader::new(BrokenInput),
        output.clone(),
        reporter.as_ref(),
    )
    .await;

    assert!(matches!(result, Err(ProcessError::Input { .. })));
    let envelopes = output.envelopes();
    let failure = envelopes.last().expect("failure envelope");
    assert_eq!(failure.evt.as_deref(), Some(ERROR_EVENT));
    assert_eq!(failure.nonce, None);
    let error = failure.error_payload().expect("error payload");
    assert_eq!(error.code, ErrorCode::UnknownError);
    assert!(error.message.contains("stdin went away"), "{}", error.message);
    assert_eq!(reporter.events(), vec![HealthEvent::BridgeReady]);
}

#[tokio::test]
async fn non_utf8_lines_are_refused_and_the_stream_continues() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let input: &'static [u8] = b"{\"nonce\":\"1\",\"cmd\":\"\xff\xfe\"}\n{\"nonce\":\"2\",\"cmd\":\"PING\"}\n";
    let (result, output) = serve_input(input, &reporter).await;

    assert_eq!(result.expect("serve"), 2);
    let envelopes = output.envelopes();
    assert_eq!(envelopes.len(), 3, "output: {envelopes:?}");
    let refused: Vec<_> = envelopes.iter().filter(|envelope| envelope.is_error()).collect();
    assert_eq!(refused.len(), 1, "output: {envelopes:?}");
    assert_eq!(refused[0].cmd, DISPATCH);
    assert_eq!(refused[0].nonce, None);
    let error = refused[0].error_payload().expect("error payload");
    assert_eq!(error.code, ErrorCode::InvalidPayload);
    assert_eq!(error.message, "Invalid payload, expected json");
    assert!(
        envelopes
            .iter()
            .any(|envelope| envelope.nonce.as_deref() == Some("2") && !envelope.is_error()),
        "PING after the bad line was not answered: {envelopes:?}"
    );
    assert_eq!(
        reporter.events(),
        vec![HealthEvent::BridgeReady, HealthEvent::InputClosed(2)]
    );
}

#[tokio::test]
async fn lines_over_the_limit_get_one_rejection() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let settings = BridgeSettings {
        max_message_bytes: 32,
        ..BridgeSettings::default()
    };
    let input: &'static [u8] = b"{\"nonce\":\"1\",\"cmd\":\"PING\",\"args\":{\"pad\":\"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx\"}}\n{\"nonce\":\"2\",\"cmd\":\"PING\"}\n";
    let (result, output) = serve_with(settings, input, &reporter).await;

    assert_eq!(result.expect("serve"), 2);
    let envelopes = output.envelopes();
    assert_eq!(envelopes.len(), 3, "output: {envelopes:?}");
    let refused: Vec<_> = envelopes.iter().filter(|envelope| envelope.is_error()).collect();
    assert_eq!(refused.len(), 1, "output: {envelopes:?}");
    assert_eq!(refused[0].nonce, None);
    let error = refused[0].error_payload().expect("error payload");
    assert_eq!(error.code, ErrorCode::InvalidPayload);
    assert_eq!(error.message, "Payload exceeds 32 byte limit");
    assert!(
        envelopes
            .iter()
            .any(|envelope| envelope.nonce.as_deref() == Some("2") && !envelope.is_error()),
        "PING after the oversized line was not answered: {envelopes:?}"
    );
}

#[tokio::test]
async fn an_unterminated_oversized_tail_is_refused_at_end_of_input() {
    let reporter = Arc::new(RecordingHealthReporter::default());
    let settings = BridgeSettings {
        max_message_bytes: 16,
        ..BridgeSettings::default()
    };
    let (result, output) =
        serve_with(settings, b"{\"nonce\":\"1\",\"cmd\":\"PING\"", &reporter).await;

    assert_eq!(result.expect("serve"), 1);
    let envelopes = output.envelopes();
    let last = envelopes.last().expect("rejection");
    let error = last.error_payload().expect("error payload");
    assert_eq!(error.message, "Payload exceeds 16 byte limit");
}
