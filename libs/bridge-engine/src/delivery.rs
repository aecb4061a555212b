use std::panic::{self, AssertUnwindSafe};

use bridge_api::{Outbound, TransportSink};

/// Hand `payload` to the sink without letting a failure reach the caller.
///
/// Returns `true` when the sink accepted the payload.
pub(crate) fn deliver(sink: &dyn TransportSink, topic: &str, payload: Outbound) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.send_message(topic, payload))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(topic = %topic, error = %e, "transport sink rejected payload");
            false
        }
        Err(_) => {
            tracing::error!(topic = %topic, "transport sink panicked");
            false
        }
    }
}
