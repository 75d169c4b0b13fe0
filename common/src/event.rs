use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auxiliary classifier metrics attached to an event (e.g. `brightness`).
///
/// Values must be JSON numbers; anything else fails deserialization instead
/// of being coerced.
pub type Aux = BTreeMap<String, f64>;

pub const STATUS_OK: &str = "ok";
pub const NO_EVENT_MESSAGE: &str = "no event received yet";
pub const LAST_EVENT_MESSAGE: &str = "last event recorded";

/// Body of `POST /ingest`: the client-populated half of a timestamped event.
///
/// Timestamps are seconds since the Unix epoch as floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub sent_ts: f64,
    pub caption: String,
    #[serde(default)]
    pub aux: Option<Aux>,
}

/// Body of a successful `POST /ingest` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub server_recv_ts: f64,
    pub server_send_ts: f64,
    pub echo_caption: String,
}

/// A fully stamped event as retained by the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub sent_ts: f64,
    pub caption: String,
    pub aux: Option<Aux>,
    pub server_recv_ts: f64,
    pub server_send_ts: f64,
}

impl StoredEvent {
    /// Attach server timestamps to an ingested request.
    ///
    /// `server_send_ts` is clamped so it never precedes `server_recv_ts`,
    /// even if the wall clock stepped backwards in between.
    pub fn stamp(request: IngestRequest, server_recv_ts: f64, server_send_ts: f64) -> Self {
        Self {
            sent_ts: request.sent_ts,
            caption: request.caption,
            aux: request.aux,
            server_recv_ts,
            server_send_ts: server_send_ts.max(server_recv_ts),
        }
    }

    pub fn echo(&self) -> IngestResponse {
        IngestResponse {
            server_recv_ts: self.server_recv_ts,
            server_send_ts: self.server_send_ts,
            echo_caption: self.caption.clone(),
        }
    }
}

/// Body of `GET /status`. `last_event` is omitted until the first ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event: Option<StoredEvent>,
}

impl StatusResponse {
    pub fn from_slot(last_event: Option<StoredEvent>) -> Self {
        let message = if last_event.is_some() {
            LAST_EVENT_MESSAGE
        } else {
            NO_EVENT_MESSAGE
        };
        Self {
            status: STATUS_OK.into(),
            message: message.into(),
            last_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_is_optional_on_ingest() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"sent_ts": 1.5, "caption": "Escuro | Parado"}"#).unwrap();
        assert_eq!(req.aux, None);

        let req: IngestRequest =
            serde_json::from_str(r#"{"sent_ts": 1.5, "caption": "x", "aux": null}"#).unwrap();
        assert_eq!(req.aux, None);
    }

    #[test]
    fn integer_timestamps_are_accepted() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"sent_ts": 100, "caption": "x", "aux": {"b": 3}}"#).unwrap();
        assert_eq!(req.sent_ts, 100.0);
        assert_eq!(req.aux.unwrap()["b"], 3.0);
    }

    #[test]
    fn non_numeric_aux_is_rejected() {
        let result: Result<IngestRequest, _> = serde_json::from_str(
            r#"{"sent_ts": 1.0, "caption": "x", "aux": {"brightness": "bright"}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_caption_is_rejected() {
        let result: Result<IngestRequest, _> = serde_json::from_str(r#"{"sent_ts": 1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn stamp_clamps_backwards_clock() {
        let req = IngestRequest {
            sent_ts: 10.0,
            caption: "c".into(),
            aux: None,
        };
        let event = StoredEvent::stamp(req, 20.0, 19.5);
        assert_eq!(event.server_send_ts, 20.0);
        assert!(event.server_recv_ts <= event.server_send_ts);
    }

    #[test]
    fn echo_preserves_caption() {
        let req = IngestRequest {
            sent_ts: 0.0,
            caption: "Ilum. media | Movimento ✓ 日本".into(),
            aux: None,
        };
        let event = StoredEvent::stamp(req.clone(), 1.0, 2.0);
        let echo = event.echo();
        assert_eq!(echo.echo_caption, req.caption);
        assert_eq!((echo.server_recv_ts, echo.server_send_ts), (1.0, 2.0));
    }

    #[test]
    fn empty_status_omits_last_event() {
        let json = serde_json::to_value(StatusResponse::from_slot(None)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["message"], NO_EVENT_MESSAGE);
        assert!(json.get("last_event").is_none());
    }

    #[test]
    fn stored_event_serializes_null_aux() {
        let event = StoredEvent::stamp(
            IngestRequest {
                sent_ts: 1.0,
                caption: "c".into(),
                aux: None,
            },
            2.0,
            3.0,
        );
        let json = serde_json::to_value(StatusResponse::from_slot(Some(event))).unwrap();
        assert_eq!(json["message"], LAST_EVENT_MESSAGE);
        assert!(json["last_event"]["aux"].is_null());
        assert_eq!(json["last_event"]["server_send_ts"], 3.0);
    }
}
