// SPDX-License-Identifier: MIT OR Apache-2.0
//! The wire envelope shapes exchanged between a client and a session.
//!
//! Three distinct shapes, not one tagged enum, because the wire itself
//! isn't uniform:
//!
//! - [`ClientEnvelope`] (inbound) is tagged on `event`, with `join`/`e`/
//!   `phx_leave` as the only three tags a client ever sends.
//! - [`Reply`] (outbound) is a flat `{ref, join_ref, topic, status, payload}`
//!   struct, addressed by ref/topic rather than wrapped in an `event`/
//!   `payload` pair — it never shares a shape with the other outbound kinds.
//! - [`Envelope`] (outbound patch/push-event/redirect/close) wraps every
//!   variant as `{event, payload}`, but a push-event's `event` is the
//!   arbitrary name the view chose to push — not a fixed discriminant, so
//!   no `#[serde(tag = "...")]` derive can express it. Its (de)serialization
//!   is hand-written below.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// A client-originated event's nested `{e, p}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEventPayload {
    /// Event name the view's `handle_event` dispatches on.
    #[serde(rename = "e")]
    pub name: String,
    /// Event payload, view-defined shape.
    #[serde(rename = "p")]
    pub payload: Value,
}

/// A message the client sends, tagged on `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEnvelope {
    /// Request to mount a view; the topic is carried by the transport's
    /// subscribe call, not this payload.
    #[serde(rename = "join")]
    Join {
        /// Join-time parameters, view-defined shape.
        payload: Value,
    },
    /// A UI-originated event bound to the mounted view.
    #[serde(rename = "e")]
    Event {
        /// The nested `{e: name, p: payload}` body.
        payload: ClientEventPayload,
        /// Present when the client expects a [`Reply`].
        #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
        ref_id: Option<String>,
        /// Echoed back on the reply so a multiplexed transport can
        /// correlate it to this join.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        join_ref: Option<String>,
    },
    /// Tear down the session cleanly.
    #[serde(rename = "phx_leave")]
    Leave,
}

/// The reply to a client request: a join, or an [`ClientEnvelope::Event`]
/// that carried a `ref`.
///
/// Addressed by `ref`/`join_ref`/`topic` rather than wrapped in an
/// `event`/`payload` envelope — real channel replies are a flat shape of
/// their own, not a fourth `Envelope` variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Echoes the request's `ref`; absent for an unreferenced join.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    /// Echoes the request's `join_ref`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
    /// The topic this reply answers a request on.
    pub topic: String,
    /// `"ok"` or `"error"`.
    pub status: String,
    /// Reply payload.
    pub payload: Value,
}

/// A server-originated message other than a [`Reply`]: a render patch, a
/// push-event, a redirect, or a close notice.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A compressed JSON-Patch delta against the previously sent document,
    /// emitted once per render cycle (including cycles with no operations).
    Patch {
        /// Wire-compressed patch array (see `crate::serializer`).
        ops: Vec<Value>,
        /// Render cycle number, strictly increasing from 0.
        render_count: i64,
        /// Flash keys written during this cycle, if any.
        flash: Option<Value>,
    },
    /// `push_event(socket, name, payload)`. The wire tag itself *is* `name`
    /// — an arbitrary, view-chosen string, not a fixed discriminant.
    PushEvent {
        /// Opaque event name the client dispatches on.
        name: String,
        /// Arbitrary JSON payload.
        payload: Value,
    },
    /// A one-shot redirect; the client should tear down this session and
    /// navigate. Only sent when no [`Reply`] is pending this render cycle —
    /// otherwise the redirect is folded into that reply's payload instead.
    Redirect {
        /// Present for a local-path redirect.
        to: Option<String>,
        /// Present for an external-URL redirect.
        external: Option<String>,
    },
    /// The session is shutting down.
    Close {
        /// Machine-readable shutdown reason.
        reason: String,
    },
}

impl Envelope {
    fn tag_and_payload(&self) -> (String, Value) {
        match self {
            Envelope::Patch {
                ops,
                render_count,
                flash,
            } => {
                let mut obj = serde_json::Map::new();
                obj.insert("o".to_string(), Value::Array(ops.clone()));
                obj.insert("c".to_string(), Value::from(*render_count));
                if let Some(flash) = flash {
                    obj.insert("f".to_string(), flash.clone());
                }
                ("o".to_string(), Value::Object(obj))
            }
            Envelope::PushEvent { name, payload } => (name.clone(), payload.clone()),
            Envelope::Redirect { to, external } => {
                let mut obj = serde_json::Map::new();
                if let Some(to) = to {
                    obj.insert("to".to_string(), Value::from(to.clone()));
                }
                if let Some(external) = external {
                    obj.insert("external".to_string(), Value::from(external.clone()));
                }
                ("redirect".to_string(), Value::Object(obj))
            }
            Envelope::Close { reason } => (
                "close".to_string(),
                serde_json::json!({ "reason": reason }),
            ),
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (event, payload) = self.tag_and_payload();
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("event", &event)?;
        map.serialize_entry("payload", &payload)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EnvelopeVisitor;

        impl<'de> Visitor<'de> for EnvelopeVisitor {
            type Value = Envelope;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an envelope with an `event` tag and a `payload`")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut event: Option<String> = None;
                let mut payload: Option<Value> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "event" => event = Some(map.next_value()?),
                        "payload" => payload = Some(map.next_value()?),
                        _ => {
                            let _: de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                let event = event.ok_or_else(|| de::Error::missing_field("event"))?;
                let payload = payload.unwrap_or(Value::Null);

                match event.as_str() {
                    "o" => {
                        let ops = payload
                            .get("o")
                            .and_then(Value::as_array)
                            .cloned()
                            .ok_or_else(|| de::Error::missing_field("o"))?;
                        let render_count = payload
                            .get("c")
                            .and_then(Value::as_i64)
                            .ok_or_else(|| de::Error::missing_field("c"))?;
                        let flash = payload.get("f").cloned();
                        Ok(Envelope::Patch {
                            ops,
                            render_count,
                            flash,
                        })
                    }
                    "redirect" => {
                        let to = payload.get("to").and_then(Value::as_str).map(String::from);
                        let external = payload
                            .get("external")
                            .and_then(Value::as_str)
                            .map(String::from);
                        Ok(Envelope::Redirect { to, external })
                    }
                    "close" => {
                        let reason = payload
                            .get("reason")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        Ok(Envelope::Close { reason })
                    }
                    name => Ok(Envelope::PushEvent {
                        name: name.to_string(),
                        payload,
                    }),
                }
            }
        }

        deserializer.deserialize_map(EnvelopeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_join_round_trips_through_json() {
        let env = ClientEnvelope::Join {
            payload: json!({"user_id": 7}),
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["event"], "join");
        let back: ClientEnvelope = serde_json::from_value(wire).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn client_event_nests_name_and_payload_under_e_and_p() {
        let env = ClientEnvelope::Event {
            payload: ClientEventPayload {
                name: "inc".into(),
                payload: Value::Null,
            },
            ref_id: Some("1".into()),
            join_ref: Some("1".into()),
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["event"], "e");
        assert_eq!(wire["payload"]["e"], "inc");
        assert_eq!(wire["payload"]["p"], Value::Null);
        assert_eq!(wire["ref"], "1");
    }

    #[test]
    fn client_event_omits_ref_and_join_ref_when_absent() {
        let env = ClientEnvelope::Event {
            payload: ClientEventPayload {
                name: "inc".into(),
                payload: Value::Null,
            },
            ref_id: None,
            join_ref: None,
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert!(wire.get("ref").is_none());
        assert!(wire.get("join_ref").is_none());
    }

    #[test]
    fn client_leave_tags_as_phx_leave() {
        let wire = serde_json::to_value(&ClientEnvelope::Leave).unwrap();
        assert_eq!(wire["event"], "phx_leave");
    }

    #[test]
    fn reply_is_a_flat_struct_not_an_event_payload_wrapper() {
        let reply = Reply {
            ref_id: Some("3".into()),
            join_ref: Some("1".into()),
            topic: "room:lobby".into(),
            status: "ok".into(),
            payload: json!({}),
        };
        let wire = serde_json::to_value(&reply).unwrap();
        assert!(wire.get("event").is_none());
        assert_eq!(wire["ref"], "3");
        assert_eq!(wire["join_ref"], "1");
        assert_eq!(wire["topic"], "room:lobby");
        assert_eq!(wire["status"], "ok");
    }

    #[test]
    fn reply_omits_ref_and_join_ref_when_absent() {
        let reply = Reply {
            ref_id: None,
            join_ref: None,
            topic: "room:lobby".into(),
            status: "ok".into(),
            payload: json!({}),
        };
        let wire = serde_json::to_value(&reply).unwrap();
        assert!(wire.get("ref").is_none());
        assert!(wire.get("join_ref").is_none());
    }

    #[test]
    fn patch_wraps_o_c_f_under_event_o() {
        let env = Envelope::Patch {
            ops: vec![json!([2, "/r/count", 1])],
            render_count: 3,
            flash: None,
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["event"], "o");
        assert_eq!(wire["payload"]["c"], 3);
        assert_eq!(wire["payload"]["o"], json!([[2, "/r/count", 1]]));
        assert!(wire["payload"].get("f").is_none());

        let back: Envelope = serde_json::from_value(wire).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn patch_carries_flash_under_f_when_present() {
        let env = Envelope::Patch {
            ops: vec![],
            render_count: 0,
            flash: Some(json!({"info": "hi"})),
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["payload"]["f"]["info"], "hi");
    }

    #[test]
    fn push_event_tag_is_the_user_chosen_event_name() {
        let env = Envelope::PushEvent {
            name: "chart_update".into(),
            payload: json!({"value": 1}),
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["event"], "chart_update");
        assert_eq!(wire["payload"]["value"], 1);

        let back: Envelope = serde_json::from_value(wire).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn redirect_serializes_local_and_external_shapes() {
        let local = Envelope::Redirect {
            to: Some("/dashboard".into()),
            external: None,
        };
        let wire = serde_json::to_value(&local).unwrap();
        assert_eq!(wire["event"], "redirect");
        assert_eq!(wire["payload"]["to"], "/dashboard");
        assert!(wire["payload"].get("external").is_none());

        let external = Envelope::Redirect {
            to: None,
            external: Some("https://example.com".into()),
        };
        let wire = serde_json::to_value(&external).unwrap();
        assert_eq!(wire["payload"]["external"], "https://example.com");
        assert!(wire["payload"].get("to").is_none());
    }

    #[test]
    fn close_round_trips_through_json() {
        let env = Envelope::Close {
            reason: "shutdown".into(),
        };
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire["event"], "close");
        assert_eq!(wire["payload"]["reason"], "shutdown");
        let back: Envelope = serde_json::from_value(wire).unwrap();
        assert_eq!(back, env);
    }
}
