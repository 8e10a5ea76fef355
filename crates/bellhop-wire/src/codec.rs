use serde::Serialize;

use crate::class::ClassRegistry;
use crate::data::Data;
use crate::error::{Result, WireError};
use crate::revive::revive;

/// The bare string exchanged to complete the handshake. Never an envelope.
pub const HANDSHAKE_TOKEN: &str = "connected";

/// Default maximum inbound message size: 1 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default maximum nesting depth of inbound payloads.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Limits applied when decoding inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireConfig {
    /// Maximum message length in bytes.
    pub max_message_size: usize,
    /// Maximum array/object nesting depth.
    pub max_depth: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// The unit exchanged once connected.
///
/// Wire format:
/// ```text
/// {"type": "<event type>", "data": <any JSON, optional>}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Option<Data>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Interpret a decoded value as an envelope: an object with a string `type`.
    ///
    /// Anything else is handed back unchanged.
    pub fn from_data(data: Data) -> std::result::Result<Self, Data> {
        let mut map = match data {
            Data::Object(map) => map,
            other => return Err(other),
        };
        match map.remove("type") {
            Some(Data::String(kind)) => Ok(Self {
                kind,
                data: map.remove("data"),
            }),
            Some(other) => {
                map.insert("type".to_string(), other);
                Err(Data::Object(map))
            }
            None => Err(Data::Object(map)),
        }
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The bare handshake token.
    Handshake,
    /// A JSON object with a string `type` field.
    Envelope(Envelope),
    /// Valid JSON that is not an envelope.
    Other(Data),
}

/// Encode an envelope as JSON text.
pub fn encode_envelope(envelope: &Envelope) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode one inbound message, reviving classes registered in `classes`.
pub fn decode_message(text: &str, classes: &ClassRegistry, config: &WireConfig) -> Result<Inbound> {
    if text == HANDSHAKE_TOKEN {
        return Ok(Inbound::Handshake);
    }
    if text.len() > config.max_message_size {
        return Err(WireError::MessageTooLarge {
            size: text.len(),
            max: config.max_message_size,
        });
    }

    let value: serde_json::Value = serde_json::from_str(text)?;
    let data = revive(value, classes, config.max_depth)?;
    Ok(match Envelope::from_data(data) {
        Ok(envelope) => Inbound::Envelope(envelope),
        Err(other) => Inbound::Other(other),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::class::{FromWire, WireObject};

    #[derive(Debug, Default, PartialEq)]
    struct Score {
        points: i64,
        raw_seen: Option<Value>,
    }

    impl WireObject for Score {
        fn class_name(&self) -> &str {
            "game.Score"
        }

        fn to_json(&self) -> Value {
            json!({ "points": self.points })
        }
    }

    impl FromWire for Score {
        fn from_json(&mut self, raw: &Data) -> Result<()> {
            self.points = raw
                .get("points")
                .and_then(Data::as_i64)
                .ok_or_else(|| WireError::Revival {
                    class: "game.Score".to_string(),
                    message: "missing points".to_string(),
                })?;
            self.raw_seen = Some(raw.to_value());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Badge {
        label: String,
    }

    impl WireObject for Badge {
        fn class_name(&self) -> &str {
            "game.Badge"
        }

        fn to_json(&self) -> Value {
            json!({ "label": self.label })
        }
    }

    impl FromWire for Badge {
        fn from_json(&mut self, raw: &Data) -> Result<()> {
            self.label = raw
                .get("label")
                .and_then(Data::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Trophy {
        badge: Option<Data>,
    }

    impl WireObject for Trophy {
        fn class_name(&self) -> &str {
            "game.Trophy"
        }

        fn to_json(&self) -> Value {
            json!({ "badge": self.badge.as_ref().map(Data::to_value) })
        }
    }

    impl FromWire for Trophy {
        fn from_json(&mut self, raw: &Data) -> Result<()> {
            self.badge = raw.get("badge").cloned();
            Ok(())
        }
    }

    fn classes() -> ClassRegistry {
        ClassRegistry::new().with::<Score>("game.Score").unwrap()
    }

    #[test]
    fn handshake_token_is_not_json() {
        let decoded = decode_message(HANDSHAKE_TOKEN, &classes(), &WireConfig::default()).unwrap();
        assert_eq!(decoded, Inbound::Handshake);
    }

    #[test]
    fn quoted_token_is_not_a_handshake() {
        let decoded = decode_message("\"connected\"", &classes(), &WireConfig::default()).unwrap();
        assert_eq!(decoded, Inbound::Other(Data::from("connected")));
    }

    #[test]
    fn encode_omits_missing_data() {
        let text = encode_envelope(&Envelope::new("pause", None)).unwrap();
        assert_eq!(text, r#"{"type":"pause"}"#);

        let text = encode_envelope(&Envelope::new("ready", Some(json!({ "v": 1 }).into()))).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&text).unwrap(),
            json!({ "type": "ready", "data": { "v": 1 } })
        );
    }

    #[test]
    fn decode_envelope_with_and_without_data() {
        let config = WireConfig::default();
        let decoded = decode_message(r#"{"type":"progress","data":0.5}"#, &classes(), &config).unwrap();
        assert_eq!(
            decoded,
            Inbound::Envelope(Envelope::new("progress", Some(Data::from(0.5))))
        );

        let decoded = decode_message(r#"{"type":"loaded"}"#, &classes(), &config).unwrap();
        assert_eq!(decoded, Inbound::Envelope(Envelope::new("loaded", None)));

        let decoded = decode_message(r#"{"type":"x","data":null}"#, &classes(), &config).unwrap();
        assert_eq!(decoded, Inbound::Envelope(Envelope::new("x", Some(Data::Null))));
    }

    #[test]
    fn non_string_type_is_not_an_envelope() {
        let decoded = decode_message(r#"{"type":7,"data":1}"#, &classes(), &WireConfig::default())
            .unwrap();
        assert_eq!(
            decoded,
            Inbound::Other(Data::from(json!({ "type": 7, "data": 1 })))
        );
    }

    #[test]
    fn nested_classes_are_revived_with_raw_value() {
        let text = r#"{"type":"score","data":{"best":{"__classname":"game.Score","points":12}}}"#;
        let Inbound::Envelope(envelope) =
            decode_message(text, &classes(), &WireConfig::default()).unwrap()
        else {
            panic!("expected envelope");
        };

        let best = envelope.data.as_ref().and_then(|d| d.get("best")).unwrap();
        let score = best.as_typed::<Score>().expect("score should be revived");
        assert_eq!(score.points, 12);
        assert_eq!(
            score.raw_seen,
            Some(json!({ "__classname": "game.Score", "points": 12 }))
        );
    }

    #[test]
    fn nested_class_inside_class_is_revived_first() {
        let classes = ClassRegistry::new()
            .with::<Trophy>("game.Trophy")
            .unwrap()
            .with::<Badge>("game.Badge")
            .unwrap();
        let text = r#"{"type":"award","data":{"__classname":"game.Trophy","badge":{"__classname":"game.Badge","label":"gold"}}}"#;
        let Inbound::Envelope(envelope) =
            decode_message(text, &classes, &WireConfig::default()).unwrap()
        else {
            panic!("expected envelope");
        };

        let trophy = envelope
            .data
            .as_ref()
            .and_then(|d| d.as_typed::<Trophy>())
            .expect("trophy should be revived");
        let badge = trophy
            .badge
            .as_ref()
            .and_then(|d| d.as_typed::<Badge>())
            .expect("badge should be revived before its parent");
        assert_eq!(badge.label, "gold");
    }

    #[test]
    fn unknown_class_stays_plain() {
        let text = r#"{"type":"x","data":{"__classname":"game.Unknown","a":1}}"#;
        let Inbound::Envelope(envelope) =
            decode_message(text, &classes(), &WireConfig::default()).unwrap()
        else {
            panic!("expected envelope");
        };
        let data = envelope.data.unwrap();
        assert!(data.class_name().is_none());
        assert_eq!(data.get("a").and_then(Data::as_i64), Some(1));
    }

    #[test]
    fn failed_revival_rejects_message() {
        let text = r#"{"type":"x","data":{"__classname":"game.Score"}}"#;
        assert!(matches!(
            decode_message(text, &classes(), &WireConfig::default()),
            Err(WireError::Revival { .. })
        ));
    }

    #[test]
    fn typed_roundtrip_through_text() {
        let envelope = Envelope::new(
            "score",
            Some(Data::typed(Score {
                points: 5,
                raw_seen: None,
            })),
        );
        let text = encode_envelope(&envelope).unwrap();
        let Inbound::Envelope(decoded) =
            decode_message(&text, &classes(), &WireConfig::default()).unwrap()
        else {
            panic!("expected envelope");
        };
        let score = decoded.data.as_ref().and_then(|d| d.as_typed::<Score>()).unwrap();
        assert_eq!(score.points, 5);
    }

    #[test]
    fn limits_are_enforced() {
        let small = WireConfig {
            max_message_size: 8,
            ..WireConfig::default()
        };
        assert!(matches!(
            decode_message(r#"{"type":"long-name"}"#, &classes(), &small),
            Err(WireError::MessageTooLarge { .. })
        ));

        let shallow = WireConfig {
            max_depth: 2,
            ..WireConfig::default()
        };
        assert!(matches!(
            decode_message(r#"{"type":"x","data":[[[1]]]}"#, &classes(), &shallow),
            Err(WireError::TooDeep { max: 2 })
        ));
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(
            decode_message("{not json", &classes(), &WireConfig::default()),
            Err(WireError::Json(_))
        ));
    }
}
