use super::*;

/// A Stratum request/response id. Stratum technically violates JSON-RPC by
/// sending `id: null` on notifications that carry an id field at all; `Null`
/// exists to round-trip that case rather than reject it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Clone)]
#[serde(untagged)]
pub enum Id {
    Null,
    Number(i64),
    String(String),
}

#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum Message {
    Request {
        id: Id,
        method: String,
        params: Value,
    },
    Response {
        id: Id,
        result: Option<Value>,
        error: Option<JsonRpcError>,
        /// Fields the pool sent beyond `id`/`result`/`error`. Preserved so a
        /// response whose body is passed back to the originating client
        /// verbatim doesn't lose anything nonstandard the pool attached.
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

impl Message {
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response { .. })
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification { .. })
    }

    /// Builds a response with no extra fields, the common case when the
    /// proxy constructs a reply itself rather than relaying one verbatim.
    pub fn response(id: Id, result: Option<Value>, error: Option<JsonRpcError>) -> Self {
        Message::Response {
            id,
            result,
            error,
            extra: Map::new(),
        }
    }
}

/// A frame is a request when `id` and `method` are both present, a
/// notification when `id` is absent, and a response when `id` is present and
/// `method` is absent.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let is_request = value.get("method").is_some() && value.get("id").is_some();

        let is_notification = value.get("method").is_some()
            && (value.get("id").is_none() || value.get("id") == Some(&Value::Null));

        let is_response = value.get("id").is_some()
            && value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some());

        if is_response {
            #[derive(Deserialize)]
            struct Resp {
                id: Id,
                result: Option<Value>,
                error: Option<JsonRpcError>,
                #[serde(flatten)]
                extra: Map<String, Value>,
            }

            let r: Resp = serde_json::from_value(value).map_err(de::Error::custom)?;

            Ok(Message::Response {
                id: r.id,
                result: r.result,
                error: r.error,
                extra: r.extra,
            })
        } else if is_notification {
            let method = value
                .get("method")
                .and_then(Value::as_str)
                .ok_or_else(|| de::Error::missing_field("method"))?
                .to_string();

            let params = value
                .get("params")
                .cloned()
                .unwrap_or(Value::Array(Vec::new()));

            Ok(Message::Notification { method, params })
        } else if is_request {
            #[derive(Deserialize)]
            struct Req {
                id: Id,
                method: String,
                params: Value,
            }

            let r: Req = serde_json::from_value(value).map_err(de::Error::custom)?;

            Ok(Message::Request {
                id: r.id,
                method: r.method,
                params: r.params,
            })
        } else {
            Err(de::Error::custom("unrecognized stratum message shape"))
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[track_caller]
    fn case(s: &str, expected: Message) {
        let actual = serde_json::from_str::<Message>(s).unwrap();
        assert_eq!(actual, expected, "deserialize Message from str");

        let serialized = serde_json::to_string(&actual).unwrap();
        let lhs: Value = serde_json::from_str(s).unwrap();
        let rhs: Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(lhs, rhs, "JSON semantic equality");

        let round_trip = serde_json::from_str::<Message>(&serialized).unwrap();
        assert_eq!(round_trip, expected, "roundtrip");
    }

    #[test]
    fn request() {
        case(
            r#"{"id":1,"method":"mining.subscribe","params":["cpuminer"]}"#,
            Message::Request {
                id: Id::Number(1),
                method: "mining.subscribe".into(),
                params: serde_json::json!(["cpuminer"]),
            },
        );
    }

    #[test]
    fn notification_without_id() {
        case(
            r#"{"method":"mining.notify","params":[]}"#,
            Message::Notification {
                method: "mining.notify".into(),
                params: serde_json::json!([]),
            },
        );
    }

    #[test]
    fn notification_with_null_id() {
        let with_id_null = r#"{"id":null,"method":"mining.set_difficulty","params":[2]}"#;

        assert_eq!(
            serde_json::from_str::<Message>(with_id_null).unwrap(),
            Message::Notification {
                method: "mining.set_difficulty".into(),
                params: serde_json::json!([2]),
            }
        );
    }

    #[test]
    fn response_array_result() {
        case(
            r#"{"id":1,"result":[[],"DEADBEEF",4],"error":null}"#,
            Message::response(
                Id::Number(1),
                Some(serde_json::json!([[], "DEADBEEF", 4])),
                None,
            ),
        );
    }

    #[test]
    fn response_rejected_share() {
        case(
            r#"{"id":42,"result":false,"error":[23,"low difficulty share",null]}"#,
            Message::response(
                Id::Number(42),
                Some(serde_json::json!(false)),
                Some(JsonRpcError {
                    code: 23,
                    message: "low difficulty share".into(),
                    data: Some(Value::Null),
                }),
            ),
        );
    }

    #[test]
    fn response_with_string_id() {
        case(
            r#"{"id":"abc","result":true,"error":null}"#,
            Message::response(Id::String("abc".into()), Some(serde_json::json!(true)), None),
        );
    }

    #[test]
    fn response_preserves_unknown_fields_on_roundtrip() {
        let mut extra = Map::new();
        extra.insert("reject-reason".into(), serde_json::json!("stale share"));

        case(
            r#"{"id":1,"result":false,"error":null,"reject-reason":"stale share"}"#,
            Message::Response {
                id: Id::Number(1),
                result: Some(serde_json::json!(false)),
                error: None,
                extra,
            },
        );
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let err = serde_json::from_str::<Message>(r#"{"foo":"bar"}"#).unwrap_err();
        assert!(err.to_string().contains("unrecognized"));
    }
}
