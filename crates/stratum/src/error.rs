use super::*;

/// The `[code, message, data]` error tuple Stratum V1 embeds in a response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl Serialize for JsonRpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (&self.code, &self.message, &self.data).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRpcError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (code, message, data) = <(i32, String, Option<Value>)>::deserialize(deserializer)?;
        Ok(JsonRpcError {
            code,
            message,
            data,
        })
    }
}

impl Display for JsonRpcError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "stratum error {}: {}", self.code, self.message)
    }
}

/// Errors the router itself can surface to a downstream miner. §7 fixes the
/// code and message for both; `data` is always `null` on the wire.
#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum StratumError {
    #[snafu(display("Upstream down"))]
    UpstreamNotReady,
    #[snafu(display("Forward error"))]
    ForwardFailure,
}

impl StratumError {
    pub fn code(self) -> i32 {
        -1
    }

    pub fn into_response(self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_not_ready_wire_shape() {
        let err = StratumError::UpstreamNotReady.into_response();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, serde_json::json!([-1, "Upstream down", null]));
    }

    #[test]
    fn forward_failure_wire_shape() {
        let err = StratumError::ForwardFailure.into_response();
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value, serde_json::json!([-1, "Forward error", null]));
    }

    #[test]
    fn json_rpc_error_roundtrip() {
        let json = r#"[21,"Job not found",null]"#;
        let parsed: JsonRpcError = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.code, 21);
        assert_eq!(parsed.message, "Job not found");
        let back = serde_json::to_string(&parsed).unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&back).unwrap(),
            serde_json::from_str::<Value>(json).unwrap()
        );
    }
}
