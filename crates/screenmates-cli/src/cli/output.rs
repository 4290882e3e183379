use screenmates_core::SyncError;
use serde::{Deserialize, Serialize};

/// Envelope printed for every command.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }

    pub fn from_sync_error(err: &SyncError) -> Self {
        Self::error(err.code(), &err.to_string())
    }
}

pub fn print_response(response: &Response, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(response)
    } else {
        serde_json::to_string(response)
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to render response: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_uses_stable_code() {
        let response = Response::from_sync_error(&SyncError::Quota);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["code"], "quota");
        assert!(json.get("result").is_none());
    }
}
