use serde::Deserialize;

/// Body of a backend `POST /emit` command.
///
/// Both fields are optional at the wire level so a malformed command can be
/// answered with 400 instead of a deserialization error; presence is enforced
/// by the dispatcher.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitRequest {
    /// The target client's id, as announced to it at connection time.
    #[serde(default)]
    pub ws_client_id: Option<String>,
    /// The opaque payload to forward verbatim; any JSON value.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}
