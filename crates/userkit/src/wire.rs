//! Translation between user records and the security API's JSON bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{ChangeSet, DeclaredUser, Field, RemoteUser, non_empty};

/// Body of a put-user request. The username travels in the path.
#[derive(Debug, Serialize)]
struct PutUserBody<'a> {
    roles: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    // "disabled" and "unspecified" look the same on the wire.
    #[serde(skip_serializing_if = "is_false")]
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password_hash: Option<&'a str>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One user entry in a get-user response.
///
/// Both supported generations nest this object under the username.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteUserBody {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub enabled: bool,
}

/// A get-user response: user entries keyed by username.
pub type GetUserResponse = HashMap<String, RemoteUserBody>;

/// Encode a declared user as a put-user body.
///
/// Credentials are included only when their field is in `changes`. Fails
/// with [`Error::Encoding`] when metadata is not a JSON object or when both
/// credentials would be sent.
pub fn encode(user: &DeclaredUser, changes: &ChangeSet) -> Result<Vec<u8>> {
    let password = if changes.contains(Field::Password) {
        user.password.as_deref()
    } else {
        None
    };
    let password_hash = if changes.contains(Field::PasswordHash) {
        user.password_hash.as_deref()
    } else {
        None
    };
    if password.is_some() && password_hash.is_some() {
        return Err(Error::encoding(format!(
            "user {:?} declares both password and password_hash",
            user.username
        )));
    }

    let body = PutUserBody {
        roles: user.roles.iter().map(String::as_str).collect(),
        full_name: non_empty(user.full_name.as_deref()),
        email: non_empty(user.email.as_deref()),
        enabled: user.enabled,
        metadata: parse_metadata(&user.metadata)?,
        password,
        password_hash,
    };

    log::debug!(
        "put body for {}: {} role(s), credential: {}",
        user.username,
        body.roles.len(),
        match (password, password_hash) {
            (Some(_), _) => "password",
            (_, Some(_)) => "password_hash",
            _ => "unchanged",
        }
    );

    Ok(serde_json::to_vec(&body)?)
}

/// Parse metadata text into a JSON object.
///
/// Empty text and `{}` both yield `None` (nothing to send).
pub fn parse_metadata(text: &str) -> Result<Option<Map<String, Value>>> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(Error::encoding(format!(
            "metadata must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Decode the entry for `username` from a get-user response.
pub fn decode(mut response: GetUserResponse, username: &str) -> Result<RemoteUser> {
    let body = response
        .remove(username)
        .ok_or_else(|| Error::encoding(format!("response has no entry for user {username:?}")))?;

    let metadata = serde_json::to_string(&Value::Object(body.metadata.unwrap_or_default()))?;

    Ok(RemoteUser {
        username: username.to_string(),
        roles: body.roles.into_iter().collect(),
        full_name: body.full_name.filter(|v| !v.is_empty()),
        email: body.email.filter(|v| !v.is_empty()),
        enabled: body.enabled,
        metadata,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(user: &DeclaredUser, changes: &ChangeSet) -> Value {
        serde_json::from_slice(&encode(user, changes).unwrap()).unwrap()
    }

    fn response(username: &str, entry: Value) -> GetUserResponse {
        let mut response = GetUserResponse::new();
        response.insert(username.to_string(), serde_json::from_value(entry).unwrap());
        response
    }

    #[test]
    fn test_encode_create_body() {
        let user = DeclaredUser::new("alice")
            .with_roles(["admin"])
            .with_password("secret1");

        let body = encode_json(&user, &ChangeSet::all());
        assert_eq!(
            body,
            json!({"roles": ["admin"], "enabled": true, "password": "secret1"})
        );
    }

    #[test]
    fn test_encode_omits_username_and_empty_fields() {
        let user = DeclaredUser::new("alice")
            .with_roles(["admin"])
            .with_full_name("")
            .with_metadata("");

        let body = encode_json(&user, &ChangeSet::new());
        let object = body.as_object().unwrap();
        assert!(!object.contains_key("username"));
        assert!(!object.contains_key("full_name"));
        assert!(!object.contains_key("email"));
        assert!(!object.contains_key("metadata"));
        assert_eq!(object["roles"], json!(["admin"]));
    }

    #[test]
    fn test_encode_disabled_user_omits_enabled() {
        let user = DeclaredUser::new("alice").with_enabled(false);
        let body = encode_json(&user, &ChangeSet::new());
        assert!(body.get("enabled").is_none());
    }

    #[test]
    fn test_encode_unchanged_credentials_omitted() {
        let user = DeclaredUser::new("alice")
            .with_roles(["admin"])
            .with_password("secret1");
        let changes: ChangeSet = [Field::Roles].into_iter().collect();

        let body = encode_json(&user, &changes);
        assert!(body.get("password").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[test]
    fn test_encode_changed_password_only() {
        let user = DeclaredUser::new("alice").with_password("secret2");
        let changes: ChangeSet = [Field::Password].into_iter().collect();

        let body = encode_json(&user, &changes);
        assert_eq!(body["password"], json!("secret2"));
        assert!(body.get("password_hash").is_none());
    }

    #[test]
    fn test_encode_changed_hash_only() {
        let user = DeclaredUser::new("alice").with_password_hash("$2a$10$abc");
        let changes: ChangeSet = [Field::PasswordHash, Field::Password].into_iter().collect();

        let body = encode_json(&user, &changes);
        assert_eq!(body["password_hash"], json!("$2a$10$abc"));
        assert!(body.get("password").is_none());
    }

    #[test]
    fn test_encode_rejects_both_credentials() {
        let user = DeclaredUser::new("alice")
            .with_password("secret1")
            .with_password_hash("$2a$10$abc");

        let err = encode(&user, &ChangeSet::all()).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_encode_invalid_metadata() {
        let user = DeclaredUser::new("alice").with_metadata("{not json");
        let err = encode(&user, &ChangeSet::new()).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_encode_non_object_metadata() {
        let user = DeclaredUser::new("alice").with_metadata("[1, 2]");
        let err = encode(&user, &ChangeSet::new()).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_decode_copies_fields() {
        let response = response(
            "alice",
            json!({
                "username": "alice",
                "roles": ["admin"],
                "full_name": null,
                "email": "alice@example.com",
                "metadata": {},
                "enabled": true
            }),
        );

        let user = decode(response, "alice").unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.roles.contains("admin"));
        assert_eq!(user.full_name, None);
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert!(user.enabled);
        assert_eq!(user.metadata, "{}");
    }

    #[test]
    fn test_decode_missing_entry() {
        let response = response("someone_else", json!({"roles": []}));
        let err = decode(response, "alice").unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_metadata_round_trip() {
        let samples = [
            json!({"team": "search"}),
            json!({"z": 1, "a": {"nested": [1, 2, {"k": null}]}, "m": true}),
            json!({"unicode": "żółw", "number": 1.5}),
        ];

        for metadata in samples {
            let decoded = decode(
                response("alice", json!({"roles": [], "enabled": true, "metadata": metadata})),
                "alice",
            )
            .unwrap();

            let declared = DeclaredUser::new("alice").with_metadata(decoded.metadata);
            let body = encode_json(&declared, &ChangeSet::new());
            assert_eq!(body["metadata"], metadata);
        }
    }

    #[test]
    fn test_decoded_metadata_is_canonical() {
        let decoded = decode(
            response("alice", json!({"roles": [], "metadata": {"b": 2, "a": 1}})),
            "alice",
        )
        .unwrap();
        assert_eq!(decoded.metadata, r#"{"a":1,"b":2}"#);
    }
}
