//! Request state blobs and the temporary records of one interactive flow.
//!
//! A state blob is `base64url(json(LibraryState))`, optionally followed by
//! `|<user state>`. The library state carries the request id every flow key
//! is derived from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;
use crate::crypto::CryptoProvider;

/// Separator between the library state and caller-supplied user state.
pub const STATE_DELIMITER: char = '|';

/// Logical names of temporary-scope records, namespaced per client id.
pub mod temporary_keys {
    pub const AUTHORITY: &str = "authority";
    pub const REQUEST_STATE: &str = "request.state";
    pub const NONCE_ID_TOKEN: &str = "nonce.id_token";
    pub const ORIGIN_URI: &str = "request.origin";
    pub const URL_HASH: &str = "urlHash";
    pub const REQUEST_PARAMS: &str = "request.params";
    pub const CORRELATION_ID: &str = "request.correlationId";
    pub const CCS_CREDENTIAL: &str = "ccs.credential";
    pub const NATIVE_REQUEST: &str = "request.native";

    /// Per-flow records with no request id in their key.
    pub const GENERIC_FLOW_KEYS: [&str; 6] =
        [REQUEST_PARAMS, ORIGIN_URI, URL_HASH, CORRELATION_ID, CCS_CREDENTIAL, NATIVE_REQUEST];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Redirect,
    Popup,
    Silent,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMeta {
    #[serde(rename = "interactionType")]
    pub interaction_type: InteractionType,
}

/// The library-owned half of a state blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryState {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<StateMeta>,
}

/// A decoded state blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestState {
    pub library_state: LibraryState,
    pub user_state: Option<String>,
}

impl RequestState {
    /// New state with a fresh request id.
    pub fn new(crypto: &dyn CryptoProvider, interaction_type: InteractionType, user_state: Option<String>) -> Self {
        Self {
            library_state: LibraryState {
                id: crypto.create_new_guid(),
                meta: Some(StateMeta { interaction_type }),
            },
            user_state: user_state.filter(|s| !s.is_empty()),
        }
    }

    pub fn interaction_type(&self) -> Option<InteractionType> {
        self.library_state.meta.as_ref().map(|meta| meta.interaction_type)
    }

    /// Encode as the opaque blob sent on the wire.
    pub fn encode(&self, crypto: &dyn CryptoProvider) -> Result<String, Error> {
        let mut state = crypto.base64_encode(&serde_json::to_string(&self.library_state)?);
        if let Some(user_state) = &self.user_state {
            state.push(STATE_DELIMITER);
            state.push_str(user_state);
        }
        Ok(state)
    }
}

/// Decode a state blob produced by [`RequestState::encode`].
pub fn parse_request_state(crypto: &dyn CryptoProvider, state: &str) -> Result<RequestState, Error> {
    if state.is_empty() {
        return Err(Error::InvalidState("state is empty".into()));
    }

    let (library, user_state) = match state.split_once(STATE_DELIMITER) {
        Some((library, user)) => (library, Some(user.to_string()).filter(|s| !s.is_empty())),
        None => (state, None),
    };

    let json = crypto
        .base64_decode(library)
        .ok_or_else(|| Error::InvalidState("library state is not base64".into()))?;
    let library_state: LibraryState =
        serde_json::from_str(&json).map_err(|e| Error::InvalidState(format!("library state: {e}")))?;

    Ok(RequestState { library_state, user_state })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CcsCredentialType {
    HomeAccountId,
    #[serde(rename = "UPN")]
    Upn,
}

/// Routing hint telling the token service which account a flow is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcsCredential {
    pub credential: String,
    #[serde(rename = "type")]
    pub credential_type: CcsCredentialType,
}

/// Token request stashed between the authorize redirect and code redemption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTokenRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<String>,
    /// Remaining request parameters, preserved as given.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
