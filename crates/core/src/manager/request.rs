//! Per-flow temporary records and the interaction lock.

use super::CacheManager;
use crate::entities::AccountInfo;
use crate::keys;
use crate::request_state::{
    CachedTokenRequest, CcsCredential, CcsCredentialType, InteractionType, parse_request_state, temporary_keys,
};
use crate::storage::StorageBackend;
use crate::Error;

impl CacheManager {
    /// Key of the stored state blob for the request id embedded in `state`.
    pub fn generate_state_key(&self, state: &str) -> Result<String, Error> {
        self.flow_key(temporary_keys::REQUEST_STATE, state)
    }

    pub fn generate_nonce_key(&self, state: &str) -> Result<String, Error> {
        self.flow_key(temporary_keys::NONCE_ID_TOKEN, state)
    }

    pub fn generate_authority_key(&self, state: &str) -> Result<String, Error> {
        self.flow_key(temporary_keys::AUTHORITY, state)
    }

    fn flow_key(&self, name: &str, state: &str) -> Result<String, Error> {
        let request = parse_request_state(self.crypto.as_ref(), state)?;
        Ok(self.generate_cache_key(&format!("{name}.{}", request.library_state.id)))
    }

    /// Record the state, nonce and authority of a starting flow, plus a
    /// routing hint from `account` or, without one, `login_hint`.
    pub fn update_cache_entries(
        &self,
        state: &str,
        nonce: &str,
        authority: &str,
        login_hint: Option<&str>,
        account: Option<&AccountInfo>,
    ) -> Result<(), Error> {
        self.set_temporary_cache(&self.generate_state_key(state)?, state, false)?;
        self.set_temporary_cache(&self.generate_nonce_key(state)?, nonce, false)?;
        self.set_temporary_cache(&self.generate_authority_key(state)?, authority, false)?;

        let hint = match (account, login_hint) {
            (Some(account), _) => Some(CcsCredential {
                credential: account.home_account_id.clone(),
                credential_type: CcsCredentialType::HomeAccountId,
            }),
            (None, Some(login_hint)) if !login_hint.is_empty() => {
                Some(CcsCredential { credential: login_hint.to_string(), credential_type: CcsCredentialType::Upn })
            }
            _ => None,
        };
        if let Some(hint) = hint {
            self.set_temporary_cache(temporary_keys::CCS_CREDENTIAL, &serde_json::to_string(&hint)?, true)?;
        }
        Ok(())
    }

    /// Authority recorded for the flow whose state blob is stored under the
    /// state key of `cached_state`.
    pub fn get_cached_authority(&self, cached_state: &str) -> Option<String> {
        let state_key = self.generate_state_key(cached_state).ok()?;
        let state = self.get_temporary_cache(&state_key, false)?;
        let authority_key = self.generate_authority_key(&state).ok()?;
        self.get_temporary_cache(&authority_key, false)
    }

    /// Stash the token request until the authorization code comes back.
    pub fn cache_code_request(&self, request: &CachedTokenRequest) -> Result<(), Error> {
        let encoded = self.crypto.base64_encode(&serde_json::to_string(request)?);
        self.set_temporary_cache(temporary_keys::REQUEST_PARAMS, &encoded, true)
    }

    /// Take the stashed token request. The authority is filled in from the
    /// flow's authority record when the request did not carry one.
    pub fn get_cached_request(&self, state: &str) -> Result<CachedTokenRequest, Error> {
        let encoded = self
            .get_temporary_cache(temporary_keys::REQUEST_PARAMS, true)
            .ok_or(Error::NoTokenRequestCache)?;

        let mut request: CachedTokenRequest = self
            .crypto
            .base64_decode(&encoded)
            .ok_or_else(|| Error::UnableToParseTokenRequestCache("request is not base64".into()))
            .and_then(|json| {
                serde_json::from_str(&json).map_err(|e| Error::UnableToParseTokenRequestCache(e.to_string()))
            })?;

        self.remove_temporary_item(&self.generate_cache_key(temporary_keys::REQUEST_PARAMS));

        if request.authority.as_deref().is_none_or(str::is_empty) {
            let authority_key = self.generate_authority_key(state)?;
            let authority = self
                .get_temporary_cache(&authority_key, false)
                .ok_or(Error::NoCachedAuthority)?;
            request.authority = Some(authority);
        }
        Ok(request)
    }

    /// Remove every temporary record of the flow identified by `state`, the
    /// generic per-flow records, and this client's interaction lock.
    ///
    /// An unparsable `state` still clears the generic records and the lock.
    pub fn reset_request_cache(&self, state: &str) {
        if !state.is_empty() {
            match parse_request_state(self.crypto.as_ref(), state) {
                Ok(request) => {
                    let id = &request.library_state.id;
                    let mut flow_keys = self.backends.temporary.keys();
                    if self.config.store_auth_state_in_cookie {
                        flow_keys.extend(self.backends.cookies.keys());
                    }
                    for key in flow_keys.iter().filter(|key| key.contains(id.as_str())) {
                        self.remove_temporary_item(key);
                    }
                    for name in [
                        temporary_keys::REQUEST_STATE,
                        temporary_keys::NONCE_ID_TOKEN,
                        temporary_keys::AUTHORITY,
                    ] {
                        self.remove_temporary_item(&self.generate_cache_key(&format!("{name}.{id}")));
                    }
                }
                Err(err) => tracing::warn!(error = %err, "cannot derive flow keys from state"),
            }
        }

        for name in temporary_keys::GENERIC_FLOW_KEYS {
            self.remove_temporary_item(&self.generate_cache_key(name));
        }
        self.release_interaction_lock();
    }

    /// Reset the flow whose state blob is stored under the state key of
    /// `state`. An empty `state` does nothing.
    pub fn clean_request_by_state(&self, state: &str) {
        if state.is_empty() {
            return;
        }
        let cached = self
            .generate_state_key(state)
            .ok()
            .and_then(|key| self.get_temporary_cache(&key, false))
            .unwrap_or_default();
        self.reset_request_cache(&cached);
    }

    /// Reset every flow of this client started with `interaction_type`.
    pub fn clean_request_by_interaction_type(&self, interaction_type: InteractionType) {
        let namespace = self.generate_cache_key(temporary_keys::REQUEST_STATE);
        let mut cleaned = 0;
        for key in self.backends.temporary.keys() {
            if !key.starts_with(&namespace) {
                continue;
            }
            let Some(state) = self.backends.temporary.get_item(&key) else {
                continue;
            };
            let matches = parse_request_state(self.crypto.as_ref(), &state)
                .is_ok_and(|request| request.interaction_type() == Some(interaction_type));
            if matches {
                self.reset_request_cache(&state);
                cleaned += 1;
            }
        }
        tracing::debug!(?interaction_type, cleaned, "cleaned abandoned flows");
        self.release_interaction_lock();
    }

    /// Take or release the interaction lock.
    ///
    /// Taking fails with [`Error::InteractionInProgress`] while any client
    /// holds it. Releasing only clears a lock held by this client.
    pub fn set_interaction_in_progress(&self, in_progress: bool) -> Result<(), Error> {
        if in_progress {
            if let Some(owner) = self.interaction_owner() {
                return Err(Error::InteractionInProgress(owner));
            }
            self.set_temporary_cache(keys::INTERACTION_STATUS, &self.client_id, false)
        } else {
            self.release_interaction_lock();
            Ok(())
        }
    }

    /// With `match_client_id`, whether this client holds the lock; otherwise
    /// whether anyone does.
    pub fn is_interaction_in_progress(&self, match_client_id: bool) -> bool {
        match self.interaction_owner() {
            Some(owner) if match_client_id => owner == self.client_id,
            Some(_) => true,
            None => false,
        }
    }

    fn interaction_owner(&self) -> Option<String> {
        self.get_temporary_cache(keys::INTERACTION_STATUS, false)
    }

    fn release_interaction_lock(&self) {
        if self.interaction_owner().as_deref() == Some(self.client_id.as_str()) {
            self.remove_temporary_item(keys::INTERACTION_STATUS);
        }
    }
}
