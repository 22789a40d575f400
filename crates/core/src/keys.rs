//! Storage key generation.
//!
//! Two key shapes live side by side in a backend:
//!
//! - Namespaced keys, `tokenstash.<client-id>.<name>`, for per-client
//!   bookkeeping and temporary flow state.
//! - Composite entity keys, `tokenstash|<kind>|<component>|...`, derived
//!   from the identity fields of an entity. Components are escaped so a `|` inside a
//!   field can never shift a boundary, and identity components are
//!   lowercased so the same logical entity always maps to the same key.

/// Prefix shared by every key this crate writes.
pub const CACHE_PREFIX: &str = "tokenstash";

/// Slot holding the account key index (shared by all client ids).
pub const ACCOUNT_KEYS: &str = "tokenstash.account.keys";

/// Name of the per-client token key index slot.
pub const TOKEN_KEYS: &str = "token.keys";

pub const ACTIVE_ACCOUNT_FILTERS: &str = "active-account-filters";

/// Legacy active-account pointer holding only a local account id.
pub const ACTIVE_ACCOUNT: &str = "active-account";

/// Interaction lock slot. Not namespaced by client id.
pub const INTERACTION_STATUS: &str = "tokenstash.interaction.status";

const SEPARATOR: char = '|';

const ACCOUNT: &str = "account";
const CREDENTIAL: &str = "credential";
const APP_METADATA: &str = "appmetadata";
const THROTTLING: &str = "throttling";
const SERVER_TELEMETRY: &str = "server-telemetry";
const AUTHORITY_METADATA: &str = "authority-metadata";

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace(SEPARATOR, "%7C")
}

/// Join already-normalized components into a composite key.
pub fn composite_key<I, S>(components: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = String::from(CACHE_PREFIX);
    for component in components {
        key.push(SEPARATOR);
        key.push_str(&escape(component.as_ref()));
    }
    key
}

/// Normalize a space-separated scope set: lowercase, de-duplicated, sorted.
pub fn normalize_target(target: &str) -> String {
    let mut scopes: Vec<String> = target.split_whitespace().map(str::to_lowercase).collect();
    scopes.sort();
    scopes.dedup();
    scopes.join(" ")
}

/// Key for an account entity.
pub fn account_key(home_account_id: &str, environment: &str, realm: &str) -> String {
    composite_key([
        ACCOUNT,
        home_account_id.to_lowercase().as_str(),
        environment.to_lowercase().as_str(),
        realm.to_lowercase().as_str(),
    ])
}

/// Prefix shared by the keys of every credential belonging to an account.
pub fn account_id_prefix(home_account_id: &str, environment: &str) -> String {
    let mut prefix =
        composite_key([CREDENTIAL, home_account_id.to_lowercase().as_str(), environment.to_lowercase().as_str()]);
    prefix.push(SEPARATOR);
    prefix
}

/// Components of a credential key, in key order.
#[derive(Debug, Clone, Copy)]
pub struct CredentialKeyParts<'a> {
    pub home_account_id: &'a str,
    pub environment: &'a str,
    pub credential_type: &'a str,
    pub client_or_family_id: &'a str,
    pub realm: &'a str,
    pub target: &'a str,
    pub requested_claims_hash: &'a str,
    /// Empty for bearer tokens.
    pub scheme: &'a str,
}

/// Key for a credential entity.
pub fn credential_key(parts: CredentialKeyParts<'_>) -> String {
    composite_key([
        CREDENTIAL.to_string(),
        parts.home_account_id.to_lowercase(),
        parts.environment.to_lowercase(),
        parts.credential_type.to_lowercase(),
        parts.client_or_family_id.to_lowercase(),
        parts.realm.to_lowercase(),
        normalize_target(parts.target),
        parts.requested_claims_hash.to_string(),
        parts.scheme.to_lowercase(),
    ])
}

pub fn app_metadata_key(environment: &str, client_id: &str) -> String {
    composite_key([APP_METADATA, environment.to_lowercase().as_str(), client_id.to_lowercase().as_str()])
}

pub fn is_app_metadata_key(key: &str) -> bool {
    key.starts_with(&composite_key([APP_METADATA, ""]))
}

/// Key for a throttling record, from a caller-supplied request fingerprint.
pub fn throttling_key(fingerprint: &str) -> String {
    composite_key([THROTTLING, fingerprint])
}

pub fn is_throttling_key(key: &str) -> bool {
    key.starts_with(&composite_key([THROTTLING, ""]))
}

pub fn server_telemetry_key(client_id: &str) -> String {
    composite_key([SERVER_TELEMETRY, client_id.to_lowercase().as_str()])
}

pub fn is_server_telemetry_key(key: &str) -> bool {
    key.starts_with(&composite_key([SERVER_TELEMETRY, ""]))
}

pub fn authority_metadata_key(client_id: &str, authority: &str) -> String {
    composite_key([AUTHORITY_METADATA, client_id.to_lowercase().as_str(), authority.to_lowercase().as_str()])
}

pub fn authority_metadata_prefix(client_id: &str) -> String {
    composite_key([AUTHORITY_METADATA, client_id.to_lowercase().as_str(), ""])
}
