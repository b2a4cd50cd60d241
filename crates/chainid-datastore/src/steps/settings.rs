use chainid_migrate::chainid_store::WriteTx;
use chainid_migrate::records::{self, Passthrough};
use chainid_migrate::{migration_step, MigrationError};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::records::DEFAULT_TEMPLATES_URL;

const SETTINGS: &str = "settings";
const SETTINGS_KEY: &[u8] = b"SETTINGS";
const AUTHENTICATION_INTERNAL: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SettingsV3 {
    #[serde(rename = "TemplatesURL", default)]
    templates_url: String,
    #[serde(rename = "AuthenticationMethod", default)]
    authentication_method: u32,
    #[serde(rename = "LDAPSettings", default)]
    ldap_settings: Option<Value>,
    #[serde(flatten)]
    rest: Passthrough,
}

fn default_ldap_settings() -> Value {
    json!({
        "ReaderDN": "",
        "Password": "",
        "URL": "",
        "TLSConfig": {"TLS": false, "TLSSkipVerify": false},
        "StartTLS": false,
        "SearchSettings": [{"BaseDN": "", "Filter": "", "UserNameAttribute": ""}]
    })
}

/// Fill in the templates URL and the authentication settings, creating the
/// settings record when the store has none yet.
#[migration_step(from = 2, buckets = ["settings"])]
pub(super) fn settings_defaults(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    let mut settings = match tx.get(SETTINGS, SETTINGS_KEY)? {
        Some(raw) => records::decode::<SettingsV3>(SETTINGS, SETTINGS_KEY, &raw)?,
        None => {
            debug!("no settings record, creating one");
            let mut rest = Passthrough::new();
            rest.insert("LogoURL".into(), json!(""));
            rest.insert("BlackListedLabels".into(), json!([]));
            rest.insert("DisplayExternalContributors".into(), json!(false));
            SettingsV3 {
                templates_url: String::new(),
                authentication_method: 0,
                ldap_settings: None,
                rest,
            }
        }
    };

    if settings.templates_url.is_empty() {
        settings.templates_url = DEFAULT_TEMPLATES_URL.to_string();
    }
    if settings.authentication_method == 0 {
        settings.authentication_method = AUTHENTICATION_INTERNAL;
    }
    if settings.ldap_settings.as_ref().map_or(true, Value::is_null) {
        settings.ldap_settings = Some(default_ldap_settings());
    }

    tx.put(
        SETTINGS,
        SETTINGS_KEY,
        &records::encode(SETTINGS, SETTINGS_KEY, &settings)?,
    )?;
    Ok(())
}

/// Set a boolean settings field to `true`. Stores without a settings
/// record are left alone.
fn enable(tx: &mut dyn WriteTx, field: &str) -> Result<(), MigrationError> {
    let Some(raw) = tx.get(SETTINGS, SETTINGS_KEY)? else {
        debug!("no settings record to update with {field}");
        return Ok(());
    };
    let mut settings: Passthrough = records::decode(SETTINGS, SETTINGS_KEY, &raw)?;
    settings.insert(field.to_string(), Value::Bool(true));
    tx.put(
        SETTINGS,
        SETTINGS_KEY,
        &records::encode(SETTINGS, SETTINGS_KEY, &settings)?,
    )?;
    Ok(())
}

#[migration_step(from = 4, buckets = ["settings"])]
pub(super) fn settings_bind_mounts(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    enable(tx, "AllowBindMountsForRegularUsers")
}

#[migration_step(from = 5, buckets = ["settings"])]
pub(super) fn settings_privileged_mode(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    enable(tx, "AllowPrivilegedModeForRegularUsers")
}

#[migration_step(from = 6, buckets = ["settings"])]
pub(super) fn settings_donation_header(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    enable(tx, "DisplayDonationHeader")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainid_migrate::chainid_store::{MemoryStore, Store};

    fn settings(store: &MemoryStore) -> Value {
        let raw = store
            .view(|tx| tx.get(SETTINGS, SETTINGS_KEY))
            .unwrap()
            .unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn missing_templates_url_gets_default() {
        let store = MemoryStore::new();
        store
            .update(|tx| {
                tx.put(
                    SETTINGS,
                    SETTINGS_KEY,
                    br#"{"LogoURL":"https://example.com/logo.png"}"#,
                )
            })
            .unwrap();

        store.update(settings_defaults).unwrap();

        let s = settings(&store);
        assert_eq!(s["TemplatesURL"], DEFAULT_TEMPLATES_URL);
        assert_eq!(s["AuthenticationMethod"], 1);
        assert_eq!(s["LDAPSettings"]["SearchSettings"].as_array().unwrap().len(), 1);
        assert_eq!(s["LogoURL"], "https://example.com/logo.png");
    }

    #[test]
    fn configured_values_are_kept() {
        let store = MemoryStore::new();
        store
            .update(|tx| {
                tx.put(
                    SETTINGS,
                    SETTINGS_KEY,
                    br#"{"TemplatesURL":"https://templates.internal/t.json","AuthenticationMethod":2,"LDAPSettings":{"URL":"ldap:389"}}"#,
                )
            })
            .unwrap();

        store.update(settings_defaults).unwrap();

        let s = settings(&store);
        assert_eq!(s["TemplatesURL"], "https://templates.internal/t.json");
        assert_eq!(s["AuthenticationMethod"], 2);
        assert_eq!(s["LDAPSettings"], json!({"URL": "ldap:389"}));
    }

    #[test]
    fn record_is_created_when_absent() {
        let store = MemoryStore::new();
        store.update(settings_defaults).unwrap();

        let s = settings(&store);
        assert_eq!(s["TemplatesURL"], DEFAULT_TEMPLATES_URL);
        assert_eq!(s["BlackListedLabels"], json!([]));
    }

    #[test]
    fn flags_are_switched_on() {
        let store = MemoryStore::new();
        store.update(settings_defaults).unwrap();
        store.update(settings_bind_mounts).unwrap();
        store.update(settings_privileged_mode).unwrap();
        store.update(settings_donation_header).unwrap();

        let s = settings(&store);
        assert_eq!(s["AllowBindMountsForRegularUsers"], true);
        assert_eq!(s["AllowPrivilegedModeForRegularUsers"], true);
        assert_eq!(s["DisplayDonationHeader"], true);
        assert_eq!(s["TemplatesURL"], DEFAULT_TEMPLATES_URL);
    }

    #[test]
    fn flag_step_without_settings_is_a_noop() {
        let store = MemoryStore::new();
        store.update(settings_bind_mounts).unwrap();
        assert!(store.snapshot(SETTINGS).unwrap().is_empty());
    }
}
