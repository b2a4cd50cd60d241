use chainid_migrate::chainid_store::WriteTx;
use chainid_migrate::records::{self, Passthrough};
use chainid_migrate::{migration_step, MigrationError};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ENDPOINTS: &str = "endpoints";
const UNASSIGNED_GROUP_ID: u32 = 1;
const ENDPOINT_TYPE_DOCKER: u32 = 1;
const LOCAL_SOCKET_SCHEMES: [&str; 2] = ["unix://", "npipe://"];

#[derive(Default, Serialize, Deserialize)]
struct TlsConfig {
    #[serde(rename = "TLS", default)]
    tls: bool,
    #[serde(rename = "TLSSkipVerify", default)]
    skip_verify: bool,
    #[serde(rename = "TLSCACert", default, skip_serializing_if = "String::is_empty")]
    ca_cert: String,
    #[serde(rename = "TLSCert", default, skip_serializing_if = "String::is_empty")]
    cert: String,
    #[serde(rename = "TLSKey", default, skip_serializing_if = "String::is_empty")]
    key: String,
    #[serde(flatten)]
    rest: Passthrough,
}

/// Endpoint as stored before TLS settings moved into their own object.
#[derive(Serialize, Deserialize)]
struct EndpointV3 {
    #[serde(rename = "TLS", default, skip_serializing)]
    tls: bool,
    #[serde(rename = "TLSCACertPath", default, skip_serializing)]
    ca_cert_path: String,
    #[serde(rename = "TLSCertPath", default, skip_serializing)]
    cert_path: String,
    #[serde(rename = "TLSKeyPath", default, skip_serializing)]
    key_path: String,
    #[serde(rename = "TLSConfig", default)]
    tls_config: Option<TlsConfig>,
    #[serde(flatten)]
    rest: Passthrough,
}

/// Move the flat TLS fields of every endpoint into a `TLSConfig` object.
#[migration_step(from = 3, buckets = ["endpoints"])]
pub(super) fn endpoint_tls_config(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    let count = records::rewrite_all(tx, ENDPOINTS, |e: &mut EndpointV3| {
        if e.tls_config.is_none() {
            e.tls_config = Some(TlsConfig {
                tls: e.tls,
                ca_cert: std::mem::take(&mut e.ca_cert_path),
                cert: std::mem::take(&mut e.cert_path),
                key: std::mem::take(&mut e.key_path),
                ..TlsConfig::default()
            });
        }
        Ok(())
    })?;
    debug!("moved TLS settings of {count} endpoints into TLSConfig");
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct EndpointExtensions {
    #[serde(rename = "Extensions", default)]
    extensions: Vec<Value>,
    #[serde(flatten)]
    rest: Passthrough,
}

#[migration_step(from = 7, buckets = ["endpoints"])]
pub(super) fn endpoint_extensions(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    records::rewrite_all(tx, ENDPOINTS, |_: &mut EndpointExtensions| Ok(()))?;
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct EndpointGroup {
    #[serde(rename = "GroupId", default)]
    group_id: u32,
    #[serde(flatten)]
    rest: Passthrough,
}

/// Every endpoint joins the "unassigned" group.
#[migration_step(from = 8, buckets = ["endpoints"])]
pub(super) fn endpoint_groups(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    records::rewrite_all(tx, ENDPOINTS, |e: &mut EndpointGroup| {
        if e.group_id == 0 {
            e.group_id = UNASSIGNED_GROUP_ID;
        }
        Ok(())
    })?;
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct EndpointType {
    #[serde(rename = "Type", default)]
    kind: u32,
    #[serde(flatten)]
    rest: Passthrough,
}

/// Endpoints created before endpoint types existed are Docker endpoints.
#[migration_step(from = 9, buckets = ["endpoints"])]
pub(super) fn endpoint_types(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    records::rewrite_all(tx, ENDPOINTS, |e: &mut EndpointType| {
        if e.kind == 0 {
            e.kind = ENDPOINT_TYPE_DOCKER;
        }
        Ok(())
    })?;
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct EndpointV10 {
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "TLSConfig", default)]
    tls_config: TlsConfig,
    #[serde(flatten)]
    rest: Passthrough,
}

/// TLS never applies to a local socket; drop settings that were stored
/// for one.
#[migration_step(from = 10, buckets = ["endpoints"])]
pub(super) fn endpoint_local_tls(tx: &mut dyn WriteTx) -> Result<(), MigrationError> {
    let mut cleared = 0;
    records::rewrite_all(tx, ENDPOINTS, |e: &mut EndpointV10| {
        if LOCAL_SOCKET_SCHEMES.iter().any(|s| e.url.starts_with(s)) {
            let rest = std::mem::take(&mut e.tls_config.rest);
            e.tls_config = TlsConfig {
                rest,
                ..TlsConfig::default()
            };
            cleared += 1;
        }
        Ok(())
    })?;
    debug!("cleared TLS on {cleared} local socket endpoints");
    Ok(())
}
