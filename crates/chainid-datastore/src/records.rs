//! Entity records in their current (latest version) shape.
//!
//! Field names match the JSON documents stored by the dashboard, which is
//! why they are renamed rather than following Rust naming.

use serde::{Deserialize, Serialize};

/// Identifier of a user, endpoint, group or resource control.
pub type Id = u32;

/// Key under which a record with `id` is stored.
pub fn id_key(id: Id) -> [u8; 8] {
    u64::from(id).to_be_bytes()
}

/// Inverse of [`id_key`]. `None` for keys that are not 8-byte IDs.
pub fn key_id(key: &[u8]) -> Option<Id> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Id::try_from(u64::from_be_bytes(bytes)).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum UserRole {
    Administrator,
    Standard,
}

impl From<u8> for UserRole {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Administrator,
            _ => Self::Standard,
        }
    }
}

impl From<UserRole> for u8 {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Administrator => 1,
            UserRole::Standard => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "Id")]
    pub id: Id,
    #[serde(rename = "Username")]
    pub username: String,
    /// Password hash.
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "Role")]
    pub role: UserRole,
}

/// Docker API endpoint kinds.
pub const ENDPOINT_TYPE_DOCKER: u32 = 1;
/// Group every endpoint belongs to until assigned elsewhere.
pub const UNASSIGNED_GROUP_ID: Id = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfiguration {
    #[serde(rename = "TLS", default)]
    pub tls: bool,
    #[serde(rename = "TLSSkipVerify", default)]
    pub skip_verify: bool,
    /// Path of the CA certificate.
    #[serde(rename = "TLSCACert", default, skip_serializing_if = "String::is_empty")]
    pub ca_cert: String,
    #[serde(rename = "TLSCert", default, skip_serializing_if = "String::is_empty")]
    pub cert: String,
    #[serde(rename = "TLSKey", default, skip_serializing_if = "String::is_empty")]
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointExtension {
    #[serde(rename = "Type")]
    pub kind: u32,
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "Id")]
    pub id: Id,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: u32,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "PublicURL", default)]
    pub public_url: String,
    #[serde(rename = "GroupId")]
    pub group_id: Id,
    #[serde(rename = "TLSConfig")]
    pub tls_config: TlsConfiguration,
    #[serde(rename = "AuthorizedUsers")]
    pub authorized_users: Vec<Id>,
    #[serde(rename = "AuthorizedTeams")]
    pub authorized_teams: Vec<Id>,
    #[serde(rename = "Extensions")]
    pub extensions: Vec<EndpointExtension>,
}

/// Kind of resource a control applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ResourceControlType {
    Container,
    Service,
    Volume,
    Network,
    Secret,
    Stack,
}

impl TryFrom<u8> for ResourceControlType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            1 => Self::Container,
            2 => Self::Service,
            3 => Self::Volume,
            4 => Self::Network,
            5 => Self::Secret,
            6 => Self::Stack,
            other => return Err(format!("unknown resource control type {other}")),
        })
    }
}

impl From<ResourceControlType> for u8 {
    fn from(t: ResourceControlType) -> Self {
        match t {
            ResourceControlType::Container => 1,
            ResourceControlType::Service => 2,
            ResourceControlType::Volume => 3,
            ResourceControlType::Network => 4,
            ResourceControlType::Secret => 5,
            ResourceControlType::Stack => 6,
        }
    }
}

/// Access level granted to a user or team.
pub const ACCESS_READ_WRITE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    #[serde(rename = "UserId")]
    pub user_id: Id,
    #[serde(rename = "AccessLevel")]
    pub access_level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAccess {
    #[serde(rename = "TeamId")]
    pub team_id: Id,
    #[serde(rename = "AccessLevel")]
    pub access_level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceControl {
    #[serde(rename = "Id")]
    pub id: Id,
    #[serde(rename = "ResourceId")]
    pub resource_id: String,
    #[serde(rename = "SubResourceIds", default)]
    pub sub_resource_ids: Vec<String>,
    #[serde(rename = "Type")]
    pub kind: ResourceControlType,
    #[serde(rename = "AdministratorsOnly", default)]
    pub administrators_only: bool,
    #[serde(rename = "UserAccesses", default)]
    pub user_accesses: Vec<UserAccess>,
    #[serde(rename = "TeamAccesses", default)]
    pub team_accesses: Vec<TeamAccess>,
}

pub const AUTHENTICATION_INTERNAL: u32 = 1;
pub const AUTHENTICATION_LDAP: u32 = 2;

/// Default location of the application templates list.
pub const DEFAULT_TEMPLATES_URL: &str =
    "https://raw.githubusercontent.com/chainid-io/templates/master/templates.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapSearchSettings {
    #[serde(rename = "BaseDN", default)]
    pub base_dn: String,
    #[serde(rename = "Filter", default)]
    pub filter: String,
    #[serde(rename = "UserNameAttribute", default)]
    pub username_attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapSettings {
    #[serde(rename = "ReaderDN", default)]
    pub reader_dn: String,
    #[serde(rename = "Password", default)]
    pub password: String,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "TLSConfig", default)]
    pub tls_config: TlsConfiguration,
    #[serde(rename = "StartTLS", default)]
    pub start_tls: bool,
    #[serde(rename = "SearchSettings", default)]
    pub search_settings: Vec<LdapSearchSettings>,
}

impl Default for LdapSettings {
    /// One empty search configuration, ready to be filled in.
    fn default() -> Self {
        Self {
            reader_dn: String::new(),
            password: String::new(),
            url: String::new(),
            tls_config: TlsConfiguration::default(),
            start_tls: false,
            search_settings: vec![LdapSearchSettings::default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "TemplatesURL")]
    pub templates_url: String,
    #[serde(rename = "LogoURL", default)]
    pub logo_url: String,
    #[serde(rename = "BlackListedLabels", default)]
    pub black_listed_labels: Vec<Label>,
    #[serde(rename = "DisplayDonationHeader", default)]
    pub display_donation_header: bool,
    #[serde(rename = "DisplayExternalContributors", default)]
    pub display_external_contributors: bool,
    #[serde(rename = "AuthenticationMethod")]
    pub authentication_method: u32,
    #[serde(rename = "LDAPSettings")]
    pub ldap_settings: LdapSettings,
    #[serde(rename = "AllowBindMountsForRegularUsers", default)]
    pub allow_bind_mounts_for_regular_users: bool,
    #[serde(rename = "AllowPrivilegedModeForRegularUsers", default)]
    pub allow_privileged_mode_for_regular_users: bool,
}

impl Default for Settings {
    /// Settings of a fresh installation.
    fn default() -> Self {
        Self {
            templates_url: DEFAULT_TEMPLATES_URL.to_string(),
            logo_url: String::new(),
            black_listed_labels: Vec::new(),
            display_donation_header: true,
            display_external_contributors: false,
            authentication_method: AUTHENTICATION_INTERNAL,
            ldap_settings: LdapSettings::default(),
            allow_bind_mounts_for_regular_users: true,
            allow_privileged_mode_for_regular_users: true,
        }
    }
}
