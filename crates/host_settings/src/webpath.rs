use crate::errors::{SettingsError, SettingsResult};
use crate::tree::SettingsTree;

pub const WEBPATH_GROUP: &str = "webpath";
pub const ADMIN_KEY: &str = "admin";
pub const DELIVERY_KEY: &str = "delivery";
pub const DELIVERY_SSL_KEY: &str = "deliverySSL";

/// Host identifiers of the three endpoints at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebpathHosts {
    pub admin: String,
    pub delivery: String,
    pub delivery_ssl: String,
}

impl WebpathHosts {
    pub fn new(
        admin: impl Into<String>,
        delivery: impl Into<String>,
        delivery_ssl: impl Into<String>,
    ) -> Self {
        Self {
            admin: admin.into(),
            delivery: delivery.into(),
            delivery_ssl: delivery_ssl.into(),
        }
    }

    pub fn from_tree(tree: &SettingsTree) -> SettingsResult<Self> {
        let host = |key: &'static str| -> SettingsResult<String> {
            let raw = tree
                .get(WEBPATH_GROUP, key)
                .ok_or(SettingsError::MissingWebpath(key))?;
            let host = host_of(raw);
            if host.is_empty() {
                return Err(SettingsError::MissingWebpath(key));
            }
            Ok(host.to_string())
        };
        Ok(Self {
            admin: host(ADMIN_KEY)?,
            delivery: host(DELIVERY_KEY)?,
            delivery_ssl: host(DELIVERY_SSL_KEY)?,
        })
    }

    /// The delivery host owns the real config file.
    pub fn canonical(&self) -> &str {
        &self.delivery
    }

    /// Distinct hosts in admin, delivery, deliverySSL order.
    pub fn distinct(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::with_capacity(3);
        for host in [&self.admin, &self.delivery, &self.delivery_ssl] {
            if !hosts.contains(&host.as_str()) {
                hosts.push(host.as_str());
            }
        }
        hosts
    }

    pub fn contains(&self, host: &str) -> bool {
        self.admin == host || self.delivery == host || self.delivery_ssl == host
    }
}

/// Host part of a webpath value.
///
/// Accepts plain host names as well as `scheme://host:port/path`; the scheme,
/// port and path are dropped.
pub fn host_of(value: &str) -> &str {
    let value = value.trim();
    let rest = value.split_once("://").map_or(value, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();

    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}
