//! Cloud/SNI metadata resolver (feature `cloud`), §6.6. Parses a small YAML
//! descriptor — the pre-extracted contents of a secure-connect bundle, not
//! the bundle itself — into resolved proxy addresses carrying an SNI server
//! name. Fetching/decoding a `.zip` bundle from disk is out of scope.

use std::sync::Arc;

use serde::Deserialize;

use crate::host::Address;
use crate::settings::ClusterMetadataResolverFactory;

#[derive(Debug, Deserialize)]
struct CloudConfigFile {
    data_centers: std::collections::HashMap<String, CloudDatacenter>,
    #[serde(default)]
    local_dc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudDatacenter {
    proxy_url: String,
    node_domain: String,
    #[serde(default)]
    ca_cert_pem_base64: Option<String>,
}

/// A single DC's resolved proxy endpoint plus the decoded root certificate,
/// if one was embedded in the descriptor.
#[derive(Debug, Clone)]
pub struct CloudDatacenterInfo {
    pub proxy_address: Address,
    pub node_domain: String,
    pub ca_cert_pem: Option<String>,
}

/// Parsed secure-connect descriptor: every datacenter's proxy, plus the
/// datacenter the descriptor names as local (§3.1's `local_datacenter` hook).
#[derive(Debug, Clone)]
pub struct CloudMetadataResolverFactory {
    datacenters: std::collections::HashMap<String, CloudDatacenterInfo>,
    local_dc: Option<String>,
}

/// Failure parsing or decoding a secure-connect YAML descriptor.
#[derive(thiserror::Error, Debug)]
pub enum CloudConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("datacenter {dc} has an invalid proxy_url: {source}")]
    InvalidProxyUrl { dc: String, source: url::ParseError },
    #[error("datacenter {dc} has a proxy_url with no host")]
    MissingProxyHost { dc: String },
    #[error("datacenter {dc} has a ca_cert_pem_base64 that is not valid base64: {source}")]
    InvalidCertBase64 { dc: String, source: base64::DecodeError },
    #[error("datacenter {dc} has a ca cert that is not valid UTF-8")]
    InvalidCertUtf8 { dc: String },
}

impl CloudMetadataResolverFactory {
    /// Parses the YAML body of a secure-connect bundle's `config.json`
    /// equivalent (here YAML).
    pub fn from_yaml(contents: &str) -> Result<Self, CloudConfigError> {
        let file: CloudConfigFile = serde_yaml::from_str(contents)?;
        let mut datacenters = std::collections::HashMap::with_capacity(file.data_centers.len());

        for (name, dc) in file.data_centers {
            let url = url::Url::parse(&dc.proxy_url).map_err(|source| CloudConfigError::InvalidProxyUrl {
                dc: name.clone(),
                source,
            })?;
            let host = url.host_str().ok_or_else(|| CloudConfigError::MissingProxyHost { dc: name.clone() })?;
            let port = url.port().unwrap_or(9142);

            let ca_cert_pem = dc
                .ca_cert_pem_base64
                .as_deref()
                .map(|encoded| -> Result<String, CloudConfigError> {
                    let bytes = base64::decode(encoded).map_err(|source| CloudConfigError::InvalidCertBase64 {
                        dc: name.clone(),
                        source,
                    })?;
                    String::from_utf8(bytes).map_err(|_| CloudConfigError::InvalidCertUtf8 { dc: name.clone() })
                })
                .transpose()?;

            let proxy_address = Address::new(host, port).with_sni(dc.node_domain.clone());
            datacenters.insert(
                name,
                CloudDatacenterInfo {
                    proxy_address,
                    node_domain: dc.node_domain,
                    ca_cert_pem,
                },
            );
        }

        Ok(Self {
            datacenters,
            local_dc: file.local_dc,
        })
    }

    pub fn into_arc(self) -> Arc<dyn ClusterMetadataResolverFactory> {
        Arc::new(self)
    }

    pub fn datacenters(&self) -> &std::collections::HashMap<String, CloudDatacenterInfo> {
        &self.datacenters
    }
}

impl ClusterMetadataResolverFactory for CloudMetadataResolverFactory {
    /// `contact_point` is a datacenter name in the descriptor, not a
    /// host:port — the SNI proxy is the same endpoint for every node in a
    /// DC, distinguished only by the `node_domain`-derived server name
    /// (§3.1's `Address.sni_server_name`).
    fn resolve(&self, contact_point: &str, _default_port: u16) -> Vec<Address> {
        match self.datacenters.get(contact_point) {
            Some(info) => vec![info.proxy_address.clone()],
            None => {
                tracing::warn!(dc = contact_point, "unknown datacenter in cloud descriptor");
                Vec::new()
            }
        }
    }

    fn local_datacenter(&self) -> Option<String> {
        self.local_dc.clone()
    }
}
