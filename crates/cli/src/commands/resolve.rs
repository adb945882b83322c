//! Connection string resolution

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use qatrain_common::{resolve, ConnectionDescriptor, HarnessConfig};

use crate::output::{or_dash, print_item, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ResolveArgs {
    /// Connection string to resolve instead of the configured one
    pub url: Option<String>,
}

/// Resolved descriptor with the password masked
#[derive(Debug, Serialize)]
pub struct DescriptorDisplay {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<&'static str>,
    pub tls: bool,
    pub local: bool,
}

impl From<&ConnectionDescriptor> for DescriptorDisplay {
    fn from(descriptor: &ConnectionDescriptor) -> Self {
        Self {
            host: descriptor.host.clone(),
            port: descriptor.port,
            database: descriptor.database.clone(),
            user: descriptor.user.clone(),
            password: descriptor.password.as_ref().map(|_| "***"),
            tls: descriptor.tls,
            local: qatrain_common::policy::is_local_host(&descriptor.host),
        }
    }
}

impl TableDisplay for DescriptorDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Host", "Port", "Database", "User", "Password", "TLS", "Local"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.host.clone(),
            self.port.to_string(),
            self.database.clone(),
            or_dash(self.user.as_ref()),
            or_dash(self.password),
            self.tls.to_string(),
            self.local.to_string(),
        ]
    }
}

pub fn execute(args: ResolveArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let raw = match args.url {
        Some(url) => url,
        None => config
            .database
            .url
            .clone()
            .context("no connection string given and DB_URL is not set")?,
    };
    let descriptor = resolve(&raw, &config.database.overrides())?;
    tracing::debug!(%descriptor, "resolved connection string");

    print_item(&DescriptorDisplay::from(&descriptor), format);
    Ok(())
}
