use anyhow::{Result, anyhow};
use clap::ArgMatches;
use lazy_static::lazy_static;
use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

pub static SERVICE_NAME: &str = "webhook-server";

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

pub struct Config {
    pub addr: SocketAddr,
    pub tls_config: Option<TlsConfig>,
    pub webhooks: BTreeSet<Webhook>,
    pub metrics_enabled: bool,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub client_ca_file: Vec<PathBuf>,
}

/// The webhooks this server knows how to serve
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Webhook {
    Pod,
    CronJob,
}

impl FromStr for Webhook {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pod" => Ok(Webhook::Pod),
            "cronjob" => Ok(Webhook::CronJob),
            _ => Err(anyhow!("unknown webhook: {s}")),
        }
    }
}

impl fmt::Display for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Webhook::Pod => write!(f, "pod"),
            Webhook::CronJob => write!(f, "cronjob"),
        }
    }
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let addr = api_bind_address(matches)?;
        let tls_config = tls_config(matches)?;
        let webhooks = webhooks(matches)?;

        let metrics_enabled = matches
            .get_one::<bool>("enable-metrics")
            .expect("clap should have set a default value")
            .to_owned();
        let log_level = matches
            .get_one::<String>("log-level")
            .expect("This should not happen, there's a default value for log-level")
            .to_owned();
        let log_fmt = matches
            .get_one::<String>("log-fmt")
            .expect("This should not happen, there's a default value for log-fmt")
            .to_owned();
        let log_no_color = matches
            .get_one::<bool>("log-no-color")
            .expect("clap should have assigned a default value")
            .to_owned();

        Ok(Self {
            addr,
            tls_config,
            webhooks,
            metrics_enabled,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn api_bind_address(matches: &ArgMatches) -> Result<SocketAddr> {
    let address = matches
        .get_one::<String>("address")
        .ok_or_else(|| anyhow!("missing bind address"))?;
    let port = matches
        .get_one::<String>("port")
        .ok_or_else(|| anyhow!("missing port"))?;

    format!("{address}:{port}")
        .parse()
        .map_err(|e| anyhow!("error parsing arguments: {}", e))
}

fn tls_config(matches: &ArgMatches) -> Result<Option<TlsConfig>> {
    let cert_file = matches
        .get_one::<String>("cert-file")
        .cloned()
        .unwrap_or_default();
    let key_file = matches
        .get_one::<String>("key-file")
        .cloned()
        .unwrap_or_default();
    let client_ca_file: Vec<PathBuf> = matches
        .get_many::<String>("client-ca-file")
        .unwrap_or_default()
        .map(PathBuf::from)
        .collect();

    if cert_file.is_empty() != key_file.is_empty() {
        return Err(anyhow!(
            "error parsing arguments: either both --cert-file and --key-file must be provided, or neither"
        ));
    }
    if cert_file.is_empty() {
        if !client_ca_file.is_empty() {
            return Err(anyhow!(
                "error parsing arguments: --client-ca-file requires --cert-file and --key-file"
            ));
        }
        return Ok(None);
    }

    Ok(Some(TlsConfig {
        cert_file: PathBuf::from(cert_file),
        key_file: PathBuf::from(key_file),
        client_ca_file,
    }))
}

fn webhooks(matches: &ArgMatches) -> Result<BTreeSet<Webhook>> {
    let webhooks = matches
        .get_many::<String>("webhooks")
        .unwrap_or_default()
        .map(|w| w.parse::<Webhook>())
        .collect::<Result<BTreeSet<Webhook>>>()?;

    if webhooks.is_empty() {
        return Err(anyhow!("error parsing arguments: no webhook enabled"));
    }

    Ok(webhooks)
}
