//! The `argocd` CLI config file (`~/.config/argocd/config`)
//!
//! mzcld shares this file with the upstream `argocd` binary, so entries it
//! does not model are carried through untouched.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::iap::normalize_host;

const LOGIN_HINT: &str = "Hint: Run 'mzcld argo login --host <hostname>' first";

type Extra = BTreeMap<String, serde_yaml::Value>;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ArgoConfig {
    #[serde(default)]
    pub current_context: String,
    #[serde(default)]
    pub contexts: Vec<ContextRef>,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<User>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ContextRef {
    pub name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub user: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Server {
    pub server: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub grpc_web: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `$HOME/.config/argocd/config`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::ConfigError("could not determine home directory".to_string()))?;
    Ok(home.join(".config").join("argocd").join("config"))
}

impl ArgoConfig {
    /// Parse the config file; JSON files are read too since JSON is valid YAML
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::io("read argocd config", path, e))?;
        Ok(serde_yaml::from_slice(&data)?)
    }

    /// Like [`ArgoConfig::load`] but an absent file is an empty config
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Ok(Self::default()),
            Ok(data) => Ok(serde_yaml::from_slice(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::io("read argocd config", path, e)),
        }
    }

    /// Name of the current context, which mzcld treats as the Argo CD host
    pub fn current_context_at(path: &Path) -> Result<String> {
        let config = Self::load(path).map_err(|e| match e {
            Error::Io { action, path, source } => {
                Error::ConfigError(format!("{action} {}: {source}\n{LOGIN_HINT}", path.display()))
            }
            other => other,
        })?;
        if config.current_context.is_empty() {
            return Err(Error::ConfigError(format!("no current context set\n{LOGIN_HINT}")));
        }
        Ok(config.current_context)
    }

    /// Argo CD session token stored for `host`, if any
    pub fn auth_token(&self, host: &str) -> Option<&str> {
        let host = normalize_host(host);
        let user = self
            .contexts
            .iter()
            .find(|c| c.name == host)
            .map(|c| c.user.as_str())
            .unwrap_or(host);
        self.users
            .iter()
            .find(|u| u.name == user)
            .map(|u| u.auth_token.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Record a fresh login for `host` and make it the current context
    pub fn upsert_session(&mut self, host: &str, auth_token: &str, refresh_token: Option<&str>) {
        let host = normalize_host(host).to_string();

        match self.servers.iter_mut().find(|s| s.server == host) {
            Some(server) => server.grpc_web = true,
            None => self.servers.push(Server {
                server: host.clone(),
                grpc_web: true,
                ..Default::default()
            }),
        }

        let idx = match self.users.iter().position(|u| u.name == host) {
            Some(idx) => idx,
            None => {
                self.users.push(User {
                    name: host.clone(),
                    ..Default::default()
                });
                self.users.len() - 1
            }
        };
        let user = &mut self.users[idx];
        user.auth_token = auth_token.to_string();
        if let Some(refresh) = refresh_token {
            user.refresh_token = refresh.to_string();
        }

        match self.contexts.iter_mut().find(|c| c.name == host) {
            Some(ctx) => {
                ctx.server = host.clone();
                ctx.user = host.clone();
            }
            None => self.contexts.push(ContextRef {
                name: host.clone(),
                server: host.clone(),
                user: host.clone(),
                ..Default::default()
            }),
        }

        self.current_context = host;
    }

    /// Write the config with owner-only permissions
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o700);
            }
            builder
                .create(dir)
                .map_err(|e| Error::io("create config directory", dir, e))?;
        }

        let data = serde_yaml::to_string(self)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        options
            .open(path)
            .and_then(|mut f| f.write_all(data.as_bytes()))
            .map_err(|e| Error::io("write argocd config", path, e))?;
        debug!("Saved argocd config to {}", path.display());
        Ok(())
    }
}
