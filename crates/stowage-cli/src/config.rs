use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use stowage_cluster::{ClusterConfig, RestClientConfig};
use stowage_sql::ExecutionId;

/// Contents of the CLI configuration file.
///
/// ```toml
/// timeout_ms = 5000
///
/// [sql]
/// path = "blobs.db"
/// server_identity = "worker-3"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub timeout_ms: Option<u64>,
    pub sql: Option<SqlSection>,
    pub cluster: Option<ClusterSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlSection {
    pub path: PathBuf,
    /// Explicit execution id. Takes precedence over `server_identity`.
    pub execution_id: Option<u32>,
    /// Identity mixed with the process start time to derive an execution id.
    pub server_identity: Option<String>,
}

/// `[cluster]` merges the client and store settings into one table, so
/// `deny_unknown_fields` cannot apply; keys neither side claims land in
/// `unknown` and are rejected by [`FileConfig::resolve`].
#[derive(Debug, Default, Deserialize)]
pub struct ClusterSection {
    #[serde(flatten)]
    pub client: RestClientConfig,
    #[serde(flatten)]
    pub store: ClusterConfig,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

/// A fully resolved backend selection.
#[derive(Debug)]
pub enum Backend {
    Sql {
        path: PathBuf,
        execution_id: ExecutionId,
        timeout: Option<Duration>,
    },
    Cluster {
        client: RestClientConfig,
        store: ClusterConfig,
    },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sql { .. } => "sql",
            Self::Cluster { .. } => "cluster",
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Pick the configured backend. `timeout_ms` from the command line wins
    /// over the file.
    pub fn resolve(self, timeout_ms: Option<u64>) -> anyhow::Result<Backend> {
        let timeout = timeout_ms.or(self.timeout_ms).map(Duration::from_millis);
        match (self.sql, self.cluster) {
            (Some(_), Some(_)) => bail!("configure either [sql] or [cluster], not both"),
            (None, None) => bail!("no backend configured: add a [sql] or [cluster] section"),
            (Some(sql), None) => {
                let execution_id = match (sql.execution_id, sql.server_identity) {
                    (Some(raw), _) => ExecutionId::new(raw)?,
                    (None, Some(identity)) => ExecutionId::for_current_start(&identity),
                    (None, None) => {
                        bail!("[sql] needs either execution_id or server_identity")
                    }
                };
                Ok(Backend::Sql {
                    path: sql.path,
                    execution_id,
                    timeout,
                })
            }
            (None, Some(cluster)) => {
                if !cluster.unknown.is_empty() {
                    let keys: Vec<&str> = cluster.unknown.keys().map(String::as_str).collect();
                    bail!("unknown keys in [cluster]: {}", keys.join(", "));
                }
                let mut store = cluster.store;
                if let Some(timeout) = timeout {
                    store = store.with_timeout(timeout);
                }
                Ok(Backend::Cluster {
                    client: cluster.client,
                    store,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_section_with_explicit_id() {
        let config = FileConfig::parse(
            r#"
            timeout_ms = 2000
            [sql]
            path = "blobs.db"
            execution_id = 7
            "#,
        )
        .unwrap();

        let backend = config.resolve(None).unwrap();
        assert_eq!(backend.name(), "sql");
        match backend {
            Backend::Sql {
                path,
                execution_id,
                timeout,
            } => {
                assert_eq!(path, PathBuf::from("blobs.db"));
                assert_eq!(execution_id.get(), 7);
                assert_eq!(timeout, Some(Duration::from_secs(2)));
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn flag_overrides_file_timeout() {
        let config = FileConfig::parse(
            r#"
            timeout_ms = 2000
            [sql]
            path = "blobs.db"
            server_identity = "worker-3"
            "#,
        )
        .unwrap();
        match config.resolve(Some(0)).unwrap() {
            Backend::Sql { timeout, .. } => assert_eq!(timeout, Some(Duration::ZERO)),
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn cluster_section_fills_both_configs() {
        let config = FileConfig::parse(
            r#"
            [cluster]
            api_url = "http://10.0.0.5:9094"
            username = "admin"
            password = "hunter2"
            replication_factor_min = 2
            replication_factor_max = 3
            local = true
            default_timeout_ms = 1500
            "#,
        )
        .unwrap();

        let backend = config.resolve(None).unwrap();
        assert_eq!(backend.name(), "cluster");
        match backend {
            Backend::Cluster { client, store } => {
                assert_eq!(client.api_url, "http://10.0.0.5:9094");
                assert_eq!(client.proxy_url, RestClientConfig::default().proxy_url);
                assert_eq!(client.username.as_deref(), Some("admin"));
                assert_eq!(store.replication_factor_min, 2);
                assert_eq!(store.replication_factor_max, 3);
                assert!(store.local);
                assert_eq!(store.default_timeout, Duration::from_millis(1500));
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn cluster_section_rejects_misspelled_keys() {
        let config = FileConfig::parse(
            r#"
            [cluster]
            api_url = "http://10.0.0.5:9094"
            replication_factor_mn = 2
            "#,
        )
        .unwrap();
        let err = config.resolve(None).unwrap_err();
        assert!(err.to_string().contains("replication_factor_mn"), "{err}");
    }

    #[test]
    fn rejects_ambiguous_or_missing_backend() {
        let both = FileConfig::parse(
            r#"
            [sql]
            path = "a.db"
            execution_id = 1
            [cluster]
            "#,
        )
        .unwrap();
        assert!(both.resolve(None).is_err());
        assert!(FileConfig::default().resolve(None).is_err());

        let zero = FileConfig::parse("[sql]\npath = \"a.db\"\nexecution_id = 0\n").unwrap();
        assert!(zero.resolve(None).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
