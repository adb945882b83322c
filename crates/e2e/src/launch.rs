//! Server launch command construction

use std::path::PathBuf;

use tokio::process::Command;

use qatrain_common::connection;
use qatrain_common::HarnessConfig;

use crate::error::E2eResult;

const PASSWORD_ARG: &str = "--spring.datasource.password=";

/// Program, arguments and environment for starting a server process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Arguments safe to log: the datasource password is masked
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                if arg.starts_with(PASSWORD_ARG) {
                    format!("{PASSWORD_ARG}***")
                } else {
                    arg.clone()
                }
            })
            .collect()
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Settings injected into the QA training app when the harness starts it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub java_home: Option<PathBuf>,
    pub jar_path: PathBuf,
    pub config_location: Option<PathBuf>,
    pub port: u16,
    pub base_url: String,
    pub datasource_url: Option<String>,
    pub datasource_username: Option<String>,
    pub datasource_password: Option<String>,
    pub extra_args: Vec<String>,
}

impl LaunchConfig {
    /// Derive launch settings from the harness configuration.
    ///
    /// Datasource credentials come from the resolved connection string when
    /// it resolves, so credentials given only as URL parameters still reach
    /// the server.
    pub fn from_config(config: &HarnessConfig) -> E2eResult<Self> {
        let (_, port) = config.server.endpoint()?;
        let db = &config.database;
        let (username, password) = match db.descriptor() {
            Ok(descriptor) => (descriptor.user, descriptor.password),
            Err(_) => (db.username.clone(), db.password.clone()),
        };

        Ok(Self {
            java_home: config.server.java_home.clone(),
            jar_path: config.server.jar_path.clone(),
            config_location: config.server.config_location.clone(),
            port,
            base_url: config.server.base_url.clone(),
            datasource_url: db.url.as_deref().map(jdbc_url),
            datasource_username: username,
            datasource_password: password,
            extra_args: Vec::new(),
        })
    }

    /// `$JAVA_HOME/bin/java`, or `java` from `PATH`
    pub fn java_binary(&self) -> PathBuf {
        let name = if cfg!(windows) { "java.exe" } else { "java" };
        match &self.java_home {
            Some(home) => home.join("bin").join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec!["-jar".to_string(), self.jar_path.display().to_string()];
        if let Some(location) = &self.config_location {
            args.push(format!("--spring.config.location={}", location.display()));
        }
        args.push(format!("--server.port={}", self.port));
        args.push(format!("--app.base-url={}", self.base_url));
        if let Some(url) = &self.datasource_url {
            args.push(format!("--spring.datasource.url={url}"));
        }
        if let Some(username) = &self.datasource_username {
            args.push(format!("--spring.datasource.username={username}"));
        }
        if let Some(password) = &self.datasource_password {
            args.push(format!("{PASSWORD_ARG}{password}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    pub fn to_spec(&self) -> LaunchSpec {
        let mut spec = LaunchSpec::new(self.java_binary()).args(self.arguments());
        if let Some(home) = &self.java_home {
            spec = spec.env("JAVA_HOME", home.display().to_string());
        }
        spec
    }
}

/// The server expects a JDBC URL; shorthand connection strings are expanded
fn jdbc_url(raw: &str) -> String {
    let raw = raw.trim();
    if connection::strip_jdbc_prefix(raw).len() < raw.len() {
        raw.to_string()
    } else {
        format!("jdbc:{}", connection::normalize(raw))
    }
}
