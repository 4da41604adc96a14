use crate::error::{Result, ServerError};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Flag telling the server binary not to open its graphical console
pub const NO_GUI_FLAG: &str = "nogui";

const MIN_HEAP_PREFIX: &str = "-Xms";
const MAX_HEAP_PREFIX: &str = "-Xmx";

/// Launch parameters for the managed server
///
/// Built once and never mutated afterwards. Heap flags supplied through
/// `java_args` are dropped in favour of the `min_memory_mb`/`max_memory_mb`
/// settings when the command line is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into, strip_option))]
pub struct ServerConfig {
    /// Directory the server runs in and the artifact is installed into
    pub working_directory: PathBuf,

    /// Where backup bundles are written (defaults to the working directory)
    #[serde(default)]
    #[builder(default)]
    pub backup_directory: Option<PathBuf>,

    /// Runtime used to launch the artifact
    #[serde(default = "default_java_binary")]
    #[builder(default = "default_java_binary()")]
    pub java_binary: String,

    /// File name of the server artifact inside the working directory
    #[serde(default = "default_jar_name")]
    #[builder(default = "default_jar_name()")]
    pub jar_name: String,

    /// Remote location the artifact is fetched from
    #[serde(default = "default_jar_url")]
    #[builder(default = "default_jar_url()")]
    pub jar_url: String,

    #[serde(default = "default_memory_mb")]
    #[builder(default = "default_memory_mb()")]
    pub min_memory_mb: u32,

    #[serde(default = "default_memory_mb")]
    #[builder(default = "default_memory_mb()")]
    pub max_memory_mb: u32,

    /// Extra flags for the runtime
    #[serde(default)]
    #[builder(default)]
    #[builder(setter(custom))]
    pub java_args: Vec<String>,

    /// Extra flags for the server binary itself
    #[serde(default)]
    #[builder(default)]
    #[builder(setter(custom))]
    pub jar_args: Vec<String>,

    /// Name of the world directory inside the working directory
    #[serde(default = "default_world_name")]
    #[builder(default = "default_world_name()")]
    pub world_name: String,

    /// Time given to the server to flush after a `save-all` (in milliseconds)
    #[serde(default = "default_checkpoint_delay_ms")]
    #[builder(default = "default_checkpoint_delay_ms()")]
    pub checkpoint_delay_ms: u64,

    /// Upper bound on waiting for the server to exit after `stop`
    /// (in milliseconds, unbounded when absent)
    #[serde(default)]
    #[builder(default)]
    pub exit_timeout_ms: Option<u64>,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ServerError::from_io_at(e, path))?;
        let config: ServerConfig = serde_json::from_str(&raw).map_err(|e| {
            ServerError::Configuration(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<()> {
        if self.min_memory_mb == 0 {
            return Err(ServerError::Configuration(
                "min_memory_mb must be greater than zero".to_string(),
            ));
        }

        if self.min_memory_mb > self.max_memory_mb {
            return Err(ServerError::Configuration(format!(
                "min_memory_mb ({}) cannot be greater than max_memory_mb ({})",
                self.min_memory_mb, self.max_memory_mb
            )));
        }

        if self.java_binary.is_empty() {
            return Err(ServerError::Configuration(
                "java_binary cannot be empty".to_string(),
            ));
        }

        validate_file_name(&self.jar_name)
            .map_err(|e| ServerError::Configuration(format!("jar_name: {e}")))?;
        validate_file_name(&self.world_name)
            .map_err(|e| ServerError::Configuration(format!("world_name: {e}")))?;

        Ok(())
    }

    /// Program and arguments used to launch the server
    pub fn command_line(&self) -> (String, Vec<String>) {
        let mut args: Vec<String> = self
            .java_args
            .iter()
            .filter(|arg| !is_heap_flag(arg))
            .cloned()
            .collect();

        args.push(format!("{MIN_HEAP_PREFIX}{}M", self.min_memory_mb));
        args.push(format!("{MAX_HEAP_PREFIX}{}M", self.max_memory_mb));
        args.push("-jar".to_string());
        args.push(self.jar_name.clone());
        args.push(NO_GUI_FLAG.to_string());
        args.extend(self.jar_args.iter().cloned());

        (self.java_binary.clone(), args)
    }

    pub fn jar_path(&self) -> PathBuf {
        self.working_directory.join(&self.jar_name)
    }

    pub fn world_path(&self) -> PathBuf {
        self.working_directory.join(&self.world_name)
    }

    pub fn backup_directory(&self) -> &Path {
        self.backup_directory
            .as_deref()
            .unwrap_or(&self.working_directory)
    }

    /// Full path of a backup bundle called `name`
    pub fn backup_path(&self, name: &str) -> Result<PathBuf> {
        validate_file_name(name).map_err(ServerError::InvalidName)?;
        if self.backup_directory() == self.working_directory.as_path()
            && (name == self.jar_name || name == self.world_name)
        {
            return Err(ServerError::InvalidName(format!(
                "'{name}' would overwrite server files in the working directory"
            )));
        }
        Ok(self.backup_directory().join(name))
    }

    pub fn checkpoint_delay(&self) -> Duration {
        Duration::from_millis(self.checkpoint_delay_ms)
    }

    pub fn exit_timeout(&self) -> Option<Duration> {
        self.exit_timeout_ms.map(Duration::from_millis)
    }
}

impl ServerConfigBuilder {
    pub fn java_args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        self.java_args = Some(iter.into_iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn jar_args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        self.jar_args = Some(iter.into_iter().map(|s| s.to_string()).collect());
        self
    }
}

fn is_heap_flag(arg: &str) -> bool {
    arg.starts_with(MIN_HEAP_PREFIX) || arg.starts_with(MAX_HEAP_PREFIX)
}

/// Names handed to us must stay inside their parent directory
fn validate_file_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(format!("'{name}' is not a usable file name"));
    }
    if name.contains(['/', '\\']) {
        return Err(format!("'{name}' must not contain path separators"));
    }
    Ok(())
}

// Default value functions for serde
fn default_java_binary() -> String {
    "java".to_string()
}
fn default_jar_name() -> String {
    "minecraft_server.jar".to_string()
}
fn default_jar_url() -> String {
    "https://s3.amazonaws.com/MinecraftDownload/launcher/minecraft_server.jar".to_string()
}
fn default_memory_mb() -> u32 {
    1024
}
fn default_world_name() -> String {
    "world".to_string()
}
fn default_checkpoint_delay_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> ServerConfigBuilder {
        let mut builder = ServerConfig::builder();
        builder.working_directory("/srv/minecraft");
        builder
    }

    #[test]
    fn test_defaults() {
        let config = base_builder().build().unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.java_binary, "java");
        assert_eq!(config.jar_name, "minecraft_server.jar");
        assert_eq!(config.min_memory_mb, 1024);
        assert_eq!(config.max_memory_mb, 1024);
        assert_eq!(config.checkpoint_delay(), Duration::from_secs(10));
        assert_eq!(config.exit_timeout(), None);
        assert_eq!(config.backup_directory(), Path::new("/srv/minecraft"));
        assert_eq!(config.world_path(), PathBuf::from("/srv/minecraft/world"));
    }

    #[test]
    fn test_conflicting_heap_flags_are_replaced() {
        let config = base_builder()
            .min_memory_mb(512u32)
            .max_memory_mb(1024u32)
            .java_args(["-Xmx2048M", "-XX:+UseG1GC"])
            .build()
            .unwrap();

        let (program, args) = config.command_line();
        assert_eq!(program, "java");
        assert_eq!(args.iter().filter(|a| *a == "-Xms512M").count(), 1);
        assert_eq!(args.iter().filter(|a| *a == "-Xmx1024M").count(), 1);
        assert!(!args.iter().any(|a| a == "-Xmx2048M"));
        assert_eq!(args.iter().filter(|a| a.starts_with("-Xm")).count(), 2);
    }

    #[test]
    fn test_command_line_order() {
        let config = base_builder()
            .min_memory_mb(256u32)
            .max_memory_mb(512u32)
            .java_args(["-Xms64M", "-server"])
            .jar_args(["--port", "25566"])
            .build()
            .unwrap();

        let (_, args) = config.command_line();
        assert_eq!(
            args,
            vec![
                "-server",
                "-Xms256M",
                "-Xmx512M",
                "-jar",
                "minecraft_server.jar",
                "nogui",
                "--port",
                "25566",
            ]
        );
    }

    #[test]
    fn test_invalid_config() {
        let config = base_builder()
            .min_memory_mb(2048u32)
            .max_memory_mb(1024u32)
            .build()
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ServerError::Configuration(_))
        ));

        let config = base_builder().world_name("../elsewhere").build().unwrap();
        assert!(config.validate().is_err());

        let config = base_builder().min_memory_mb(0u32).build().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backup_path_rejects_traversal() {
        let config = base_builder().backup_directory("/backups").build().unwrap();
        assert_eq!(
            config.backup_path("world.tar.gz").unwrap(),
            PathBuf::from("/backups/world.tar.gz")
        );
        assert!(matches!(
            config.backup_path("../world.tar.gz"),
            Err(ServerError::InvalidName(_))
        ));
        assert!(config.backup_path("").is_err());
    }

    #[test]
    fn test_backup_path_protects_server_files() {
        let config = base_builder().build().unwrap();
        for name in ["minecraft_server.jar", "world"] {
            assert!(matches!(
                config.backup_path(name),
                Err(ServerError::InvalidName(_))
            ));
        }
        assert_eq!(
            config.backup_path("world.tar.gz").unwrap(),
            PathBuf::from("/srv/minecraft/world.tar.gz")
        );

        let elsewhere = base_builder().backup_directory("/backups").build().unwrap();
        assert_eq!(
            elsewhere.backup_path("minecraft_server.jar").unwrap(),
            PathBuf::from("/backups/minecraft_server.jar")
        );
    }

    #[test]
    fn test_deserialization_applies_defaults() {
        let json = r#"{
            "workingDirectory": "/srv/minecraft",
            "maxMemoryMb": 2048,
            "javaArgs": ["-Xmx4G"],
            "exitTimeoutMs": 30000
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_memory_mb, 1024);
        assert_eq!(config.max_memory_mb, 2048);
        assert_eq!(config.world_name, "world");
        assert_eq!(config.exit_timeout(), Some(Duration::from_secs(30)));

        let (_, args) = config.command_line();
        assert!(args.contains(&"-Xmx2048M".to_string()));
        assert!(!args.contains(&"-Xmx4G".to_string()));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, r#"{"workingDirectory": "/srv/minecraft", "worldName": "survival"}"#)
            .unwrap();

        let config = ServerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.world_path(), PathBuf::from("/srv/minecraft/survival"));

        let missing = ServerConfig::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ServerError::NotFound(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ServerConfig::from_json_file(&path),
            Err(ServerError::Configuration(_))
        ));
    }
}
