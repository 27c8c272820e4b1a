//! Shared test helpers for CLI integration tests.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const CONFIG_KEYS: &[&str] = &[
  "BC_BUILT_ARTIFACT",
  "BC_BUILT_MODULE",
  "BC_BUILD_ARGUMENTS",
  "BC_INCLUDE_FILES",
  "BC_EXCLUDE_FILES",
];

/// Isolated test environment.
///
/// Each test gets its own workspace and layers directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    fs::create_dir_all(env.workspace()).unwrap();
    env
  }

  pub fn workspace(&self) -> PathBuf {
    let p = self.temp.path().join("workspace");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn layers(&self) -> PathBuf {
    self.temp.path().join("layers")
  }

  /// Write a file relative to the workspace with a fixed modification time.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.workspace().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    File::options()
      .write(true)
      .open(&path)
      .unwrap()
      .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000))
      .unwrap();
  }

  /// Write a JAR relative to the workspace.
  pub fn write_jar(&self, relative_path: &str, main_class: Option<&str>) {
    write_jar(&self.workspace().join(relative_path), main_class);
  }

  /// Remove everything from the workspace.
  pub fn clear_workspace(&self) {
    fs::remove_dir_all(self.workspace()).unwrap();
    fs::create_dir_all(self.workspace()).unwrap();
  }

  /// Get a Command for the bcache binary with no configuration inherited.
  pub fn bcache_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("bcache");
    for key in CONFIG_KEYS {
      cmd.env_remove(key);
    }
    cmd.env("RUST_LOG", "info");
    cmd
  }

  /// A `build` invocation that runs `script` with `/bin/sh` and skips real
  /// version probing and SBOM scanning.
  pub fn build_cmd(&self, script: &str) -> Command {
    let mut cmd = self.bcache_cmd();
    cmd
      .arg("build")
      .arg("--workspace")
      .arg(self.workspace())
      .arg("--layers")
      .arg(self.layers())
      .args(["--command", "/bin/sh"])
      .args(["--probe", "echo javac 17.0.2"])
      .args(["--syft", "true"])
      .env("BC_BUILD_ARGUMENTS", format!("-c '{}'", script));
    cmd
  }
}

pub fn write_jar(path: &Path, main_class: Option<&str>) {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
  let options = SimpleFileOptions::default();
  writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
  writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
  if let Some(main_class) = main_class {
    writer
      .write_all(format!("Main-Class: {}\n", main_class).as_bytes())
      .unwrap();
  }
  writer.finish().unwrap();
}
