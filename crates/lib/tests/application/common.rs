//! Shared helpers for orchestrator integration tests.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use buildcache_lib::application::{Application, ApplicationFactory, ApplicationOptions};
use buildcache_lib::cache::DependencyCache;
use buildcache_lib::config::{Configuration, ConfigurationResolver};
use buildcache_lib::exec::{ExecError, Execution, Executor};
use buildcache_lib::provenance::MemoryLedger;
use buildcache_lib::resolve::{ArtifactResolver, PatternResolver};
use buildcache_lib::sbom::{SbomError, SbomFormat, SbomScanner};
use buildcache_lib::source::SourceRetention;
use serde_json::Value;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const BUILD_COMMAND: &str = "mvn";
pub const ARTIFACT_KEY: &str = "BC_BUILT_ARTIFACT";
pub const MODULE_KEY: &str = "BC_BUILT_MODULE";

type BuildScript = Box<dyn Fn(&Path) -> Result<(), ExecError> + Send + Sync>;

/// Executor that answers version probes and runs a scripted build.
pub struct ScriptedExecutor {
  build: BuildScript,
  pub executions: Mutex<Vec<Execution>>,
}

impl ScriptedExecutor {
  pub fn new(build: impl Fn(&Path) -> Result<(), ExecError> + Send + Sync + 'static) -> Arc<Self> {
    Arc::new(Self {
      build: Box::new(build),
      executions: Mutex::new(Vec::new()),
    })
  }

  /// A build that exits non-zero without touching the workspace.
  pub fn failing() -> Arc<Self> {
    Self::new(|_| {
      Err(ExecError::Failed {
        command: BUILD_COMMAND.to_string(),
        code: Some(1),
      })
    })
  }

  /// Number of build command invocations.
  pub fn builds(&self) -> usize {
    self
      .executions
      .lock()
      .unwrap()
      .iter()
      .filter(|e| e.command == BUILD_COMMAND)
      .count()
  }
}

#[async_trait]
impl Executor for ScriptedExecutor {
  async fn execute(&self, execution: &Execution) -> Result<String, ExecError> {
    self.executions.lock().unwrap().push(execution.clone());
    if execution.command == BUILD_COMMAND {
      (self.build)(&execution.dir)?;
      return Ok(String::new());
    }
    Ok("javac 17.0.2\n".to_string())
  }
}

/// Scanner that records the workspace contents it was shown.
#[derive(Default)]
pub struct RecordingScanner {
  pub fail: bool,
  pub scans: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl RecordingScanner {
  pub fn failing() -> Arc<Self> {
    Arc::new(Self {
      fail: true,
      ..Default::default()
    })
  }

  pub fn count(&self) -> usize {
    self.scans.lock().unwrap().len()
  }
}

#[async_trait]
impl SbomScanner for RecordingScanner {
  async fn scan_build(&self, root: &Path, formats: &[SbomFormat]) -> Result<(), SbomError> {
    assert_eq!(formats, &[SbomFormat::CycloneDxJson, SbomFormat::SyftJson]);
    self.scans.lock().unwrap().push((root.to_path_buf(), top_level(root)));
    if self.fail {
      return Err(SbomError::Scan {
        path: root.to_path_buf(),
        source: ExecError::Failed {
          command: "syft".to_string(),
          code: Some(1),
        },
      });
    }
    Ok(())
  }
}

/// Sorted names of the direct children of `dir`.
pub fn top_level(dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = fs::read_dir(dir)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
    .collect();
  names.sort();
  names
}

/// Write a file with a fixed modification time.
pub fn write_fixed(path: &Path, content: &str) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
  File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000))
    .unwrap();
}

/// Write a JAR whose manifest optionally names a `Main-Class`.
pub fn write_jar(path: &Path, main_class: Option<&str>) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
  let options = SimpleFileOptions::default();
  writer.add_directory("META-INF/", options).unwrap();
  writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
  writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
  if let Some(main_class) = main_class {
    writer
      .write_all(format!("Main-Class: {}\n", main_class).as_bytes())
      .unwrap();
  }
  writer.start_file("demo/App.class", options).unwrap();
  writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
  writer.finish().unwrap();
}

/// Isolated workspace, layers directory and dependency cache.
pub struct Fixture {
  pub temp: TempDir,
  pub workspace: PathBuf,
  pub layers: PathBuf,
  pub ledger: Arc<MemoryLedger>,
}

impl Fixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let workspace = root.join("workspace");
    let layers = root.join("layers");
    fs::create_dir_all(&workspace).unwrap();
    fs::create_dir_all(&layers).unwrap();

    let fixture = Self {
      temp,
      workspace,
      layers,
      ledger: Arc::new(MemoryLedger::new()),
    };
    fixture.write_sources();
    fixture
  }

  /// A small Maven-shaped source tree with stable timestamps.
  pub fn write_sources(&self) {
    write_fixed(&self.workspace.join("pom.xml"), "<project/>");
    write_fixed(
      &self.workspace.join("src/main/java/demo/App.java"),
      "package demo; class App {}",
    );
  }

  /// Replace whatever the last run restored with the original sources.
  pub fn reset_workspace(&self) {
    fs::remove_dir_all(&self.workspace).unwrap();
    fs::create_dir_all(&self.workspace).unwrap();
    self.write_sources();
  }

  pub fn dependency_cache(&self) -> PathBuf {
    self.temp.path().join("m2")
  }

  pub fn options(&self, pattern: &str) -> ApplicationOptions {
    let configuration = ConfigurationResolver::new(vec![
      Configuration::new(ARTIFACT_KEY, pattern, "the built application artifact"),
      Configuration::new(MODULE_KEY, "", "the module to find application artifact in"),
    ]);

    ApplicationOptions {
      workspace: self.workspace.clone(),
      layers_dir: self.layers.clone(),
      command: BUILD_COMMAND.to_string(),
      arguments: vec!["package".to_string()],
      resolver: ArtifactResolver::new(PatternResolver::new(ARTIFACT_KEY, MODULE_KEY, configuration)),
      cache: DependencyCache::new(self.dependency_cache()),
      retention: SourceRetention::default(),
      additional_metadata: BTreeMap::<String, Value>::new(),
    }
  }

  pub async fn application(
    &self,
    options: ApplicationOptions,
    executor: Arc<ScriptedExecutor>,
    scanner: Arc<RecordingScanner>,
  ) -> Application {
    ApplicationFactory::new(executor)
      .new_application(options, scanner, self.ledger.clone())
      .await
      .unwrap()
  }
}
