//! Failure ordering: nothing is purged unless capture succeeded.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use buildcache_lib::application::ErrorKind;

use super::common::{Fixture, RecordingScanner, ScriptedExecutor, top_level, write_jar};

const SOURCES: [&str; 2] = ["pom.xml", "src"];

#[tokio::test]
async fn failed_build_leaves_workspace_untouched() {
  let fixture = Fixture::new();
  let scanner = Arc::new(RecordingScanner::default());

  let err = fixture
    .application(fixture.options("target/*.jar"), ScriptedExecutor::failing(), scanner.clone())
    .await
    .contribute()
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::BuildExecutionFailed);
  assert_eq!(top_level(&fixture.workspace), SOURCES);
  assert_eq!(scanner.count(), 0);
  assert!(fixture.ledger.entries().is_empty());
  assert!(!fixture.layers.join("application.json").exists());
}

#[tokio::test]
async fn empty_resolution_aborts_before_purge() {
  let fixture = Fixture::new();

  let err = fixture
    .application(
      fixture.options("target/*.jar"),
      ScriptedExecutor::new(|_| Ok(())),
      Arc::new(RecordingScanner::default()),
    )
    .await
    .contribute()
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::ResolutionEmpty);
  assert!(err.to_string().contains("directory contains: [pom.xml src]"));
  assert_eq!(top_level(&fixture.workspace), SOURCES);
}

#[tokio::test]
async fn malformed_pattern_aborts_before_purge() {
  let fixture = Fixture::new();
  let executor = ScriptedExecutor::new(|dir: &Path| {
    write_jar(&dir.join("target/demo.jar"), None);
    Ok(())
  });

  let err = fixture
    .application(
      fixture.options("target/*.jar target/["),
      executor.clone(),
      Arc::new(RecordingScanner::default()),
    )
    .await
    .contribute()
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::PatternMalformed);
  assert_eq!(executor.builds(), 1);
  assert_eq!(top_level(&fixture.workspace), vec!["pom.xml", "src", "target"]);
}

#[tokio::test]
async fn clashing_artifact_names_abort_capture() {
  let fixture = Fixture::new();
  let executor = ScriptedExecutor::new(|dir: &Path| {
    for module in ["api", "web"] {
      fs::create_dir_all(dir.join(module).join("target")).unwrap();
      fs::write(dir.join(module).join("target/app.jar"), module).unwrap();
    }
    Ok(())
  });

  let err = fixture
    .application(
      fixture.options("api/target/app.jar web/target/app.jar"),
      executor,
      Arc::new(RecordingScanner::default()),
    )
    .await
    .contribute()
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::CaptureIOFailed);
  assert!(fixture.workspace.join("pom.xml").exists());
  assert!(!fixture.layers.join("application.json").exists());
}

#[tokio::test]
async fn failed_scan_aborts_before_purge() {
  let fixture = Fixture::new();
  let executor = ScriptedExecutor::new(|dir: &Path| {
    write_jar(&dir.join("target/demo.jar"), Some("demo.App"));
    Ok(())
  });

  let err = fixture
    .application(fixture.options("target/*.jar"), executor, RecordingScanner::failing())
    .await
    .contribute()
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::ScanOrLedgerFailed);
  assert_eq!(top_level(&fixture.workspace), vec!["pom.xml", "src", "target"]);
  assert!(fixture.ledger.entries().is_empty());
}

#[tokio::test]
async fn failed_restore_after_purge_is_terminal() {
  let fixture = Fixture::new();
  let executor = ScriptedExecutor::new(|dir: &Path| {
    fs::create_dir_all(dir.join("target")).unwrap();
    fs::write(dir.join("target/demo.war"), "not an archive").unwrap();
    Ok(())
  });

  let err = fixture
    .application(
      fixture.options("target/*.war"),
      executor,
      Arc::new(RecordingScanner::default()),
    )
    .await
    .contribute()
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::RestoreIOFailed);
  assert!(top_level(&fixture.workspace).is_empty());
  assert!(fixture.layers.join("application/application.zip").is_file());
}
