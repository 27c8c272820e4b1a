#![cfg(unix)]

use std::fs;

use predicates::prelude::*;

use super::common::TestEnv;

const DIST_SCRIPT: &str = "mkdir -p target/dist && echo hello > target/dist/run.txt";

#[test]
fn build_replaces_sources_with_artifacts() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build complete!"));

  assert!(!env.workspace().join("pom.xml").exists());
  assert_eq!(
    fs::read_to_string(env.workspace().join("dist/run.txt")).unwrap(),
    "hello\n"
  );
  assert!(env.layers().join("application/dist/run.txt").is_file());
  assert!(env.layers().join("application.json").is_file());
}

#[test]
fn unchanged_sources_reuse_cached_output() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .args(["-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"outcome\": \"miss\""));

  env.clear_workspace();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .args(["-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"outcome\": \"hit\""));

  assert!(env.workspace().join("dist/run.txt").is_file());
}

#[test]
fn single_archive_is_extracted_into_workspace() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");
  let jar = env.temp.path().join("prebuilt.jar");
  super::common::write_jar(&jar, Some("demo.App"));

  env
    .build_cmd(&format!("mkdir -p target && cp {} target/demo.jar", jar.display()))
    .assert()
    .success();

  assert!(env.layers().join("application/application.zip").is_file());
  assert!(env.workspace().join("META-INF/MANIFEST.MF").is_file());
}

#[test]
fn failing_build_keeps_sources() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd("exit 2")
    .assert()
    .failure()
    .stderr(predicate::str::contains("BuildExecutionFailed"));

  assert!(env.workspace().join("pom.xml").exists());
}

#[test]
fn missing_artifact_reports_directory_listing_and_help() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd("true")
    .args(["--help-message", "Set BC_BUILT_ARTIFACT."])
    .assert()
    .failure()
    .stderr(predicate::str::contains(
      "unable to find any built artifacts in target/*.[jw]ar, directory contains: [pom.xml]. Set BC_BUILT_ARTIFACT.",
    ));

  assert!(env.workspace().join("pom.xml").exists());
}

#[test]
fn ledger_records_build_dependencies() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");
  let m2 = env.temp.path().join("home/.m2");
  let ledger = env.temp.path().join("ledger.json");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .arg("--dependency-cache")
    .arg(&m2)
    .arg("--ledger")
    .arg(&ledger)
    .assert()
    .success();

  assert_eq!(
    fs::read_link(&m2).unwrap(),
    dunce::canonicalize(env.layers()).unwrap().join("cache")
  );
  let content = fs::read_to_string(&ledger).unwrap();
  assert!(content.contains("\"build-dependencies\""));
  assert!(content.contains("\"layer\": \"cache\""));
}

#[test]
fn include_files_are_kept() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");
  env.write_file("config/app.yml", "port: 8080");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .env("BC_INCLUDE_FILES", "config")
    .assert()
    .success();

  assert!(env.workspace().join("config/app.yml").is_file());
  assert!(!env.workspace().join("pom.xml").exists());
}

#[test]
fn metadata_changes_the_fingerprint() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .assert()
    .success();

  env.clear_workspace();
  env.write_file("pom.xml", "<project/>");

  env
    .build_cmd(DIST_SCRIPT)
    .env("BC_BUILT_ARTIFACT", "target/dist")
    .args(["-m", "profile=release", "-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"outcome\": \"miss\""));
}

#[test]
fn layers_inside_workspace_are_rejected() {
  let env = TestEnv::new();
  env.write_file("pom.xml", "<project/>");

  env
    .bcache_cmd()
    .arg("build")
    .arg("--workspace")
    .arg(env.workspace())
    .arg("--layers")
    .arg(env.workspace().join(".layers"))
    .args(["--command", "/bin/sh"])
    .args(["--probe", "echo javac 17.0.2"])
    .args(["--syft", "true"])
    .env("BC_BUILD_ARGUMENTS", format!("-c '{}'", DIST_SCRIPT))
    .assert()
    .failure()
    .stderr(predicate::str::contains("must be outside the workspace"));

  assert!(env.workspace().join("pom.xml").exists());
  assert!(!env.workspace().join("target").exists());
}
