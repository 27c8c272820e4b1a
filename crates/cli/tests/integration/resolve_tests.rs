use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn resolves_the_default_pattern() {
  let env = TestEnv::new();
  env.write_jar("target/demo-1.0.jar", None);

  env
    .bcache_cmd()
    .arg("resolve")
    .arg("--workspace")
    .arg(env.workspace())
    .assert()
    .success()
    .stdout(predicate::str::contains("Pattern: target/*.[jw]ar"))
    .stdout(predicate::str::contains("demo-1.0.jar"));
}

#[test]
fn module_prefixes_the_default_pattern() {
  let env = TestEnv::new();
  env.write_jar("api/target/api-1.0.jar", None);

  env
    .bcache_cmd()
    .arg("resolve")
    .arg("--workspace")
    .arg(env.workspace())
    .env("BC_BUILT_MODULE", "api")
    .assert()
    .success()
    .stdout(predicate::str::contains("Pattern: api/target/*.[jw]ar"));
}

#[test]
fn ambiguous_match_lists_candidates() {
  let env = TestEnv::new();
  env.write_jar("target/a.jar", None);
  env.write_jar("target/b.jar", None);

  env
    .bcache_cmd()
    .arg("resolve")
    .arg("--workspace")
    .arg(env.workspace())
    .assert()
    .failure()
    .stderr(predicate::str::contains("unable to find single built artifact in target/*.[jw]ar"));
}

#[test]
fn executable_archive_breaks_ties() {
  let env = TestEnv::new();
  env.write_jar("target/a.jar", Some("demo.App"));
  env.write_jar("target/b.jar", None);

  env
    .bcache_cmd()
    .arg("resolve")
    .arg("--workspace")
    .arg(env.workspace())
    .arg("--executable-archive")
    .args(["-o", "json"])
    .assert()
    .success()
    .stdout(predicate::str::contains("a.jar"))
    .stdout(predicate::str::contains("b.jar").not());
}

#[test]
fn many_unions_every_token() {
  let env = TestEnv::new();
  env.write_jar("target/a.jar", None);
  env.write_file("target/other/notes.txt", "x");

  env
    .bcache_cmd()
    .arg("resolve")
    .arg("--workspace")
    .arg(env.workspace())
    .arg("--many")
    .env("BC_BUILT_ARTIFACT", "target/*.jar target/other/")
    .assert()
    .success()
    .stdout(predicate::str::contains("a.jar"))
    .stdout(predicate::str::contains("other"));
}

#[test]
fn bad_patterns_are_all_reported() {
  let env = TestEnv::new();

  env
    .bcache_cmd()
    .arg("resolve")
    .arg("--workspace")
    .arg(env.workspace())
    .arg("--many")
    .env("BC_BUILT_ARTIFACT", "target/[ other/{")
    .assert()
    .failure()
    .stderr(predicate::str::contains("unable to proceed due to bad pattern(s):\ntarget/[\nother/{"));
}
