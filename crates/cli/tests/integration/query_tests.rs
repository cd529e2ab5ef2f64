//! Schema and query command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn schema_lists_plugin_fields() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .arg("schema")
    .assert()
    .success()
    .stdout(predicate::str::contains("allPost"))
    .stdout(predicate::str::contains("tagline"))
    .stdout(predicate::str::contains("metadata"));

  assert!(!env.path().join(".kiln/routes.json").exists());
}

#[test]
fn query_collection_nodes() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .args(["query", "{ allPost { title } }"])
    .assert()
    .success()
    .stdout(predicate::str::contains("First light"))
    .stdout(predicate::str::contains("Second wind"));
}

#[test]
fn query_plugin_extension_field() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .args(["query", "{ tagline metadata { siteUrl } }"])
    .assert()
    .success()
    .stdout(predicate::str::contains("notes from the field"))
    .stdout(predicate::str::contains("https://notes.example"));
}

#[test]
fn query_with_variables() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .args([
      "query",
      "query ($path: String!) { post(path: $path) { title } }",
      "--vars",
      r#"{ "path": "/blog/second" }"#,
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("Second wind"))
    .stdout(predicate::str::contains("First light").not());
}

#[test]
fn query_syntax_error_fails() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .args(["query", "{ allPost { title "])
    .assert()
    .failure()
    .stderr(predicate::str::contains("error(s)"));
}
