//! Build command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_minimal_project() {
  let env = TestEnv::from_fixture("minimal.lua");

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build finished"))
    .stdout(predicate::str::contains("Pages: 0"));

  let routes = env.artifact("routes.json");
  assert!(routes.contains("\"pages\": []"), "{}", routes);
}

#[test]
fn build_reports_phase_timings() {
  let env = TestEnv::from_fixture("minimal.lua");

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Initialize"))
    .stdout(predicate::str::contains("Run plugins"))
    .stdout(predicate::str::contains("Create schema"))
    .stdout(predicate::str::contains("Generate code"));
}

#[test]
fn build_blog_writes_plugin_routes() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Pages: 3"))
    .stdout(predicate::str::contains("Queued assets: 1"));

  let routes = env.artifact("routes.json");
  assert!(routes.contains("/blog/first"), "{}", routes);
  assert!(routes.contains("/blog/second"), "{}", routes);
  assert!(routes.contains("/about"), "{}", routes);

  let assets = env.artifact("assets.json");
  assert!(assets.contains("images/cover.png"), "{}", assets);
}

#[test]
fn build_writes_live_client() {
  let env = TestEnv::blog();

  env.kiln_cmd().arg("build").assert().success();

  assert!(env.artifact("now.js").starts_with("export default "));
}

#[test]
fn build_fails_when_plugin_is_missing() {
  let env = TestEnv::from_fixture("blog.lua");

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Run plugins"))
    .stderr(predicate::str::contains("posts"));

  assert!(!env.path().join(".kiln/routes.json").exists());
}

#[test]
fn build_fails_when_hook_errors() {
  let env = TestEnv::empty();
  env.write_file(
    "kiln.lua",
    r#"return { plugins = { { use = "plugins/bad.lua", id = "bad" } } }"#,
  );
  env.write_file(
    "plugins/bad.lua",
    "return function(api) api.on('createSchemaQueries', function() error('bad schema') end) end",
  );

  env
    .kiln_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Create schema"))
    .stderr(predicate::str::contains("createSchemaQueries"))
    .stderr(predicate::str::contains("bad schema"));
}

#[test]
fn info_lists_configured_plugins() {
  let env = TestEnv::blog();

  env
    .kiln_cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("Site: Field Notes"))
    .stdout(predicate::str::contains("URL: https://notes.example"))
    .stdout(predicate::str::contains("Plugins: 1"))
    .stdout(predicate::str::contains("plugins/posts.lua"));
}
