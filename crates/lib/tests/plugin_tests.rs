//! Lua plugins driven through a full bootstrap from `kiln.lua`.

use std::path::Path;
use std::time::Duration;

use kiln_lib::config::load_config;
use kiln_lib::consts::{LAST_PHASE, SCHEMA_PHASE};
use kiln_lib::{BootstrapError, bootstrap};
use serde_json::{Map, json};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
  let path = root.join(relative);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, content).unwrap();
}

const CONFIG: &str = r#"
return {
  site_name = "Notes",
  plugins = {
    { use = "plugins/posts.lua", options = { greeting = "hello" } },
    { use = "plugins/extras.lua", id = "extras" },
  },
}
"#;

const POSTS: &str = r#"
return function(api, options)
  api.add_collection("Post", {
    route = "/blog/:slug",
    component = "Post",
    query = "query ($path: String!) { post(path: $path) { title } }",
  })
  api.add_node("Post", { id = "1", slug = "first", title = "First" })
  api.add_node("Post", { id = "2", slug = "second", title = "Second" })
  api.queue_asset("images/cover.png")

  api.on("createSchemaQueries", function(args)
    return { greeting = { type = "String", value = options.greeting } }
  end)
end
"#;

const EXTRAS: &str = r#"
return function(api)
  api.add_page({ path = "/about", component = "About" })

  api.on("createSchemaQueries", function()
    return { greeting = { type = "String", value = "overridden" }, extras = { value = true } }
  end)

  api.on("afterBootstrap", function()
    api.add_node("Post", { id = "3", slug = "late", title = "Late" })
    api.emit("generateRoutes")
  end)
end
"#;

fn project() -> TempDir {
  let temp = TempDir::new().unwrap();
  write(temp.path(), "kiln.lua", CONFIG);
  write(temp.path(), "plugins/posts.lua", POSTS);
  write(temp.path(), "plugins/extras.lua", EXTRAS);
  temp
}

#[tokio::test]
async fn lua_plugins_drive_a_full_build() {
  let temp = project();
  let config = load_config(temp.path()).unwrap();
  let app = bootstrap(temp.path(), config, LAST_PHASE).await.unwrap();

  let plugins: Vec<String> = app.plugins().unwrap().plugins().into_iter().map(|id| id.0).collect();
  assert_eq!(plugins, vec!["posts".to_string(), "extras".to_string()]);

  let response = app.graphql("{ greeting extras metadata { siteName } }", &Map::new());
  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.data["greeting"], json!("overridden"));
  assert_eq!(response.data["extras"], json!(true));
  assert_eq!(response.data["metadata"], json!({ "siteName": "Notes" }));

  let route = app.resolve_route("/blog/second");
  let data = app.query_route_data(&route);
  assert_eq!(data.data["post"], json!({ "title": "Second" }));

  let assets = std::fs::read_to_string(temp.path().join(".kiln/assets.json")).unwrap();
  assert!(assets.contains("images/cover.png"));
}

#[tokio::test]
async fn after_bootstrap_regeneration_picks_up_new_content() {
  let temp = project();
  let config = load_config(temp.path()).unwrap();
  let app = bootstrap(temp.path(), config, LAST_PHASE).await.unwrap();

  let routes_path = temp.path().join(".kiln/routes.json");
  for _ in 0..200 {
    let routes = std::fs::read_to_string(&routes_path).unwrap_or_default();
    if routes.contains("/blog/late") {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  assert!(std::fs::read_to_string(&routes_path).unwrap().contains("/blog/late"));
  assert!(app.resolve_route("/blog/late").is_match());
}

#[tokio::test]
async fn schema_target_skips_generation() {
  let temp = project();
  let config = load_config(temp.path()).unwrap();
  let app = bootstrap(temp.path(), config, SCHEMA_PHASE).await.unwrap();

  assert!(app.schema().is_some());
  assert!(app.routes().is_none());
  assert!(!temp.path().join(".kiln/routes.json").exists());
}

#[tokio::test]
async fn broken_plugin_fails_the_run_plugins_phase() {
  let temp = TempDir::new().unwrap();
  write(
    temp.path(),
    "kiln.lua",
    r#"return { plugins = { { use = "plugins/broken.lua" } } }"#,
  );
  write(temp.path(), "plugins/broken.lua", "return function(api) error('no content dir') end");

  let config = load_config(temp.path()).unwrap();
  let err = bootstrap(temp.path(), config, LAST_PHASE).await.unwrap_err();

  assert_eq!(err.phase(), Some("Run plugins"));
  let message = err.to_string();
  assert!(message.contains("broken"), "{}", message);
  assert!(message.contains("no content dir"), "{}", message);
}

#[tokio::test]
async fn failing_hook_is_attributed_to_its_plugin() {
  let temp = TempDir::new().unwrap();
  write(
    temp.path(),
    "kiln.lua",
    r#"return { plugins = { { use = "plugins/ok.lua" }, { use = "plugins/bad.lua", id = "bad-schema" } } }"#,
  );
  write(
    temp.path(),
    "plugins/ok.lua",
    "return function(api) api.on('createSchemaQueries', function() return {} end) end",
  );
  write(
    temp.path(),
    "plugins/bad.lua",
    "return function(api) api.on('createSchemaQueries', function() error('schema exploded') end) end",
  );

  let config = load_config(temp.path()).unwrap();
  let err = bootstrap(temp.path(), config, LAST_PHASE).await.unwrap_err();

  let BootstrapError::PhaseFailure { phase, cause } = err else {
    panic!("expected a phase failure");
  };
  assert_eq!(phase, "Create schema");
  let hook = cause.downcast_ref::<kiln_lib::plugins::HookError>().unwrap();
  assert_eq!(hook.plugin.0, "bad-schema");
}

#[tokio::test]
async fn lua_plugins_do_not_observe_init() {
  let temp = TempDir::new().unwrap();
  write(
    temp.path(),
    "kiln.lua",
    r#"return { plugins = { { use = "plugins/late.lua" } } }"#,
  );
  write(
    temp.path(),
    "plugins/late.lua",
    r#"
      return function(api)
        api.on("init", function() api.add_page({ path = "/init" }) end)
        api.on("afterBootstrap", function() api.add_page({ path = "/after" }) end)
      end
    "#,
  );

  let config = load_config(temp.path()).unwrap();
  let app = bootstrap(temp.path(), config, 1).await.unwrap();

  let paths: Vec<String> = app.store().unwrap().pages().into_iter().map(|p| p.path).collect();
  assert_eq!(paths, vec!["/after".to_string()]);
}
