//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated project directory.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create a project whose `kiln.lua` is the given fixture.
  pub fn from_fixture(name: &str) -> Self {
    let env = Self::empty();
    env.write_file("kiln.lua", &fixture_content(name));
    env
  }

  /// The `blog.lua` project with its posts plugin in place.
  pub fn blog() -> Self {
    let env = Self::from_fixture("blog.lua");
    env.write_file("plugins/posts.lua", &fixture_content("posts_plugin.lua"));
    env
  }

  pub fn empty() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Read a generated artifact from `.kiln/`.
  pub fn artifact(&self, name: &str) -> String {
    std::fs::read_to_string(self.temp.path().join(".kiln").join(name))
      .unwrap_or_else(|e| panic!("Failed to read artifact {}: {}", name, e))
  }

  /// A kiln command pointed at this project.
  pub fn kiln_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("kiln");
    cmd.arg("-C").arg(self.temp.path());
    cmd.env_remove("KILN_HOST");
    cmd.env_remove("KILN_PORT");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
