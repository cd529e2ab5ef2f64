use std::path::Path;

use mlua::prelude::*;

use crate::consts::VERSION;

/// Create a new Lua runtime for evaluating project files.
///
/// Adds `<context>/?.lua` and `<context>/lua/?.lua` to `package.path` so
/// configs and plugins can `require` project-local modules, and registers the
/// `kiln` global table.
pub fn create_runtime(context: &Path) -> LuaResult<Lua> {
  let lua = Lua::new();
  let package_path = lua.globals().get::<LuaTable>("package")?.get::<String>("path")?;
  let dir = context.to_string_lossy();
  let new_package_path = format!("{dir}/?.lua;{dir}/lua/?.lua;{dir}/lua/?/init.lua;{}", package_path);
  lua
    .globals()
    .get::<LuaTable>("package")?
    .set("path", new_package_path)?;

  let kiln = lua.create_table()?;
  kiln.set("version", VERSION)?;
  kiln.set("context", dir.to_string())?;
  lua.globals().set("kiln", kiln)?;

  Ok(lua)
}

/// Load and execute a Lua file at the given path.
/// Sets the `kiln.dir` global to the directory of the loaded file.
/// Returns the result of the file execution.
pub fn load_file(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let canonical_path = dunce::canonicalize(path)
    .map_err(|e| LuaError::external(format!("cannot canonicalize '{}': {}", path.display(), e)))?;
  let content = std::fs::read_to_string(&canonical_path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical_path.display(), e)))?;

  let kiln_globals = lua.globals().get::<LuaTable>("kiln")?;
  kiln_globals.set(
    "dir",
    canonical_path
      .parent()
      .unwrap_or(Path::new(""))
      .to_string_lossy()
      .to_string(),
  )?;

  let result = lua
    .load(&content)
    .set_name(format!("@{}", canonical_path.display()))
    .eval::<LuaValue>()?;
  Ok(result)
}
