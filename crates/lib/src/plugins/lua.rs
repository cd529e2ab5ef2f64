//! Lua plugins.
//!
//! A Lua plugin is a file returning its entry function:
//!
//! ```lua
//! return function(api, options)
//!   api.add_collection("Post", { route = "/blog/:slug" })
//!   api.add_node("Post", { id = "1", slug = "hello", title = "Hello" })
//!
//!   api.on("createSchemaQueries", function(args)
//!     return { greeting = { type = "String", value = options.greeting } }
//!   end)
//! end
//! ```
//!
//! The `api` table:
//! - `api.id`, `api.context`
//! - `api.on(hook, fn)` - register a hook handler
//! - `api.emit(event, payload)` - `"broadcast"` or `"generateRoutes"`
//! - `api.nodes(type)`, `api.node(type, id)` - read the store
//! - `api.add_collection(type, opts)`, `api.add_node(type, node)`,
//!   `api.add_page(page)` - write the store
//! - `api.queue_asset(path)` - queue an asset
//!
//! Each plugin gets its own Lua state. Handlers keep that state alive.

use std::path::Path;

use anyhow::{Context, bail};
use mlua::prelude::{Lua, LuaError, LuaFunction, LuaResult, LuaSerdeExt, LuaSerializeOptions, LuaTable, LuaValue};
use serde::Serialize;

use super::registry::{HookFuture, HookHandler, HookInput, HookName, HookOutput};
use super::{PluginApi, PluginEvent};
use crate::lua::runtime;
use crate::schema::SchemaQueries;
use crate::store::{CollectionOptions, Node, StaticPage};

/// Load the plugin at `path` and call its entry function.
pub fn load_plugin(api: PluginApi, path: &Path, options: &serde_json::Value) -> anyhow::Result<()> {
  let lua = runtime::create_runtime(api.context()).context("failed to create Lua runtime")?;
  let entry = match runtime::load_file(&lua, path)? {
    LuaValue::Function(entry) => entry,
    other => bail!(
      "{} must return a function, got {}",
      path.display(),
      other.type_name()
    ),
  };

  let api_table = create_api_table(&lua, api)?;
  let options = to_lua(&lua, options)?;
  entry.call::<()>((api_table, options))?;
  Ok(())
}

fn to_lua<T: Serialize + ?Sized>(lua: &Lua, value: &T) -> LuaResult<LuaValue> {
  lua.to_value_with(
    value,
    LuaSerializeOptions::new()
      .serialize_none_to_null(false)
      .serialize_unit_to_null(false),
  )
}

fn create_api_table(lua: &Lua, api: PluginApi) -> LuaResult<LuaTable> {
  let table = lua.create_table()?;
  table.set("id", api.id().to_string())?;
  table.set("context", api.context().to_string_lossy().to_string())?;

  let plugin = api.clone();
  let on = lua.create_function(move |lua, (name, function): (String, LuaFunction)| {
    let hook: HookName = name.parse().map_err(LuaError::external)?;
    let handler = LuaHookHandler {
      lua: lua.clone(),
      function,
    };
    if !plugin.on(hook, handler) {
      return Err(LuaError::external("plugin runner is no longer available"));
    }
    Ok(())
  })?;
  table.set("on", on)?;

  let plugin = api.clone();
  let emit = lua.create_function(move |lua, (name, payload): (String, Option<LuaValue>)| {
    let payload: serde_json::Value = match payload {
      Some(value) => lua.from_value(value)?,
      None => serde_json::Value::Null,
    };
    let event = PluginEvent::from_name(&name, payload)
      .ok_or_else(|| LuaError::external(format!("unknown event '{}'", name)))?;
    Ok(plugin.emit(event))
  })?;
  table.set("emit", emit)?;

  let plugin = api.clone();
  let nodes = lua.create_function(move |lua, type_name: String| to_lua(lua, &plugin.store().nodes(&type_name)))?;
  table.set("nodes", nodes)?;

  let plugin = api.clone();
  let node = lua.create_function(move |lua, (type_name, id): (String, String)| {
    to_lua(lua, &plugin.store().node(&type_name, &id))
  })?;
  table.set("node", node)?;

  let plugin = api.clone();
  let add_collection = lua.create_function(move |lua, (type_name, options): (String, Option<LuaValue>)| {
    let options: CollectionOptions = match options {
      Some(value) => lua.from_value(value)?,
      None => CollectionOptions::default(),
    };
    plugin.store().add_collection(&type_name, options);
    Ok(())
  })?;
  table.set("add_collection", add_collection)?;

  let plugin = api.clone();
  let add_node = lua.create_function(move |lua, (type_name, value): (String, LuaValue)| {
    let json: serde_json::Value = lua.from_value(value)?;
    let node = Node::from_json(&type_name, json).map_err(LuaError::external)?;
    plugin.store().add_node(&type_name, node).map_err(LuaError::external)
  })?;
  table.set("add_node", add_node)?;

  let plugin = api.clone();
  let add_page = lua.create_function(move |lua, value: LuaValue| {
    let page: StaticPage = lua.from_value(value)?;
    plugin.store().add_page(page);
    Ok(())
  })?;
  table.set("add_page", add_page)?;

  let plugin = api;
  let queue_asset = lua.create_function(move |_, path: String| Ok(plugin.queue().enqueue(path)))?;
  table.set("queue_asset", queue_asset)?;

  Ok(table)
}

/// A hook handler backed by a Lua function.
///
/// Handlers get no arguments except `createSchemaQueries`, which receives
/// `{ store = { collections = { Type = count } } }` and may return a table of
/// query fields (or nil).
struct LuaHookHandler {
  lua: Lua,
  function: LuaFunction,
}

impl HookHandler for LuaHookHandler {
  fn call(&self, input: HookInput) -> HookFuture {
    let lua = self.lua.clone();
    let function = self.function.clone();

    Box::pin(async move {
      match input {
        HookInput::CreateSchemaQueries { store } => {
          let args = serde_json::json!({ "store": { "collections": store.counts() } });
          let result: LuaValue = function.call(to_lua(&lua, &args)?)?;
          let queries = match result {
            LuaValue::Nil => SchemaQueries::new(),
            value => lua
              .from_value(value)
              .context("createSchemaQueries must return a table of fields")?,
          };
          Ok(HookOutput::SchemaQueries(queries))
        }
        HookInput::Init | HookInput::AfterBootstrap => {
          function.call::<()>(())?;
          Ok(HookOutput::None)
        }
      }
    })
  }
}
