//! Application assembly: window, default plugins, scene setup and the
//! registration order of every viewer system.

/// Builds the `App` with camera, tools, annotation scene loading and RPC.
pub mod app_setup;

/// Platform-specific window configuration for native and WASM builds.
pub mod window_config;
