// Library root
// -----------
// The `zat` binary (`main.rs`) is a thin wrapper around these modules.
//
// Module responsibilities, roughly in dependency order:
// - `connection`: subdomain/URL and email validation, Basic auth header.
// - `cache`: the `.zat` key/value files remembered between runs.
// - `manifest`: reading and validating an app directory.
// - `package`: zipping an app for upload.
// - `settings`: installation settings from a file or from prompts.
// - `api`: blocking HTTP calls to the platform's app endpoints.
// - `deploy`: the create/update flows, job polling and app lookup.
// - `update`: weekly check for a newer release.
// - `server`: local development server.
// - `template`: skeleton for `zat new`.
// - `cli`, `commands`, `ui`: argument parsing, dispatch, terminal I/O.
pub mod api;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod connection;
pub mod deploy;
pub mod error;
pub mod manifest;
pub mod package;
pub mod server;
pub mod settings;
pub mod template;
pub mod ui;
pub mod update;

pub use error::ZatError;
