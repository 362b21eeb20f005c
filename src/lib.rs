//! # configen
//!
//! **configen** is a template based configuration generator. It renders a tree
//! of templates against merged value files, once per environment, validates
//! every structured result against JSON Schema and writes the output tree.
//!
//! ## Overview
//!
//! A run takes template directories, value files, schema directories and a
//! list of environments (`dev`, `prod`, ...). Every path may embed the
//! environment name (`dist/{{.Env}}`, `values-{{ Env }}.yaml`). For each
//! environment configen:
//!
//! - deep-merges the overrides and value files into the context
//! - indexes the schemas by `$id` so documents can reference each other
//! - renders every template file (fragments, named with a leading `_`, are
//!   only included, never written)
//! - normalises the output format, validates documents declaring `$schema`,
//!   runs deferred blocks and writes the result
//!
//! ## Architecture
//!
//! - **[`options`]** - generation options and path templates
//! - **[`context`]** - template context construction and deep merge
//! - **[`schema`]** - schema cache with `$id` cross references and validation
//! - **[`engine`]** - template environment, function library, deferred blocks
//! - **[`format`]** - YAML, JSON, JSON with comments and TOML codecs
//! - **[`generator`]** - the per-environment, per-file pipeline
//! - **[`watch`]** - regeneration on change and the preview server
//! - **[`static_files`]** - file lookup for the preview server
//! - **[`cli`]** - command-line front end
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`error`]** - error taxonomy
//!
//! ### Generation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant CLI as CLI<br/>(configen)
//!     participant Gen as generator::generate
//!     participant Schema as schema::SchemaCache
//!     participant Ctx as context::Context
//!     participant Engine as engine::TemplateRoot
//!     participant Pipe as generator::Pipeline
//!     participant FS as File System
//!
//!     CLI->>Gen: generate(options, envs)
//!     loop every environment
//!         Gen->>Schema: load(schema dirs)
//!         Gen->>Ctx: build(options, env, schemas)
//!         Ctx->>Schema: validate value files declaring $schema
//!         Gen->>Engine: build(context, fragments)
//!         loop every target file
//!             Gen->>Pipe: run(target)
//!             Pipe->>Pipe: render in a forked environment
//!             Pipe->>FS: dump raw render (optional)
//!             Pipe->>Pipe: transform (jsonc, $format)
//!             Pipe->>Schema: validate ($schema)
//!             Pipe->>Pipe: deferred blocks, newest first
//!             Pipe->>FS: write (unless dry-run)
//!         end
//!     end
//!     Gen->>FS: copy package descriptor
//! ```
//!
//! ## Templates
//!
//! Templates use Jinja syntax ([`minijinja`]); Go style root references such
//! as `{{ .Values.name }}` are accepted too. The context holds `Values`,
//! `Files` and `Env`:
//!
//! ```text
//! # templates/app.yaml
//! $schema: app
//! name: {{ .Values.name }}
//! replicas: {{ Values.replicas | default(1) }}
//! image: {{ required("image is required", Values.image) }}
//! ```
//!
//! See [`engine`] for the function library.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use configen::{generate, Console, Options};
//!
//! let options = Options {
//!     templates: vec!["templates".into()],
//!     output: "dist/{{ Env }}".into(),
//!     schemas: vec!["schemas".into()],
//!     values: vec!["values.yaml".into()],
//!     ..Options::default()
//! };
//! generate(&options, &["dev".into()], &Console::Stdout)?;
//! ```

pub mod cli;
pub mod context;
pub mod engine;
pub mod error;
pub mod format;
pub mod generator;
pub mod logging;
pub mod options;
pub mod schema;
pub mod static_files;
pub mod watch;

pub use context::{deep_merge, Context};
pub use engine::{Console, TemplateRoot};
pub use error::{Error, Result};
pub use format::Format;
pub use generator::generate;
pub use options::Options;
pub use schema::SchemaCache;
