/*!
# GLSLens

Shader reflection for GLSL through a shared compiler backend process.

A renderer asks which uniforms a GLSL source exposes (name, array size, type
code) without compiling it on the GPU. The GLSL front end runs in a separate
`glslens-backend` process that is started on demand and shared by every
caller in the process.

## Architecture

- **StageId**: pipeline stage resolved from a textual tag ("frag", "EShLangRayGenNV", ...)
- **CompilerService**: reference-counted owner of the backend process
- **CompilerHandle**: one caller's open reference; queries go through it
- **protocol**: framed request/response codec spoken with the backend
- **UniformSummary / ReflectionRecord**: what the backend reports

## Example

```no_run
use glslens::Glslens;

let handle = Glslens::acquire()?;
let uniforms = handle.query(
    "uniform vec4 color;\nuniform float weights[4];\nvoid main() { gl_FragColor = color * weights[0]; }",
    450,
    "frag",
)?;
assert_eq!(uniforms[0].name(), "color");
handle.release()?;
# Ok::<(), glslens::Error>(())
```
*/

mod error;
mod glslens;
mod service;
pub mod backend;
pub mod config;
pub mod log;
pub mod protocol;
pub mod reflection;
pub mod stage;

#[cfg(test)]
mod mock_backend;

// Error types
pub use crate::error::{Error, Result};

// Process-wide entry point (also used by the logging macros)
pub use crate::glslens::Glslens;

// Service and handles
pub use crate::service::{CompilerHandle, CompilerService, ServiceStats};

// Configuration
pub use crate::config::ServiceConfig;

// Backend plumbing
pub use crate::backend::{BackendChannel, BackendLauncher, ProcessLauncher};

// Data model
pub use crate::reflection::{ReflectionRecord, ShaderReflection, UniformSummary};
pub use crate::stage::StageId;
