/*!
# GLSLens Backend

The `glslens-backend` executable and the GLSL front end behind it.

- **reflect**: parses GLSL with the `glsl` crate and reports active uniforms
- **types / layout**: GLSL type model and std140/std430 offsets
- **usage**: which declarations the entry point can reach
- **server**: framed request loop spoken with `glslens::CompilerService`
- **oneshot**: line-oriented mode for scripts
*/

pub mod gl_types;
pub mod layout;
pub mod oneshot;
pub mod reflect;
pub mod server;
pub mod types;
pub mod usage;

pub use crate::reflect::reflect;
pub use crate::server::{serve, ServeExit};
