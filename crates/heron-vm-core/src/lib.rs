//! # Heron VM Core
//!
//! Opcode execution core for the Heron ECMAScript virtual machine.
//!
//! ## Design Principles
//!
//! - **Completion values**: every handler returns a [`Completion`]; throws
//!   travel as `Err` through `?` and are turned back into
//!   `Completion::Throw` at frame boundaries
//! - **Ownership by move**: values and argument lists are moved to transfer
//!   and cloned to duplicate, and released by drop on every exit path
//! - **Explicit frames**: handlers receive the [`FrameContext`] they run in
//!   instead of consulting global state

#![warn(clippy::all)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod collection;
pub mod completion;
pub mod context;
pub mod convert;
pub mod env;
pub mod error;
pub mod handlers;
mod interpreter;
pub mod object;
pub mod operators;
pub mod realm;
pub mod reference;
pub mod runtime;
pub mod string;
pub mod value;

pub use collection::ArgList;
pub use completion::{Completion, CompletionCode};
pub use context::{FrameContext, RunFlags};
pub use env::LexEnv;
pub use error::{ThrownValue, VmError, VmResult};
pub use object::{
    FunctionKind, JsObject, NativeCall, NativeFn, ObjectKind, PropertyAttributes, PropertyDescriptor, PropertyKey,
};
pub use realm::{ErrorKind, Realm};
pub use reference::Reference;
pub use runtime::{EvalCompiler, VmConfig, VmRuntime};
pub use string::{JsString, Magic};
pub use value::Value;
