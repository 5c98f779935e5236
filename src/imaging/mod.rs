//! Image processing, pure Rust.
//!
//! | Piece | Role |
//! |---|---|
//! | **Parameters** | [`Pipeline`]: the deferred handle operations describe work on |
//! | **Operations** | [`OperationRegistry`] of named operations, built-in `default` resize/crop |
//! | **Calculations** | Pure dimension math (unit testable) |
//! | **Backend** | [`ImageBackend`] trait + [`RustBackend`] (decode, replay, encode) |

pub mod backend;
pub mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, output_format};
pub use operations::{
    DEFAULT_OPERATION, Operation, OperationError, OperationRegistry, UnknownOperation,
    bounded_resize_and_crop, resize_and_crop,
};
pub use params::{MAX_DIMENSION, Pipeline, Quality, Step};
pub use rust_backend::RustBackend;
