//! Dataset descriptions
//!
//! This module describes the reference datasets handled by ipsnap:
//!
//! - **codec**: fixed-width, order-preserving binary keys for range endpoints
//! - **kind**: the six dataset kinds, their column layouts and table roles
//! - **row**: range rows as parsed from a snapshot

pub mod codec;
pub mod kind;
pub mod row;

pub use codec::KeyWidth;
pub use kind::{ColumnSpec, ColumnType, DatasetKind, DatasetSchema, LineTerminator, Role};
pub use row::{AttributeValue, RangeRow};
