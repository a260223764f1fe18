// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for frame capture
//!
//! # Modules
//!
//! - [`camera`]: Frame sources with a common capture interface
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Pipeline Layer                 │
//! └────────────────────┬────────────────────────┘
//!                      │ capture_into
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │  Synthetic  │    │  V4L2 (feature)  │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod camera;
