//! d2render — stateless D2 diagram rendering service.
//!
//! A request flows through [`options::compose_options`] (consulting
//! [`engine::select_engine`] when auto-selection applies), a
//! [`render::DiagramRenderer`], and [`convert::convert`], orchestrated by
//! [`pipeline::Pipeline`] and exposed over HTTP by [`routes::app`].

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod state;
