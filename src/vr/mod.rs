//! VR interaction core: math, ray geometry, widgets and controllers.

pub mod controller;
pub mod geometry;
pub mod interaction;
pub mod math;
pub mod widget;
