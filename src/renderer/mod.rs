//! Renderer plug-in interface: render-settings and AOV callbacks, registered by renderer name.

pub(crate) mod callbacks;
