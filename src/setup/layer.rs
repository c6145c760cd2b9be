use crate::foundation::ids::ItemId;

/// Named variant of the scene: an ordered list of top-level collections.
#[derive(Clone, Debug)]
pub struct RenderLayer {
    pub(crate) children: Vec<ItemId>,
    pub(crate) renderable: bool,
    pub(crate) num_isolated_children: u32,
    pub(crate) needs_apply_update: bool,
    pub(crate) about_to_apply: bool,
}

impl Default for RenderLayer {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            renderable: true,
            num_isolated_children: 0,
            needs_apply_update: false,
            about_to_apply: false,
        }
    }
}

impl RenderLayer {
    /// Top-level collections in declaration order.
    pub fn children(&self) -> &[ItemId] {
        &self.children
    }

    /// Whether the renderer should produce output for this layer.
    pub fn renderable(&self) -> bool {
        self.renderable
    }

    /// Number of isolated collections in the layer.
    pub fn num_isolated_children(&self) -> u32 {
        self.num_isolated_children
    }

    /// A selector of the applied layer changed and the layer awaits a partial reapply.
    pub fn needs_apply_update(&self) -> bool {
        self.needs_apply_update
    }

    /// Set while the layer's apply pipeline runs.
    pub fn is_about_to_apply(&self) -> bool {
        self.about_to_apply
    }
}

/// Name of the legacy render-layer node backing a layer.
pub fn legacy_layer_name(layer_name: &str) -> String {
    format!("rs_{layer_name}")
}

/// Name of the legacy node backing the default layer.
pub const DEFAULT_LEGACY_LAYER: &str = "defaultRenderLayer";
