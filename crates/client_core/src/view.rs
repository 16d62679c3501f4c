use shared::domain::LayerId;
use tracing::{debug, info};

use crate::layer::Layer;

/// Display surface the router drives. Implementations own the actual markup.
pub trait LayerView: Send {
    fn attach(&mut self, layer: &Layer);
    fn render(&mut self, layer_id: &LayerId, document: &str, closeable: bool);
    fn set_visible(&mut self, layer_id: &LayerId, visible: bool);
    fn detach(&mut self, layer_id: &LayerId);

    /// Runs after every `layer-change`; re-initializes third-party widgets.
    fn refresh_widgets(&mut self, _showing: Option<&LayerId>) {}
}

/// View without a display; records what would be drawn in the log.
#[derive(Debug, Default)]
pub struct HeadlessView;

impl LayerView for HeadlessView {
    fn attach(&mut self, layer: &Layer) {
        debug!(layer_id = %layer.id(), name = layer.name(), "attach layer");
    }

    fn render(&mut self, layer_id: &LayerId, document: &str, closeable: bool) {
        info!(
            layer_id = %layer_id,
            bytes = document.len(),
            closeable,
            "render layer content"
        );
    }

    fn set_visible(&mut self, layer_id: &LayerId, visible: bool) {
        debug!(layer_id = %layer_id, visible, "toggle layer visibility");
    }

    fn detach(&mut self, layer_id: &LayerId) {
        debug!(layer_id = %layer_id, "detach layer");
    }

    fn refresh_widgets(&mut self, showing: Option<&LayerId>) {
        if let Some(layer_id) = showing {
            info!(layer_id = %layer_id, "showing layer");
        }
    }
}
