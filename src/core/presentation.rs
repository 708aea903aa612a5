//! Display-side description of a pipeline run. Pure data: layers, legend and
//! export triggers are handed to whatever renders them.

use crate::types::{ExportDescriptor, GlobalRange};
use serde::{Deserialize, Serialize};

/// Default thermal palette, cold to hot
pub const THERMAL_PALETTE: [&str; 10] = [
    "040274", "2c7bb6", "00a6ca", "00ccbc", "90eb9d", "ffff8c", "f9d057", "f29e2e", "e76818",
    "d7191c",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
    /// Band names for multi-band (RGB) layers
    pub bands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    pub vis: VisParams,
    /// Scene the layer is drawn from, if any
    pub scene_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub title: String,
    pub min_label: String,
    pub max_label: String,
    pub palette: Vec<String>,
}

impl Legend {
    pub fn for_range(title: &str, range: &GlobalRange, palette: &[String]) -> Self {
        Self {
            title: title.to_string(),
            min_label: format!("{:.2} °C", range.min),
            max_label: format!("{:.2} °C", range.max),
            palette: palette.to_vec(),
        }
    }
}

/// One "export" control per descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTrigger {
    pub label: String,
    pub descriptor_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationContext {
    pub layers: Vec<Layer>,
    pub legend: Option<Legend>,
    pub export_triggers: Vec<ExportTrigger>,
}

impl PresentationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn set_legend(&mut self, legend: Legend) {
        self.legend = Some(legend);
    }

    /// Add one trigger per descriptor, in order
    pub fn add_export_triggers(&mut self, descriptors: &[ExportDescriptor]) {
        self.export_triggers.extend(descriptors.iter().enumerate().map(|(i, d)| ExportTrigger {
            label: format!("Export: {}", d.name),
            descriptor_index: i,
        }));
    }

    pub fn visible_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|l| l.visible)
    }
}
