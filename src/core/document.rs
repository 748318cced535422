use crate::core::kml::{KmlElement, KmlNode, KML_NAMESPACE};
use crate::core::placemark::PlacemarkEntity;
use crate::types::{KmzError, KmzResult};

/// Colour-bar screen overlay anchored at the lower-left corner
#[derive(Debug, Clone)]
pub struct LegendOverlay {
    pub name: String,
    pub image_href: String,
    /// Rendered width in pixels; height follows the image aspect ratio
    pub width_px: u32,
}

impl LegendOverlay {
    fn to_element(&self) -> KmlElement {
        let anchor = |name: &str| {
            KmlElement::new(name)
                .attr("x", "0")
                .attr("y", "0")
                .attr("xunits", "pixels")
                .attr("yunits", "insetPixels")
        };
        KmlElement::new("ScreenOverlay")
            .child(KmlElement::with_text("name", self.name.as_str()))
            .child(
                KmlElement::new("Icon")
                    .child(KmlElement::with_text("href", self.image_href.as_str()))
                    .child(KmlElement::with_text("viewBoundScale", "0.75")),
            )
            .child(anchor("overlayXY"))
            .child(anchor("screenXY"))
            .child(
                KmlElement::new("size")
                    .attr("x", self.width_px.to_string())
                    .attr("y", "0")
                    .attr("xunits", "pixels")
                    .attr("yunits", "pixels"),
            )
            .child(KmlElement::with_text("rotation", "0"))
            .child(KmlElement::with_text("visibility", "1"))
            .child(KmlElement::with_text("open", "0"))
    }
}

fn placemark_element(placemark: &PlacemarkEntity) -> KmlElement {
    let style = KmlElement::new("Style").child(
        KmlElement::new("IconStyle")
            .child(KmlElement::with_text("color", placemark.style.color.as_str()))
            .child(KmlElement::with_text("scale", placemark.style.scale.to_string()))
            .child(
                KmlElement::new("Icon")
                    .child(KmlElement::with_text("href", placemark.style.icon_href.as_str())),
            ),
    );
    let description =
        KmlElement::new("description").child_node(KmlNode::CData(placemark.description.clone()));
    let point = KmlElement::new("Point")
        .child(KmlElement::with_text("coordinates", placemark.coordinates_text()));

    KmlElement::new("Placemark")
        .attr("id", format!("pixel_{}", placemark.index))
        .child(style)
        .child(description)
        .child(point)
}

/// Accumulates the KML document: legend first, then placemarks
pub struct DocumentAssembler {
    document: KmlElement,
    next_index: usize,
}

impl DocumentAssembler {
    /// Start a document whose first child is the legend overlay
    pub fn new(legend: &LegendOverlay) -> Self {
        let mut document = KmlElement::new("Document");
        document.push(legend.to_element());
        Self {
            document,
            next_index: 0,
        }
    }

    /// Append placemarks, which must arrive in emission order
    pub fn append(&mut self, placemarks: &[PlacemarkEntity]) -> KmzResult<()> {
        for placemark in placemarks {
            if placemark.index != self.next_index {
                return Err(KmzError::DataShapeMismatch(format!(
                    "Placemark {} arrived where {} was expected",
                    placemark.index, self.next_index
                )));
            }
            self.document.push(placemark_element(placemark));
            self.next_index += 1;
        }
        Ok(())
    }

    pub fn placemark_count(&self) -> usize {
        self.next_index
    }

    pub fn document(&self) -> &KmlElement {
        &self.document
    }

    /// Serialize to pretty-printed KML text, consuming the tree
    pub fn serialize(self) -> KmzResult<String> {
        KmlElement::new("kml")
            .attr("xmlns", KML_NAMESPACE)
            .child(self.document)
            .to_xml_string()
    }
}
