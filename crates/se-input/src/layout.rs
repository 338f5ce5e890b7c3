//! Declarative control layout and pixel placement
//!
//! A layout is a list of controls with normalized positions and sizes. Pixel
//! geometry is always recomputed from the normalized values, so repeated
//! resizes never accumulate rounding error.

use se_core::LayoutError;
use se_native::ButtonCode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layout shipped with the application
const DEFAULT_LAYOUT: &str = include_str!("../assets/default.json");

/// Kind of on-screen control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Button,
    Dpad,
}

/// One entry of a control layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// Left edge as a fraction of container width
    pub x: f64,
    /// Top edge as a fraction of container height
    pub y: f64,
    /// Side length as a fraction of container width
    pub size: f64,
    /// Explicit button code; overrides the id-based mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
}

impl ControlDescriptor {
    /// Button code a button control reports
    pub fn button_code(&self) -> ButtonCode {
        self.code
            .map(ButtonCode)
            .unwrap_or_else(|| ButtonCode::from_control_id(&self.id))
    }

    fn validate(&self) -> Result<(), LayoutError> {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        if !unit(self.x) || !unit(self.y) {
            return Err(LayoutError::PositionOutOfRange {
                id: self.id.clone(),
                x: self.x,
                y: self.y,
            });
        }
        if !(self.size > 0.0 && self.size <= 1.0) {
            return Err(LayoutError::SizeOutOfRange {
                id: self.id.clone(),
                size: self.size,
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct LayoutDocument {
    buttons: Vec<ControlDescriptor>,
}

/// Ordered, immutable collection of control descriptors
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlLayout {
    controls: Vec<ControlDescriptor>,
}

impl ControlLayout {
    /// Parse and validate a layout document
    pub fn from_json(text: &str) -> Result<Self, LayoutError> {
        let doc: LayoutDocument =
            serde_json::from_str(text).map_err(|e| LayoutError::Malformed(e.to_string()))?;

        for control in &doc.buttons {
            control.validate()?;
        }

        tracing::debug!("Parsed control layout with {} controls", doc.buttons.len());
        Ok(Self {
            controls: doc.buttons,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, LayoutError> {
        let text = std::fs::read_to_string(path).map_err(|e| LayoutError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::info!("Loading control layout from {}", path.display());
        Self::from_json(&text)
    }

    /// The layout bundled with the application
    pub fn builtin() -> Result<Self, LayoutError> {
        Self::from_json(DEFAULT_LAYOUT)
    }

    /// Load a custom layout if one is configured, otherwise the builtin one
    pub fn load(custom: Option<&Path>) -> Result<Self, LayoutError> {
        match custom {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn controls(&self) -> &[ControlDescriptor] {
        &self.controls
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

/// Pixel dimensions of the overlay container
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Square pixel bounds of a placed control, relative to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelBounds {
    pub left: i32,
    pub top: i32,
    pub side: i32,
}

impl PixelBounds {
    pub fn center(&self) -> (f32, f32) {
        let half = self.side as f32 / 2.0;
        (self.left as f32 + half, self.top as f32 + half)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left as f32
            && y >= self.top as f32
            && x < (self.left + self.side) as f32
            && y < (self.top + self.side) as f32
    }

    /// Hit test against the inscribed circle
    pub fn contains_circle(&self, x: f32, y: f32) -> bool {
        let (cx, cy) = self.center();
        let r = self.side as f32 / 2.0;
        (x - cx).hypot(y - cy) <= r
    }
}

/// Compute a control's pixel bounds from its normalized descriptor
pub fn place(control: &ControlDescriptor, container: ContainerSize) -> PixelBounds {
    let width = f64::from(container.width);
    let height = f64::from(container.height);
    PixelBounds {
        left: (control.x * width).round() as i32,
        top: (control.y * height).round() as i32,
        side: (control.size * width).round() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(x: f64, y: f64, size: f64) -> ControlDescriptor {
        ControlDescriptor {
            id: "btnA".to_string(),
            kind: ControlKind::Button,
            x,
            y,
            size,
            code: None,
        }
    }

    #[test]
    fn test_builtin_layout() {
        let layout = ControlLayout::builtin().unwrap();
        let ids: Vec<_> = layout.controls().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["dpad", "btnA", "btnB", "btnStart"]);
        assert_eq!(layout.controls()[0].kind, ControlKind::Dpad);
    }

    #[test]
    fn test_parse_with_code_override() {
        let layout = ControlLayout::from_json(
            r#"{"buttons":[{"id":"turbo","type":"button","x":0.5,"y":0.5,"size":0.1,"code":2}]}"#,
        )
        .unwrap();
        assert_eq!(layout.controls()[0].button_code(), ButtonCode::B);
    }

    #[test]
    fn test_unknown_id_maps_to_none() {
        assert_eq!(descriptor(0.0, 0.0, 0.1).button_code(), ButtonCode::A);
        let mut d = descriptor(0.0, 0.0, 0.1);
        d.id = "btnX".to_string();
        assert_eq!(d.button_code(), ButtonCode::NONE);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(
            ControlLayout::from_json("{\"buttons\": 3}"),
            Err(LayoutError::Malformed(_))
        ));
        assert!(matches!(
            ControlLayout::from_json(
                r#"{"buttons":[{"id":"s","type":"stick","x":0,"y":0,"size":0.1}]}"#
            ),
            Err(LayoutError::Malformed(_))
        ));
        assert!(matches!(
            ControlLayout::from_json(
                r#"{"buttons":[{"id":"a","type":"button","x":1.2,"y":0,"size":0.1}]}"#
            ),
            Err(LayoutError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            ControlLayout::from_json(
                r#"{"buttons":[{"id":"a","type":"button","x":0,"y":0,"size":0}]}"#
            ),
            Err(LayoutError::SizeOutOfRange { .. })
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, DEFAULT_LAYOUT).unwrap();
        assert_eq!(ControlLayout::from_path(&path).unwrap().len(), 4);

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ControlLayout::load(Some(&missing)),
            Err(LayoutError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_place_uses_width_for_side() {
        let bounds = place(&descriptor(0.5, 0.25, 0.1), ContainerSize::new(1000.0, 400.0));
        assert_eq!(
            bounds,
            PixelBounds {
                left: 500,
                top: 100,
                side: 100,
            }
        );
    }

    #[test]
    fn test_place_square_container() {
        let bounds = place(&descriptor(0.8, 0.8, 0.12), ContainerSize::new(1000.0, 1000.0));
        assert_eq!(
            bounds,
            PixelBounds {
                left: 800,
                top: 800,
                side: 120,
            }
        );
    }

    #[test]
    fn test_place_is_stable_across_resizes() {
        let d = descriptor(0.333, 0.777, 0.123);
        let first = place(&d, ContainerSize::new(1080.0, 1920.0));
        for size in [(320.0, 240.0), (1.0, 1.0), (4096.0, 2160.0), (333.0, 777.0)] {
            place(&d, ContainerSize::new(size.0, size.1));
        }
        assert_eq!(place(&d, ContainerSize::new(1080.0, 1920.0)), first);
    }

    #[test]
    fn test_place_rounds_to_nearest() {
        let bounds = place(&descriptor(0.5, 0.5, 0.5), ContainerSize::new(101.0, 101.0));
        // 50.5 rounds away from zero
        assert_eq!(bounds.left, 51);
        assert_eq!(bounds.side, 51);
    }

    #[test]
    fn test_hit_shapes() {
        let b = PixelBounds {
            left: 0,
            top: 0,
            side: 100,
        };
        assert!(b.contains(1.0, 1.0));
        assert!(!b.contains_circle(1.0, 1.0));
        assert!(b.contains_circle(50.0, 5.0));
        assert!(!b.contains(100.0, 50.0));
    }
}
