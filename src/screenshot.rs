//! Viewport-sized screenshot acquisition

use crate::client::WebDriverClient;
use crate::{Error, Result, ScriptValue};
use image::GenericImageView;
use std::io::Cursor;

const VIEWPORT_SCRIPT: &str = r#"
return {
    width: window.innerWidth,
    height: window.innerHeight,
    devicePixelRatio: window.devicePixelRatio || 1
};
"#;

/// Logical viewport as measured in the page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub width: u32,
    pub height: u32,
    pub dpr: f64,
}

impl ViewportMetrics {
    /// Read the measuring script's result. `None` when a dimension is missing
    /// or zero; a missing ratio means 1.
    pub fn from_script_value(v: &ScriptValue) -> Option<Self> {
        let width = v.get("width").and_then(ScriptValue::as_f64).unwrap_or(0.0) as u32;
        let height = v.get("height").and_then(ScriptValue::as_f64).unwrap_or(0.0) as u32;
        let dpr = v
            .get("devicePixelRatio")
            .and_then(ScriptValue::as_f64)
            .filter(|d| *d > 0.0)
            .unwrap_or(1.0);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height, dpr })
    }

    /// Device-pixel size the capture should be cropped to.
    pub fn target_size(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.dpr) as u32,
            (self.height as f64 * self.dpr) as u32,
        )
    }
}

impl WebDriverClient {
    /// PNG capture cropped to the logical viewport.
    ///
    /// Measuring or cropping problems never fail the call; the full capture is
    /// returned instead. Only the capture itself can fail.
    pub fn take_screenshot(&self) -> Result<Vec<u8>> {
        self.active_session_id()?;

        let metrics = match self.execute_script(VIEWPORT_SCRIPT, &[]) {
            Ok(v) => ViewportMetrics::from_script_value(&v),
            Err(e) => {
                log::warn!("failed to measure viewport, using full screenshot: {}", e);
                return self.take_full_screenshot();
            }
        };
        let metrics = match metrics {
            Some(m) => m,
            None => {
                log::warn!("invalid viewport dimensions, using full screenshot");
                return self.take_full_screenshot();
            }
        };

        let full = self.take_full_screenshot()?;
        let (w, h) = metrics.target_size();
        log::debug!(
            "viewport {}x{} at dpr {:.1}, cropping to {}x{}",
            metrics.width,
            metrics.height,
            metrics.dpr,
            w,
            h
        );

        match crop_top_left(&full, w, h) {
            Ok(cropped) => Ok(cropped),
            Err(e) => {
                log::warn!("failed to crop screenshot, returning full capture: {}", e);
                Ok(full)
            }
        }
    }
}

/// Crop PNG bytes to `width`×`height` from the top-left corner, clamped to the
/// image bounds. A request covering the whole image returns the input as is.
pub fn crop_top_left(png: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(png).map_err(|e| Error::ImageDecode(e.to_string()))?;
    let (img_w, img_h) = img.dimensions();

    if width >= img_w && height >= img_h {
        return Ok(png.to_vec());
    }

    let cropped = img.crop_imm(0, 0, width.min(img_w), height.min(img_h));
    let mut out = Cursor::new(Vec::new());
    cropped
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::ImageEncode(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok, png, status, StubTransport};
    use crate::DriverConfig;
    use base64::Engine as _;
    use serde_json::{json, Map};

    fn session(stub: &StubTransport) -> WebDriverClient {
        stub.push(Ok(ok(json!({ "sessionId": "s1", "capabilities": {} }))));
        let c = WebDriverClient::with_transport(DriverConfig::default(), stub.clone());
        c.create_session(Map::new()).unwrap();
        c
    }

    fn encoded(bytes: &[u8]) -> serde_json::Value {
        json!(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    fn dims(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn metrics_parse() {
        let v = ScriptValue::from(json!({ "width": 800, "height": 600, "devicePixelRatio": 2 }));
        let m = ViewportMetrics::from_script_value(&v).unwrap();
        assert_eq!(m.target_size(), (1600, 1200));

        let no_dpr = ScriptValue::from(json!({ "width": 10.7, "height": 5 }));
        assert_eq!(
            ViewportMetrics::from_script_value(&no_dpr).unwrap().target_size(),
            (10, 5)
        );

        let zero = ScriptValue::from(json!({ "width": 0, "height": 600 }));
        assert!(ViewportMetrics::from_script_value(&zero).is_none());
        assert!(ViewportMetrics::from_script_value(&ScriptValue::Null).is_none());
    }

    #[test]
    fn crops_to_viewport_times_dpr() {
        let stub = StubTransport::new();
        let c = session(&stub);
        let full = png(40, 30, |_, _| [10, 20, 30, 255]);
        stub.push(Ok(ok(json!({ "width": 10, "height": 8, "devicePixelRatio": 2 }))));
        stub.push(Ok(ok(encoded(&full))));

        let shot = c.take_screenshot().unwrap();
        assert_eq!(dims(&shot), (20, 16));
    }

    #[test]
    fn crop_clamps_to_image_bounds() {
        let full = png(40, 30, |_, _| [0, 0, 0, 255]);
        assert_eq!(dims(&crop_top_left(&full, 100, 10).unwrap()), (40, 10));
        assert_eq!(crop_top_left(&full, 40, 30).unwrap(), full);
    }

    #[test]
    fn measurement_failure_returns_full_capture() {
        let stub = StubTransport::new();
        let c = session(&stub);
        let full = png(12, 9, |x, _| [x as u8, 0, 0, 255]);

        stub.push(Ok(status(500, json!({ "value": { "message": "boom" } }))));
        stub.push(Ok(ok(encoded(&full))));
        assert_eq!(c.take_screenshot().unwrap(), full);

        stub.push(Ok(ok(json!({ "width": 0, "height": 0 }))));
        stub.push(Ok(ok(encoded(&full))));
        assert_eq!(c.take_screenshot().unwrap(), full);
    }

    #[test]
    fn undecodable_capture_is_returned_uncropped() {
        let stub = StubTransport::new();
        let c = session(&stub);
        stub.push(Ok(ok(json!({ "width": 10, "height": 10 }))));
        stub.push(Ok(ok(encoded(b"not a png"))));
        assert_eq!(c.take_screenshot().unwrap(), b"not a png".to_vec());
    }

    #[test]
    fn capture_failure_propagates() {
        let stub = StubTransport::new();
        let c = session(&stub);
        stub.push(Ok(ok(json!({ "width": 10, "height": 10 }))));
        stub.push(Ok(ok(json!("%%%"))));
        assert!(matches!(c.take_screenshot(), Err(Error::Decode { .. })));
    }
}
