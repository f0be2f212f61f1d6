use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use opencv::core::Size;

use crate::{annotate::Overlay, cascade::DetectParams, session::SessionConfig};

#[derive(FromArgs, Debug)]
/// Haar cascade webcam detector. Press Q or ESC in the window to quit.
pub struct Args {
    /// cascade classifier XML (Haar or LBP)
    #[argh(option, default = "PathBuf::from(\"cascade_1.2.xml\")")]
    pub cascade: PathBuf,

    /// camera index (usually 0)
    #[argh(option, default = "0")]
    pub camera: i32,

    /// capture width (best-effort; may be overridden by the driver)
    #[argh(option)]
    pub width: Option<u32>,

    /// capture height (best-effort; may be overridden by the driver)
    #[argh(option)]
    pub height: Option<u32>,

    /// pyramid scale step, must be > 1.0 (default: 1.05)
    #[argh(option, default = "1.05")]
    pub scale_factor: f64,

    /// overlapping hits required to report a region (default: 25)
    #[argh(option, default = "25")]
    pub min_neighbors: i32,

    /// smallest region in pixels, `N` or `WxH` (default: 120)
    #[argh(option, default = "Size::new(120, 120)", from_str_fn(parse_size))]
    pub min_size: Size,

    /// largest region in pixels, `N` or `WxH` (default: unbounded)
    #[argh(option, default = "Size::new(0, 0)", from_str_fn(parse_size))]
    pub max_size: Size,

    /// width frames are scaled to before detection, 0 keeps native (default: 500)
    #[argh(option, default = "500")]
    pub resize_width: u32,

    /// label shown when something is detected
    #[argh(option, default = "String::from(\"GUN DETECTED!\")")]
    pub positive_label: String,

    /// label shown when nothing is detected
    #[argh(option, default = "String::from(\"NO GUN\")")]
    pub negative_label: String,

    /// window title
    #[argh(option, default = "String::from(\"Security Feed\")")]
    pub window: String,

    /// key poll wait per frame in ms (default: 1)
    #[argh(option, default = "1")]
    pub wait_ms: u64,

    /// wait after a missed frame in ms (default: 50)
    #[argh(option, default = "50")]
    pub retry_ms: u64,

    /// give up after this many consecutive missed frames, 0 never (default: 0)
    #[argh(option, default = "0")]
    pub max_missed: u32,
}

fn parse_size(value: &str) -> Result<Size, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<i32>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| format!("invalid size {value:?}: expected N or WxH"))
    };
    match value.split_once(['x', 'X']) {
        Some((w, h)) => Ok(Size::new(parse(w)?, parse(h)?)),
        None => {
            let n = parse(value)?;
            Ok(Size::new(n, n))
        }
    }
}

impl Args {
    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: self.min_size,
            max_size: self.max_size,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            overlay: Overlay {
                positive_label: self.positive_label.clone(),
                negative_label: self.negative_label.clone(),
                ..Overlay::default()
            },
            resize_width: self.resize_width,
            key_wait: Duration::from_millis(self.wait_ms.max(1)),
            retry_wait: Duration::from_millis(self.retry_ms.max(1)),
            max_missed: self.max_missed,
        }
    }
}
