use serde::{Deserialize, Serialize};

/// Axis-aligned box in source-image pixels. `min <= max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn from_corners(ax: f64, ay: f64, bx: f64, by: f64) -> Self {
        Self {
            min_x: ax.min(bx),
            min_y: ay.min(by),
            max_x: ax.max(bx),
            max_y: ay.max(by),
        }
    }

    fn from_slice(v: &[f64]) -> Option<Self> {
        match v {
            [a, b, c, d] => Some(Self::from_corners(*a, *b, *c, *d)),
            _ => None,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// One finding reported by the prediction service.
///
/// Deserialization accepts every box layout the service has used
/// (`xmin..ymax`, `x1..y2`, `bbox: [..]`, `box: [..]`) and keeps only the
/// canonical [`BoundingBox`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDetection")]
pub struct Detection {
    pub class_name: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<i64>,
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(class_name: &str, confidence: f64) -> Self {
        Self {
            class_name: class_name.to_string(),
            confidence,
            class_id: None,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(default)]
    class_name: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    class_id: Option<i64>,
    xmin: Option<f64>,
    ymin: Option<f64>,
    xmax: Option<f64>,
    ymax: Option<f64>,
    x1: Option<f64>,
    y1: Option<f64>,
    x2: Option<f64>,
    y2: Option<f64>,
    #[serde(default)]
    bbox: Option<RawBox>,
    #[serde(default, rename = "box")]
    box_: Option<RawBox>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBox {
    List(Vec<f64>),
    Canonical(BoundingBox),
}

impl RawBox {
    fn normalize(&self) -> Option<BoundingBox> {
        match self {
            RawBox::List(v) => BoundingBox::from_slice(v),
            RawBox::Canonical(b) => Some(BoundingBox::from_corners(
                b.min_x, b.min_y, b.max_x, b.max_y,
            )),
        }
    }
}

impl RawDetection {
    fn normalize_box(&self) -> Option<BoundingBox> {
        if let (Some(a), Some(b), Some(c), Some(d)) = (self.xmin, self.ymin, self.xmax, self.ymax)
        {
            return Some(BoundingBox::from_corners(a, b, c, d));
        }
        if let (Some(a), Some(b), Some(c), Some(d)) = (self.x1, self.y1, self.x2, self.y2) {
            return Some(BoundingBox::from_corners(a, b, c, d));
        }
        self.bbox
            .as_ref()
            .and_then(RawBox::normalize)
            .or_else(|| self.box_.as_ref().and_then(RawBox::normalize))
    }
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        let bbox = raw.normalize_box();
        Self {
            class_name: raw.class_name,
            confidence: raw.confidence,
            class_id: raw.class_id,
            bbox,
        }
    }
}

/// Body of a `POST /predict` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Option<Vec<Detection>>,
    /// Pre-rendered overlay: a data URL or a remote URL.
    #[serde(default)]
    pub annotated_image: Option<String>,
}

/// Body of a `GET /health` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
}

impl ServiceHealth {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
