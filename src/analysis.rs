use crate::{
    detection::{Detection, PredictResponse, Predictor},
    intake::SelectedImage,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

pub const HEALTHY_LABEL: &str = "Healthy Plant";
pub const INCOMPLETE_LABEL: &str = "Analysis Incomplete";
pub const CONNECTION_ERROR_LABEL: &str = "Connection Error";

/// Ordered: the first key found in the headline label wins.
pub const TREATMENTS: [(&str, &str); 5] = [
    (
        "blight",
        "Apply a copper-based fungicide and remove infected leaves promptly.",
    ),
    (
        "rust",
        "Apply a sulfur-based fungicide and improve air circulation around the plant.",
    ),
    (
        "spot",
        "Remove spotted leaves and apply a broad-spectrum fungicide; avoid overhead watering.",
    ),
    (
        "mildew",
        "Treat with neem oil or potassium bicarbonate and reduce humidity.",
    ),
    (
        "wilt",
        "Remove and destroy infected plants; disinfect tools and avoid overwatering.",
    ),
];
pub const GENERIC_TREATMENT: &str =
    "Consult a plant disease specialist for an accurate treatment plan.";
pub const NO_TREATMENT: &str = "No treatment needed. Continue regular care and monitoring.";

const NON_DISEASE_MARKERS: [&str; 2] = ["healthy", "background"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Moderate,
    Low,
    None,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Moderate => "Moderate",
            Severity::Low => "Low",
            Severity::None => "None",
            Severity::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Diseased,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub disease: String,
    /// Percentage with one decimal, e.g. "91.0".
    pub confidence: String,
    pub severity: Severity,
    pub treatment: String,
    pub description: String,
    pub health: HealthStatus,
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub annotated_image: Option<String>,
}

impl AnalysisResult {
    pub fn incomplete() -> Self {
        Self::placeholder(
            INCOMPLETE_LABEL,
            "The model returned no detections for this image. Try a clearer, well-lit photo focused on a single leaf.",
        )
    }

    pub fn connection_error() -> Self {
        Self::placeholder(
            CONNECTION_ERROR_LABEL,
            "Could not reach the prediction service. Make sure it is running and try again.",
        )
    }

    fn placeholder(label: &str, description: &str) -> Self {
        Self {
            disease: label.to_string(),
            confidence: format_confidence(0.0),
            severity: Severity::NotApplicable,
            treatment: GENERIC_TREATMENT.to_string(),
            description: description.to_string(),
            health: HealthStatus::Unknown,
            detections: Vec::new(),
            annotated_image: None,
        }
    }

    pub fn is_healthy(&self) -> Option<bool> {
        match self.health {
            HealthStatus::Healthy => Some(true),
            HealthStatus::Diseased => Some(false),
            HealthStatus::Unknown => None,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        self.health == HealthStatus::Unknown && self.disease == CONNECTION_ERROR_LABEL
    }
}

/// True unless the label names a healthy leaf or background.
pub fn is_disease_evidence(label: &str) -> bool {
    let l = label.to_lowercase();
    !NON_DISEASE_MARKERS.iter().any(|m| l.contains(m))
}

/// Highest confidence over every detection, healthy ones included. The
/// earliest detection wins a tie.
pub fn headline(detections: &[Detection]) -> Option<&Detection> {
    strongest(detections)
}

/// Strongest detection that counts as disease evidence.
pub fn strongest_evidence(detections: &[Detection]) -> Option<&Detection> {
    strongest(detections.iter().filter(|d| is_disease_evidence(&d.class_name)))
}

fn strongest<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> Option<&'a Detection> {
    let mut best: Option<&Detection> = None;
    for d in detections {
        match best {
            Some(b) if d.confidence <= b.confidence => {}
            _ => best = Some(d),
        }
    }
    best
}

pub fn severity_for(confidence: f64) -> Severity {
    if confidence > 0.8 {
        Severity::High
    } else if confidence > 0.6 {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

pub fn treatment_for(label: &str) -> &'static str {
    let l = label.to_lowercase();
    TREATMENTS
        .iter()
        .find(|(key, _)| l.contains(key))
        .map(|(_, text)| *text)
        .unwrap_or(GENERIC_TREATMENT)
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}", confidence * 100.0)
}

pub fn map_response(resp: PredictResponse) -> AnalysisResult {
    let detections = resp.predictions.unwrap_or_default();
    let Some(top) = headline(&detections).cloned() else {
        return AnalysisResult::incomplete();
    };

    let evidence = strongest_evidence(&detections).map(|d| d.confidence);
    let confidence = format_confidence(top.confidence);

    // Severity follows the strongest disease evidence, not the headline.
    let (disease, severity, treatment, description, health) = if let Some(evidence) = evidence {
        let description = format!(
            "Detected {} with {}% confidence across {} finding(s).",
            top.class_name,
            confidence,
            detections.len()
        );
        (
            top.class_name.clone(),
            severity_for(evidence),
            treatment_for(&top.class_name).to_string(),
            description,
            HealthStatus::Diseased,
        )
    } else {
        (
            HEALTHY_LABEL.to_string(),
            Severity::None,
            NO_TREATMENT.to_string(),
            "No signs of disease were detected. The plant appears healthy.".to_string(),
            HealthStatus::Healthy,
        )
    };

    AnalysisResult {
        disease,
        confidence,
        severity,
        treatment,
        description,
        health,
        detections,
        annotated_image: resp.annotated_image.filter(|s| !s.is_empty()),
    }
}

/// Submits `image` and maps the reply. Failures are logged and become the
/// connection-error placeholder; this never returns an error.
pub fn analyze(predictor: &dyn Predictor, image: &SelectedImage) -> AnalysisResult {
    info!("analyzing {} via {}", image.file_name, predictor.endpoint());
    match predictor.predict(image) {
        Ok(resp) => {
            let result = map_response(resp);
            if result.detections.is_empty() {
                warn!("no detections returned for {}", image.file_name);
            } else {
                info!(
                    "{}: {} ({}%, severity {})",
                    image.file_name, result.disease, result.confidence, result.severity
                );
            }
            result
        }
        Err(err) => {
            error!("prediction failed for {}: {:#}", image.file_name, err);
            AnalysisResult::connection_error()
        }
    }
}
