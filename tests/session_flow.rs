use anyhow::{Result, anyhow};
use leaf_check::{
    analysis::{AnalysisResult, Severity},
    detection::{Detection, PredictResponse, Predictor, ServiceHealth},
    intake::SelectedImage,
    session::Session,
};
use std::cell::Cell;

struct Stub {
    reply: Option<PredictResponse>,
    calls: Cell<u32>,
}

impl Stub {
    fn ok(dets: &[(&str, f64)]) -> Self {
        Self {
            reply: Some(PredictResponse {
                predictions: Some(dets.iter().map(|(l, c)| Detection::new(l, *c)).collect()),
                annotated_image: Some("data:image/png;base64,AAAA".into()),
            }),
            calls: Cell::new(0),
        }
    }

    fn down() -> Self {
        Self {
            reply: None,
            calls: Cell::new(0),
        }
    }
}

impl Predictor for Stub {
    fn endpoint(&self) -> String {
        "stub://predict".into()
    }

    fn health(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth { status: "ok".into() })
    }

    fn predict(&self, _image: &SelectedImage) -> Result<PredictResponse> {
        self.calls.set(self.calls.get() + 1);
        self.reply.clone().ok_or_else(|| anyhow!("connection refused"))
    }
}

fn leaf(name: &str) -> SelectedImage {
    SelectedImage::from_bytes(name, vec![1, 2, 3])
}

#[test]
fn analyze_without_image_is_noop() {
    let stub = Stub::ok(&[("Early_Blight", 0.9)]);
    let mut s = Session::new();
    assert!(s.analyze(&stub).is_none());
    assert_eq!(stub.calls.get(), 0);
    assert_eq!(s.phase(), "idle");
}

#[test]
fn select_then_analyze_reaches_result_ready() {
    let stub = Stub::ok(&[("Early_Blight", 0.9)]);
    let mut s = Session::new();
    assert!(s.select(leaf("a.jpg")));
    assert_eq!(s.phase(), "previewing");

    let r = s.analyze(&stub).unwrap();
    assert_eq!(r.disease, "Early_Blight");
    assert_eq!(r.severity, Severity::High);
    assert_eq!(r.annotated_image.as_deref(), Some("data:image/png;base64,AAAA"));
    assert_eq!(s.phase(), "result_ready");
    assert!(!s.is_busy());
    assert_eq!(stub.calls.get(), 1);
}

#[test]
fn new_selection_clears_previous_result() {
    let stub = Stub::ok(&[("Tomato_Healthy", 0.95)]);
    let mut s = Session::new();
    s.select(leaf("a.jpg"));
    s.analyze(&stub);
    assert!(s.result().is_some());

    s.select(leaf("b.jpg"));
    assert!(s.result().is_none());
    assert_eq!(s.image().unwrap().file_name, "b.jpg");

    assert!(s.clear());
    assert!(s.image().is_none());
    assert_eq!(s.phase(), "idle");
}

#[test]
fn transport_failure_lands_in_failed_state() {
    let stub = Stub::down();
    let mut s = Session::new();
    s.select(leaf("a.jpg"));
    let r = s.analyze(&stub).unwrap();
    assert_eq!(r.disease, "Connection Error");
    assert_eq!(r.confidence, "0.0");
    assert_eq!(r.severity, Severity::NotApplicable);
    assert_eq!(s.phase(), "failed");

    // A retry is an explicit re-invocation on the same image.
    s.analyze(&stub);
    assert_eq!(stub.calls.get(), 2);
    assert_eq!(s.image().unwrap().file_name, "a.jpg");
}

#[test]
fn empty_detections_are_a_result_not_a_failure() {
    let stub = Stub::ok(&[]);
    let mut s = Session::new();
    s.select(leaf("a.jpg"));
    assert_eq!(s.analyze(&stub).unwrap().disease, "Analysis Incomplete");
    assert_eq!(s.phase(), "result_ready");
}

#[test]
fn busy_session_rejects_reentry_and_new_selection() {
    let stub = Stub::ok(&[("Leaf_Rust", 0.7)]);
    let mut s = Session::new();
    s.select(leaf("a.jpg"));

    assert_eq!(s.begin_analysis().unwrap().file_name, "a.jpg");
    assert!(s.is_busy());
    assert_eq!(s.phase(), "analyzing");
    assert!(s.result().is_none());

    assert!(s.begin_analysis().is_none());
    assert!(s.analyze(&stub).is_none());
    assert_eq!(stub.calls.get(), 0);
    assert!(!s.select(leaf("b.jpg")));
    assert!(!s.clear());
    assert_eq!(s.image().unwrap().file_name, "a.jpg");

    let reply = stub.predict(s.image().unwrap()).unwrap();
    let r = s.finish_analysis(leaf_check::analysis::map_response(reply)).unwrap();
    assert_eq!(r.disease, "Leaf_Rust");
    assert_eq!(s.phase(), "result_ready");
    assert!(s.select(leaf("b.jpg")));
}

#[test]
fn finish_without_begin_is_ignored() {
    let mut s = Session::new();
    s.select(leaf("a.jpg"));
    assert!(s.finish_analysis(AnalysisResult::connection_error()).is_none());
    assert_eq!(s.phase(), "previewing");
}
