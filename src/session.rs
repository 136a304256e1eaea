use crate::{
    analysis::{self, AnalysisResult},
    detection::Predictor,
    intake::SelectedImage,
};
use tracing::{debug, warn};

/// Everything the upload view shows, as one value. A result only ever
/// exists next to the image it was computed for.
#[derive(Debug, Default)]
pub enum State {
    #[default]
    Idle,
    Previewing {
        image: SelectedImage,
    },
    Analyzing {
        image: SelectedImage,
    },
    ResultReady {
        image: SelectedImage,
        result: AnalysisResult,
    },
    Failed {
        image: SelectedImage,
        result: AnalysisResult,
    },
}

impl State {
    pub fn phase(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Previewing { .. } => "previewing",
            State::Analyzing { .. } => "analyzing",
            State::ResultReady { .. } => "result_ready",
            State::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    state: State,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn phase(&self) -> &'static str {
        self.state.phase()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, State::Analyzing { .. })
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        match &self.state {
            State::Idle => None,
            State::Previewing { image }
            | State::Analyzing { image }
            | State::ResultReady { image, .. }
            | State::Failed { image, .. } => Some(image),
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            State::ResultReady { result, .. } | State::Failed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Replaces the held image and drops any previous result. Refused while
    /// an analysis is outstanding.
    pub fn select(&mut self, image: SelectedImage) -> bool {
        if self.is_busy() {
            warn!("selection ignored: analysis in progress");
            return false;
        }
        debug!("{} -> previewing ({})", self.phase(), image.file_name);
        self.state = State::Previewing { image };
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.is_busy() {
            warn!("clear ignored: analysis in progress");
            return false;
        }
        self.state = State::Idle;
        true
    }

    /// Moves the held image into `Analyzing` and hands it out for
    /// submission. `None` when no image is held or an analysis is already
    /// outstanding.
    pub fn begin_analysis(&mut self) -> Option<&SelectedImage> {
        let from = self.phase();
        let image = match std::mem::take(&mut self.state) {
            State::Idle => return None,
            busy @ State::Analyzing { .. } => {
                warn!("analysis already in progress");
                self.state = busy;
                return None;
            }
            State::Previewing { image }
            | State::ResultReady { image, .. }
            | State::Failed { image, .. } => image,
        };
        debug!("{} -> analyzing ({})", from, image.file_name);
        self.state = State::Analyzing { image };
        self.image()
    }

    /// Stores the result of the outstanding analysis. A connection error
    /// lands in `Failed`, anything else in `ResultReady`. Ignored (`None`)
    /// when nothing is being analyzed.
    pub fn finish_analysis(&mut self, result: AnalysisResult) -> Option<&AnalysisResult> {
        let image = match std::mem::take(&mut self.state) {
            State::Analyzing { image } => image,
            other => {
                warn!("no analysis outstanding; result dropped");
                self.state = other;
                return None;
            }
        };
        self.state = if result.is_connection_error() {
            State::Failed { image, result }
        } else {
            State::ResultReady { image, result }
        };
        debug!("analysis finished -> {}", self.phase());
        self.result()
    }

    /// Runs one analysis of the held image to completion. Returns `None`
    /// without contacting the service when no image is held or one is
    /// already being analyzed.
    pub fn analyze(&mut self, predictor: &dyn Predictor) -> Option<&AnalysisResult> {
        let result = analysis::analyze(predictor, self.begin_analysis()?);
        self.finish_analysis(result)
    }
}
