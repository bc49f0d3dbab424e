/// The pipeline stage a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Loading,
    Cleaning,
    Fitting,
    Plotting,
    Reporting,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::Cleaning => "Removing outliers",
            Self::Fitting => "Fitting",
            Self::Plotting => "Plotting",
            Self::Reporting => "Writing report",
        }
    }
}

/// Progress message sent from the processing thread(s) to whoever draws the progress bar
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub completed: usize,
    pub total: usize,
    pub worker_id: usize,
    pub stage: Stage,
}

impl WorkerStatus {
    pub fn new(completed: usize, total: usize, worker_id: usize, stage: Stage) -> Self {
        let progress = if total == 0 {
            1.0
        } else {
            completed as f32 / total as f32
        };
        Self {
            progress,
            completed,
            total,
            worker_id,
            stage,
        }
    }
}
