/// Lifecycle state of a [`LoadController`](super::LoadController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Running,
    Stopped,
    Completed,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Running => "running",
            LoadState::Stopped => "stopped",
            LoadState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
