use chrono::NaiveDate;
use metrics_parser::{MetricsPreview, MetricsTextParser};
use models::{DashboardView, MetricRecord, ReportingPeriod, Role};
use serde::{Deserialize, Serialize};

use crate::window::ReportingWindow;

/// Everything the dashboard screen needs to render, independent of any
/// rendering toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    pub role: Option<Role>,
    pub selected_client: Option<String>,
    pub view: DashboardView,
    pub reference_period: ReportingPeriod,
    pub selected_period: Option<ReportingPeriod>,
    pub show_client_card: bool,
    pub draft_text: String,
    pub preview: Option<MetricsPreview>,
    pub max_input_chars: usize,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardAction {
    /// A client session is bound to its own client record.
    SignedIn {
        role: Role,
        client_id: Option<String>,
    },
    SignedOut,
    SelectClient {
        client_id: String,
    },
    SetView {
        view: DashboardView,
    },
    SelectPeriod {
        period: Option<ReportingPeriod>,
    },
    ToggleClientCard,
    EditDraft {
        text: String,
    },
    ParseDraft {
        today: NaiveDate,
    },
    ConfirmPreview,
    DiscardPreview,
}

/// Side effects the host must perform after a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    FetchMetrics {
        client_id: String,
        window: ReportingWindow,
    },
    PersistMetric {
        record: MetricRecord,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: DashboardState,
    pub effect: Option<Effect>,
}

impl DashboardState {
    pub fn new(reference_period: ReportingPeriod, max_input_chars: usize) -> Self {
        Self {
            role: None,
            selected_client: None,
            view: DashboardView::default(),
            reference_period,
            selected_period: None,
            show_client_card: false,
            draft_text: String::new(),
            preview: None,
            max_input_chars,
            last_error: None,
        }
    }

    pub fn window(&self) -> ReportingWindow {
        ReportingWindow::resolve(self.view, self.reference_period, self.selected_period)
    }

    fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    fn fetch(&self) -> Option<Effect> {
        self.selected_client.as_ref().map(|client_id| Effect::FetchMetrics {
            client_id: client_id.clone(),
            window: self.window(),
        })
    }
}

fn refuse(mut state: DashboardState, message: &str) -> Transition {
    tracing::warn!(role = ?state.role, "{}", message);
    state.last_error = Some(message.to_string());
    Transition {
        state,
        effect: None,
    }
}

fn settle(state: DashboardState, effect: Option<Effect>) -> Transition {
    Transition { state, effect }
}

/// Applies `action` to `state`. Performs no I/O: data loading and persistence
/// are returned as an [`Effect`] for the caller to run.
pub fn reduce(state: DashboardState, action: DashboardAction) -> Transition {
    let mut state = state;
    match action {
        DashboardAction::SignedIn { role, client_id } => {
            let fresh = DashboardState::new(state.reference_period, state.max_input_chars);
            state = DashboardState {
                role: Some(role),
                selected_client: client_id,
                view: state.view,
                ..fresh
            };
            let effect = state.fetch();
            settle(state, effect)
        }
        DashboardAction::SignedOut => settle(
            DashboardState::new(state.reference_period, state.max_input_chars),
            None,
        ),
        DashboardAction::SelectClient { client_id } => {
            if !state.is_admin() {
                return refuse(state, "only administrators can switch clients");
            }
            state.selected_client = Some(client_id);
            state.preview = None;
            state.draft_text.clear();
            state.last_error = None;
            let effect = state.fetch();
            settle(state, effect)
        }
        DashboardAction::SetView { view } => {
            state.view = view;
            if view.is_multi_period() {
                state.selected_period = None;
            }
            let effect = state.fetch();
            settle(state, effect)
        }
        DashboardAction::SelectPeriod { period } => {
            state.selected_period = period;
            let effect = if state.view == DashboardView::Month {
                state.fetch()
            } else {
                None
            };
            settle(state, effect)
        }
        DashboardAction::ToggleClientCard => {
            state.show_client_card = !state.show_client_card;
            settle(state, None)
        }
        DashboardAction::EditDraft { text } => {
            state.draft_text = text;
            settle(state, None)
        }
        DashboardAction::ParseDraft { today } => {
            if !state.is_admin() {
                return refuse(state, "only administrators can enter metrics");
            }
            let Some(client_id) = state.selected_client.clone() else {
                return refuse(state, "select a client first");
            };
            let period = state.selected_period.unwrap_or(state.reference_period);
            let parser = MetricsTextParser::new(state.max_input_chars);
            match parser.parse_for_review(&state.draft_text, &client_id, period, today) {
                Ok(preview) => {
                    state.preview = Some(preview);
                    state.last_error = None;
                    settle(state, None)
                }
                Err(e) => {
                    state.preview = None;
                    refuse(state, &e.to_string())
                }
            }
        }
        DashboardAction::ConfirmPreview => {
            if !state.is_admin() {
                return refuse(state, "only administrators can enter metrics");
            }
            let Some(preview) = state.preview.take() else {
                return refuse(state, "nothing to confirm");
            };
            if let Err(e) = preview.record.validate() {
                let message = e.to_string();
                state.preview = Some(preview);
                return refuse(state, &message);
            }
            state.draft_text.clear();
            state.last_error = None;
            settle(
                state,
                Some(Effect::PersistMetric {
                    record: preview.record,
                }),
            )
        }
        DashboardAction::DiscardPreview => {
            state.preview = None;
            settle(state, None)
        }
    }
}
