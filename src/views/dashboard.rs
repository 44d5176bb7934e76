use crate::{
    models::{CategorizedQuestions, SummarizedEvaluation, User, UserInfo},
    services::{
        evaluation_service::{LIKERT_MAX, LIKERT_MIN},
        scoring::PeerAverages,
    },
    session::{Notice, SessionState},
};
use serde::Serialize;

pub const CHART_Y_MAX: f64 = 5.0;
pub const OVERALL_SERIES_LABEL: &str = "Overall Average";

const CLOSED_HEADLINE: &str = "Peer Evaluations are currently closed";
const CLOSED_MESSAGE: &str =
    "The system is not accepting new evaluations at this time. Please check back later.";
const COMPLETED_MESSAGE: &str =
    "All squad members evaluated. Your intel is crucial! Thanks for the solid debrief!";
const EVALUATE_INSTRUCTION: &str = "Please evaluate your peers. Click on a name to start.";
const NO_PEERS_INSTRUCTION: &str = "No peers available to evaluate at this moment. Stand by, Agent!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Login,
    Closed,
    Completed,
    Evaluating,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct PeerListItem {
    pub id: String,
    pub name: String,
    pub evaluated: bool,
    /// Opens the evaluation form when selected
    pub clickable: bool,
    pub stats_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct CategoryView {
    pub code: String,
    pub name: String,
    /// "A. Mechanics"
    pub header: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct EvaluationFormView {
    pub peer_id: String,
    pub peer_name: String,
    pub title: String,
    pub categories: Vec<CategoryView>,
    pub scale_min: i64,
    pub scale_max: i64,
    pub show_random_fill: bool,
}

impl EvaluationFormView {
    pub fn build(peer: &User, questions: &CategorizedQuestions, is_debug_mode: bool) -> Self {
        let peer_name = if peer.name.trim().is_empty() {
            "Unknown Peer".to_string()
        } else {
            peer.name.clone()
        };

        let categories = questions
            .categories
            .iter()
            .map(|group| CategoryView {
                code: group.category.code.clone(),
                name: group.category.display_name().to_string(),
                header: format!("{}. {}", group.category.code, group.category.display_name()),
                questions: group
                    .questions
                    .iter()
                    .map(|question| QuestionView {
                        id: question.code.clone(),
                        text: question.text.clone(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            peer_id: peer.id_hex(),
            title: format!("Evaluating: {}", peer_name),
            peer_name,
            categories,
            scale_min: LIKERT_MIN,
            scale_max: LIKERT_MAX,
            show_random_fill: is_debug_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SummaryRow {
    pub peer_name: String,
    /// One cell per header, same order
    pub values: Vec<String>,
    pub overall: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SummaryTable {
    pub title: String,
    pub category_headers: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

fn format_average(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => "-".to_string(),
    }
}

/// Category names across all summaries, in first-seen order.
fn unique_category_names<'a>(summaries: impl Iterator<Item = &'a SummarizedEvaluation>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for summary in summaries {
        for name in summary.category_averages.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

impl SummaryTable {
    pub fn build(summaries: &[SummarizedEvaluation]) -> Option<Self> {
        if summaries.is_empty() {
            return None;
        }

        let category_headers = unique_category_names(summaries.iter());
        let rows = summaries
            .iter()
            .map(|summary| SummaryRow {
                peer_name: if summary.evaluated_peer_name.is_empty() {
                    "N/A".to_string()
                } else {
                    summary.evaluated_peer_name.clone()
                },
                values: category_headers
                    .iter()
                    .map(|name| format_average(summary.category_averages.get(name).copied()))
                    .collect(),
                overall: format_average(Some(summary.overall_average)),
            })
            .collect();

        Some(Self {
            title: "Your Peer Evaluation Summary".to_string(),
            category_headers,
            rows,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Line,
    Bar,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ChartSeries {
    pub label: String,
    pub kind: SeriesKind,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
    pub y_max: f64,
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl ChartData {
    /// Bar series per category plus an overall line. Summaries without a peer
    /// name are left out.
    pub fn build(summaries: &[SummarizedEvaluation]) -> Option<Self> {
        let named: Vec<&SummarizedEvaluation> = summaries
            .iter()
            .filter(|summary| !summary.evaluated_peer_name.is_empty())
            .collect();
        if named.is_empty() {
            return None;
        }

        let labels: Vec<String> = named
            .iter()
            .map(|summary| summary.evaluated_peer_name.clone())
            .collect();

        let mut series = vec![ChartSeries {
            label: OVERALL_SERIES_LABEL.to_string(),
            kind: SeriesKind::Line,
            data: named
                .iter()
                .map(|summary| finite_or_zero(Some(summary.overall_average)))
                .collect(),
        }];

        for category in unique_category_names(named.iter().copied()) {
            let data = labels
                .iter()
                .map(|label| {
                    let first = named
                        .iter()
                        .find(|summary| &summary.evaluated_peer_name == label);
                    finite_or_zero(first.and_then(|s| s.category_averages.get(&category).copied()))
                })
                .collect();
            series.push(ChartSeries {
                label: category,
                kind: SeriesKind::Bar,
                data,
            });
        }

        Some(Self {
            labels,
            series,
            y_max: CHART_Y_MAX,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct CategoryStat {
    pub name: String,
    pub average: f64,
    /// "4.5 / 5.0"
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct PeerStatsView {
    pub peer_id: String,
    pub title: String,
    pub categories: Vec<CategoryStat>,
    pub empty_message: Option<String>,
    pub overall_average: f64,
    pub overall_display: String,
}

fn out_of_five(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1} / 5.0", value)
    } else {
        "0.0 / 5.0".to_string()
    }
}

impl PeerStatsView {
    pub fn build(peer_id: &str, averages: &PeerAverages) -> Self {
        let categories: Vec<CategoryStat> = averages
            .category_averages
            .values()
            .map(|category| CategoryStat {
                name: category.name.clone(),
                average: category.average,
                display: out_of_five(category.average),
            })
            .collect();

        Self {
            peer_id: peer_id.to_string(),
            title: "Evaluation Statistics".to_string(),
            empty_message: categories
                .is_empty()
                .then(|| "No category data available".to_string()),
            categories,
            overall_average: averages.overall_average,
            overall_display: out_of_five(averages.overall_average),
        }
    }
}

/// Everything the main screen shows for one session.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct DashboardView {
    pub screen: Screen,
    pub user: Option<UserInfo>,
    pub is_evaluation_open: bool,
    pub is_debug_mode: bool,
    pub headline: Option<String>,
    pub message: Option<String>,
    pub instruction: Option<String>,
    pub can_re_evaluate: bool,
    pub peers: Vec<PeerListItem>,
    pub form: Option<EvaluationFormView>,
    pub summary: Option<SummaryTable>,
    pub chart: Option<ChartData>,
    pub notice: Option<Notice>,
}

impl DashboardView {
    pub fn login(is_evaluation_open: bool, notice: Option<Notice>) -> Self {
        Self {
            screen: Screen::Login,
            user: None,
            is_evaluation_open,
            is_debug_mode: false,
            headline: None,
            message: None,
            instruction: None,
            can_re_evaluate: false,
            peers: Vec::new(),
            form: None,
            summary: None,
            chart: None,
            notice,
        }
    }

    /// Picks the screen from the session state. `notice` is shown once.
    pub fn build(state: &SessionState, notice: Option<Notice>) -> Self {
        let user = match state.current_user() {
            Some(user) => user,
            None => return Self::login(state.is_evaluation_open(), notice),
        };

        let mut view = Self::login(state.is_evaluation_open(), notice);
        view.user = Some(UserInfo::from(user));
        view.is_debug_mode = state.is_debug_mode();

        if !state.is_evaluation_open() {
            view.screen = Screen::Closed;
            view.headline = Some(CLOSED_HEADLINE.to_string());
            view.message = Some(CLOSED_MESSAGE.to_string());
            view.summary = SummaryTable::build(state.user_summaries());
            view.chart = ChartData::build(state.user_summaries());
            return view;
        }

        view.peers = peer_list(state);

        if state.all_evaluations_done() {
            let name = if user.name.trim().is_empty() { "Agent" } else { &user.name };
            view.screen = Screen::Completed;
            view.headline = Some(format!("Mission Accomplished, {}!", name));
            view.message = Some(COMPLETED_MESSAGE.to_string());
            view.can_re_evaluate = true;
            view.summary = SummaryTable::build(state.user_summaries());
            view.chart = ChartData::build(state.user_summaries());
            return view;
        }

        view.screen = Screen::Evaluating;
        view.headline = Some(format!("Welcome, {}! Ready to assess your squad?", user.name));
        view.instruction = Some(if state.peers_to_evaluate().is_empty() {
            NO_PEERS_INSTRUCTION.to_string()
        } else {
            EVALUATE_INSTRUCTION.to_string()
        });
        if !state.categorized_questions().is_empty() {
            view.form = state.pending_peer().map(|peer| {
                EvaluationFormView::build(peer, state.categorized_questions(), state.is_debug_mode())
            });
        }
        view
    }
}

pub fn peer_list(state: &SessionState) -> Vec<PeerListItem> {
    state
        .peers_to_evaluate()
        .iter()
        .map(|peer| {
            let id = peer.id_hex();
            let evaluated = state.has_evaluated(&id);
            PeerListItem {
                name: peer.display_name().to_string(),
                clickable: state.is_evaluation_open() && !evaluated,
                stats_available: evaluated,
                evaluated,
                id,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppSettings, Category, Question};
    use crate::services::scoring::CategoryAverage;
    use mongodb::bson::oid::ObjectId;
    use std::collections::BTreeMap;

    fn summary(peer: &str, categories: &[(&str, f64)], overall: f64) -> SummarizedEvaluation {
        SummarizedEvaluation {
            id: None,
            evaluator_id: "me".to_string(),
            evaluator_name: "Me".to_string(),
            evaluated_peer_id: format!("id-{}", peer),
            evaluated_peer_name: peer.to_string(),
            evaluation_period_id: "default".to_string(),
            category_averages: categories
                .iter()
                .map(|(name, avg)| (name.to_string(), *avg))
                .collect(),
            overall_average: overall,
            timestamp: None,
        }
    }

    fn user(name: &str) -> User {
        let mut user = User::new(name, name);
        user.id = Some(ObjectId::new());
        user
    }

    fn questions() -> CategorizedQuestions {
        CategorizedQuestions::organize(
            vec![Category::new("A", "Mechanics")],
            vec![Question::new("A1", "A", "Aim"), Question::new("A2", "A", "Movement")],
        )
    }

    #[test]
    fn test_summary_table_formats_and_fills_gaps() {
        let table = SummaryTable::build(&[
            summary("Bob", &[("Mechanics", 4.0)], 4.0),
            summary("Carol", &[("Game Sense", 3.333)], 3.333),
        ])
        .unwrap();

        assert_eq!(table.category_headers, vec!["Mechanics", "Game Sense"]);
        assert_eq!(table.rows[0].values, vec!["4.00", "-"]);
        assert_eq!(table.rows[1].values, vec!["-", "3.33"]);
        assert_eq!(table.rows[1].overall, "3.33");
        assert!(SummaryTable::build(&[]).is_none());
    }

    #[test]
    fn test_chart_zero_fills_missing_and_non_finite() {
        let chart = ChartData::build(&[
            summary("Bob", &[("Mechanics", 4.5)], f64::NAN),
            summary("Carol", &[("Teamwork", 2.0)], 2.0),
            summary("", &[("Ignored", 1.0)], 1.0),
        ])
        .unwrap();

        assert_eq!(chart.labels, vec!["Bob", "Carol"]);
        assert_eq!(chart.y_max, 5.0);
        assert_eq!(chart.series[0].label, OVERALL_SERIES_LABEL);
        assert_eq!(chart.series[0].data, vec![0.0, 2.0]);
        assert_eq!(chart.series[1].label, "Mechanics");
        assert_eq!(chart.series[1].data, vec![4.5, 0.0]);
        assert_eq!(chart.series[2].data, vec![0.0, 2.0]);
        assert_eq!(chart.series.len(), 3);
    }

    #[test]
    fn test_form_view_lists_categories_and_scale() {
        let mut peer = user("");
        peer.name.clear();
        let form = EvaluationFormView::build(&peer, &questions(), true);

        assert_eq!(form.title, "Evaluating: Unknown Peer");
        assert_eq!(form.categories[0].header, "A. Mechanics");
        assert_eq!(form.categories[0].questions.len(), 2);
        assert_eq!((form.scale_min, form.scale_max), (1, 5));
        assert!(form.show_random_fill);
    }

    #[test]
    fn test_peer_stats_view() {
        let mut averages = PeerAverages::default();
        let empty = PeerStatsView::build("p", &averages);
        assert_eq!(empty.empty_message.as_deref(), Some("No category data available"));
        assert_eq!(empty.overall_display, "0.0 / 5.0");

        averages.category_averages = BTreeMap::from([(
            "A".to_string(),
            CategoryAverage {
                name: "Mechanics".to_string(),
                average: 4.3,
                count: 4,
            },
        )]);
        averages.overall_average = 4.3;
        let stats = PeerStatsView::build("p", &averages);
        assert_eq!(stats.categories[0].display, "4.3 / 5.0");
        assert!(stats.empty_message.is_none());
    }

    #[test]
    fn test_screens_follow_state() {
        let mut state = SessionState::new(&AppSettings::fallback());
        assert_eq!(DashboardView::build(&state, None).screen, Screen::Login);

        state.set_current_user(Some(user("Alice")));
        let view = DashboardView::build(&state, None);
        assert_eq!(view.screen, Screen::Evaluating);
        assert_eq!(view.instruction.as_deref(), Some(NO_PEERS_INSTRUCTION));

        let bob = user("");
        let bob_id = bob.id_hex();
        state.set_peers_to_evaluate(vec![bob.clone(), user("Carol")]);
        state.set_categorized_questions(questions());
        state.set_pending_peer(Some(bob));
        let view = DashboardView::build(&state, None);
        assert_eq!(view.instruction.as_deref(), Some(EVALUATE_INSTRUCTION));
        assert_eq!(view.peers[0].name, "Unnamed Peer");
        assert!(view.peers[0].clickable);
        assert!(view.form.is_some());

        state.add_evaluated_peer_id(bob_id);
        state.set_all_evaluations_done(true);
        let view = DashboardView::build(&state, None);
        assert_eq!(view.screen, Screen::Completed);
        assert_eq!(view.headline.as_deref(), Some("Mission Accomplished, Alice!"));
        assert!(view.can_re_evaluate);
        assert!(view.peers[0].evaluated && !view.peers[0].clickable);
        assert!(view.peers[0].stats_available);

        state.set_is_evaluation_open(false);
        state.set_user_summaries(vec![summary("Bob", &[("Mechanics", 4.0)], 4.0)]);
        let view = DashboardView::build(&state, None);
        assert_eq!(view.screen, Screen::Closed);
        assert!(view.summary.is_some());
        assert!(view.peers.is_empty());
    }

    #[test]
    fn test_dashboard_is_stable_for_same_state() {
        let mut state = SessionState::new(&AppSettings::fallback());
        state.set_current_user(Some(user("Alice")));
        state.set_peers_to_evaluate(vec![user("Bob")]);

        let first = DashboardView::build(&state, None);
        assert_eq!(first, DashboardView::build(&state, None));
        assert_eq!(first.user.as_ref().map(|u| u.name.as_str()), Some("Alice"));

        state.set_current_user(Some(user("Carol")));
        assert_ne!(first, DashboardView::build(&state, None));
    }
}
