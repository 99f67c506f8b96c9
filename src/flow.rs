//! Машина состояний оплаты: тариф → ник TradingView → хэш → подтверждение.
//!
//! Переходы чистые: `advance` получает состояние и ввод и возвращает новое
//! состояние вместе с шагом, который обработчик бота должен показать
//! пользователю. Черновик (`Draft`) живёт внутри состояния диалога.

use crate::plans::Catalog;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub plan_id: Option<String>,
    pub amount: Option<f64>,
    pub days: Option<i64>,
    pub external_username: Option<String>,
    pub tx_hash: Option<String>,
}

/// Всё, что нужно для записи платежа.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub plan_id: Option<String>,
    pub amount: f64,
    pub days: i64,
    pub external_username: String,
    pub tx_hash: String,
}

impl Draft {
    pub fn submission(&self) -> Option<Submission> {
        Some(Submission {
            plan_id: self.plan_id.clone(),
            amount: self.amount?,
            days: self.days.filter(|days| *days > 0)?,
            external_username: self.external_username.clone().filter(|s| !s.is_empty())?,
            tx_hash: self.tx_hash.clone().filter(|s| !s.is_empty())?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ConversationState {
    #[default]
    Idle,
    PlanSelection(Draft),
    UsernameEntry(Draft),
    HashEntry(Draft),
    Confirmation(Draft),
}

impl ConversationState {
    pub fn draft(&self) -> Option<&Draft> {
        match self {
            ConversationState::Idle => None,
            ConversationState::PlanSelection(draft)
            | ConversationState::UsernameEntry(draft)
            | ConversationState::HashEntry(draft)
            | ConversationState::Confirmation(draft) => Some(draft),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Begin,
    PickPlan(String),
    Text(String),
    Paid,
    Confirm,
    Edit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    PromptPlan,
    RejectPlan,
    PromptUsername,
    RepromptUsername,
    ShowPaymentInstructions { amount: f64 },
    PromptHash,
    RepromptHash,
    ShowConfirmation(Draft),
    Submit(Submission),
    /// В черновике не хватает данных (например, после рестарта процесса).
    Abort,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: ConversationState,
    pub step: Step,
}

impl Transition {
    fn to(next: ConversationState, step: Step) -> Self {
        Self { next, step }
    }
}

pub fn advance(state: ConversationState, input: Input, catalog: &Catalog) -> Transition {
    use ConversationState as S;

    match (state, input) {
        (state, Input::Begin) => {
            let draft = state.draft().cloned().unwrap_or_default();
            Transition::to(S::PlanSelection(draft), Step::PromptPlan)
        }
        (S::PlanSelection(mut draft), Input::PickPlan(plan_id)) => match catalog.get(&plan_id) {
            Some(plan) => {
                draft.plan_id = Some(plan.id.clone());
                draft.amount = Some(plan.price);
                draft.days = Some(plan.days);
                Transition::to(S::UsernameEntry(draft), Step::PromptUsername)
            }
            None => Transition::to(S::PlanSelection(draft), Step::RejectPlan),
        },
        (S::UsernameEntry(mut draft), Input::Text(text)) => {
            let username = text.trim();
            if username.is_empty() {
                return Transition::to(S::UsernameEntry(draft), Step::RepromptUsername);
            }
            draft.external_username = Some(username.to_string());
            match draft.amount {
                Some(amount) => Transition::to(
                    S::HashEntry(draft),
                    Step::ShowPaymentInstructions { amount },
                ),
                None => Transition::to(S::Idle, Step::Abort),
            }
        }
        (S::HashEntry(draft), Input::Paid) => Transition::to(S::HashEntry(draft), Step::PromptHash),
        (S::HashEntry(mut draft), Input::Text(text)) => {
            let hash = text.trim();
            if hash.is_empty() {
                return Transition::to(S::HashEntry(draft), Step::RepromptHash);
            }
            draft.tx_hash = Some(hash.to_string());
            Transition::to(
                S::Confirmation(draft.clone()),
                Step::ShowConfirmation(draft),
            )
        }
        (S::Confirmation(draft), Input::Edit) => {
            Transition::to(S::PlanSelection(draft), Step::PromptPlan)
        }
        (S::Confirmation(draft), Input::Confirm) => match draft.submission() {
            Some(submission) => Transition::to(S::Idle, Step::Submit(submission)),
            None => Transition::to(S::Idle, Step::Abort),
        },
        // Подтверждение без черновика: диалог потерян, например, после рестарта.
        (S::Idle, Input::Confirm) => Transition::to(S::Idle, Step::Abort),
        (state, _) => Transition::to(state, Step::Ignored),
    }
}
