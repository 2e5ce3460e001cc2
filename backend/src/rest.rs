//! Thin REST glue over the domain services.
//!
//! Handlers validate nothing themselves; they map wire DTOs to domain
//! commands, call one service method and translate the result. All business
//! rules live in `domain`.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    AddParentRequest, CategoryDto, CategoryRequest, ChildSummary, CreateChildRequest,
    CreateTransactionRequest, CreateTransactionResponse, ErrorResponse, PaymentRequestDto,
    RequestPaymentRequest, SavingsGoalDto, SendOtpRequest, SendOtpResponse, SetRequestStatusRequest,
    TaskDto, TaskRequest, TransactionDto, UpdateAllowanceRequest, UpdateSavingsGoalRequest,
    VerifyOtpRequest, VerifyOtpResponse,
};
use tracing::info;

use crate::domain::commands::allowance::UpdateAllowanceCommand;
use crate::domain::commands::children::AddChildCommand;
use crate::domain::commands::tasks::{RequestPaymentCommand, UpsertTaskCommand};
use crate::domain::commands::transactions::ApplyTransactionCommand;
use crate::domain::models::{
    Category, Child, PaymentRequest, PaymentRequestStatus, SavingsGoal, Task, Transaction,
    TransactionType,
};
use crate::domain::{AuthService, DomainError, FamilyService, LedgerService, TaskService};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub families: FamilyService,
    pub ledger: LedgerService,
    pub tasks: TaskService,
}

impl AppState {
    pub fn new(
        auth: AuthService,
        families: FamilyService,
        ledger: LedgerService,
        tasks: TaskService,
    ) -> Self {
        Self {
            auth,
            families,
            ledger,
            tasks,
        }
    }
}

/// All API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/families/:family_id/children", post(create_child).get(list_children))
        .route(
            "/families/:family_id/children/:child_id/transactions",
            get(list_transactions),
        )
        .route("/families/:family_id/transactions", post(create_transaction))
        .route(
            "/families/:family_id/children/:child_id/weekly-allowance",
            put(update_allowance),
        )
        .route(
            "/families/:family_id/children/:child_id/savings-goal",
            put(update_savings_goal),
        )
        .route(
            "/families/:family_id/children/:child_id/repair-balance",
            post(repair_balance),
        )
        .route("/families/:family_id/parents", post(add_parent))
        .route(
            "/families/:family_id/categories",
            post(create_category).get(list_categories),
        )
        .route(
            "/families/:family_id/categories/:category_id",
            put(update_category).delete(delete_category),
        )
        .route("/families/:family_id/tasks", post(create_task).get(list_tasks))
        .route(
            "/families/:family_id/tasks/:task_id",
            put(update_task).delete(delete_task),
        )
        .route(
            "/families/:family_id/tasks/:task_id/request-payment",
            post(request_payment),
        )
        .route(
            "/families/:family_id/payment-requests",
            get(list_payment_requests),
        )
        .route(
            "/families/:family_id/payment-requests/:request_id/approve",
            put(approve_request),
        )
        .route(
            "/families/:family_id/payment-requests/:request_id/reject",
            put(reject_request),
        )
        .route(
            "/families/:family_id/payment-requests/:request_id/status",
            put(set_request_status),
        )
        .with_state(state)
}

fn error_response(error: DomainError) -> Response {
    let status = match &error {
        DomainError::Validation(_)
        | DomainError::DuplicatePhone(_)
        | DomainError::InvalidCategory(_)
        | DomainError::NotPending(_) => StatusCode::BAD_REQUEST,
        DomainError::Auth(_) => StatusCode::UNAUTHORIZED,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorResponse {
        error: error.kind().to_string(),
        message: error.to_string(),
    };
    (status, Json(body)).into_response()
}

fn child_summary(child: &Child) -> ChildSummary {
    ChildSummary {
        id: child.id.clone(),
        name: child.name.clone(),
        phone: child.phone.clone(),
        balance: child.balance,
        cash_box_balance: child.cash_box_balance,
        weekly_allowance: child.weekly_allowance,
        allowance_type: child.allowance_type.as_str().to_string(),
        allowance_day: child.allowance_day,
        allowance_time: child.allowance_time.clone(),
        weekly_interest_rate: child.weekly_interest_rate,
        total_interest_earned: child.total_interest_earned,
        savings_goal: child.savings_goal.as_ref().map(|g| SavingsGoalDto {
            name: g.name.clone(),
            target_amount: g.target_amount,
        }),
    }
}

fn transaction_dto(tx: &Transaction) -> TransactionDto {
    TransactionDto {
        id: tx.id.clone(),
        date: tx.date,
        transaction_type: tx.transaction_type.as_str().to_string(),
        amount: tx.amount,
        description: tx.description.clone(),
        category: tx.category.clone(),
        child_id: tx.child_id.clone(),
    }
}

fn category_dto(category: &Category) -> CategoryDto {
    CategoryDto {
        id: category.id.clone(),
        name: category.name.clone(),
        active_for: category.active_for.clone(),
    }
}

fn task_dto(task: &Task) -> TaskDto {
    TaskDto {
        id: task.id.clone(),
        name: task.name.clone(),
        price: task.price,
        active_for: task.active_for.clone(),
    }
}

fn payment_request_dto(request: &PaymentRequest) -> PaymentRequestDto {
    PaymentRequestDto {
        id: request.id.clone(),
        task_id: request.task_id.clone(),
        task_name: request.task_name.clone(),
        task_price: request.task_price,
        child_id: request.child_id.clone(),
        note: request.note.clone(),
        status: request.status.as_str().to_string(),
        requested_at: request.requested_at,
        completed_at: request.completed_at,
    }
}

async fn send_otp(State(state): State<AppState>, Json(body): Json<SendOtpRequest>) -> Response {
    info!("POST /auth/send-otp");
    match state.auth.request_code(&body.phone_number) {
        Ok(result) => (
            StatusCode::OK,
            Json(SendOtpResponse {
                success: true,
                is_existing_family: result.is_existing_family,
                sms_sent: result.delivered,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn verify_otp(State(state): State<AppState>, Json(body): Json<VerifyOtpRequest>) -> Response {
    info!("POST /auth/verify-otp");
    match state.auth.verify_code(&body.phone_number, &body.otp_code) {
        Ok(session) => (
            StatusCode::OK,
            Json(VerifyOtpResponse {
                success: true,
                family_id: session.family_id,
                is_child: session.is_child,
                child_id: session.child_id,
                is_additional_parent: session.is_additional_parent,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_child(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<CreateChildRequest>,
) -> Response {
    info!(family_id, "POST /families/:id/children");
    match state.families.add_child(AddChildCommand {
        family_id,
        name: body.name,
        phone: body.phone_number,
    }) {
        Ok(child) => (StatusCode::CREATED, Json(child_summary(&child))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_children(State(state): State<AppState>, Path(family_id): Path<String>) -> Response {
    match state.families.children_overview(&family_id) {
        Ok(children) => {
            let map: HashMap<String, ChildSummary> = children
                .iter()
                .map(|child| (child.id.clone(), child_summary(child)))
                .collect();
            (StatusCode::OK, Json(map)).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionListParams {
    pub limit: Option<usize>,
}

async fn list_transactions(
    State(state): State<AppState>,
    Path((family_id, child_id)): Path<(String, String)>,
    Query(params): Query<TransactionListParams>,
) -> Response {
    match state
        .ledger
        .list_transactions(&family_id, &child_id, params.limit)
    {
        Ok(transactions) => {
            let dtos: Vec<TransactionDto> = transactions.iter().map(transaction_dto).collect();
            (StatusCode::OK, Json(dtos)).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn create_transaction(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<CreateTransactionRequest>,
) -> Response {
    info!(family_id, "POST /families/:id/transactions");
    let Some(transaction_type) = TransactionType::parse(&body.transaction_type) else {
        return error_response(DomainError::Validation(format!(
            "transaction type must be deposit or expense, got {}",
            body.transaction_type
        )));
    };
    match state.ledger.apply_transaction(ApplyTransactionCommand {
        family_id,
        child_id: body.child_id,
        transaction_type,
        amount: body.amount,
        description: body.description,
        category: body.category,
    }) {
        Ok((transaction, new_balance)) => (
            StatusCode::CREATED,
            Json(CreateTransactionResponse {
                transaction: transaction_dto(&transaction),
                new_balance,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_allowance(
    State(state): State<AppState>,
    Path((family_id, child_id)): Path<(String, String)>,
    Json(body): Json<UpdateAllowanceRequest>,
) -> Response {
    info!(family_id, child_id, "PUT weekly-allowance");
    match state.families.update_allowance(UpdateAllowanceCommand {
        family_id,
        child_id,
        weekly_allowance: body.weekly_allowance,
        allowance_type: body.allowance_type,
        allowance_day: body.allowance_day,
        allowance_time: body.allowance_time,
        weekly_interest_rate: body.weekly_interest_rate,
    }) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_savings_goal(
    State(state): State<AppState>,
    Path((family_id, child_id)): Path<(String, String)>,
    Json(body): Json<UpdateSavingsGoalRequest>,
) -> Response {
    let goal = body.goal.map(|g| SavingsGoal {
        name: g.name,
        target_amount: g.target_amount,
    });
    match state.families.set_savings_goal(&family_id, &child_id, goal) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn repair_balance(
    State(state): State<AppState>,
    Path((family_id, child_id)): Path<(String, String)>,
) -> Response {
    match state.families.repair_balance(&family_id, &child_id) {
        Ok(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({ "balance": balance })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn add_parent(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<AddParentRequest>,
) -> Response {
    match state
        .families
        .add_additional_parent(&family_id, &body.phone_number, &body.name)
    {
        Ok(parent) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "phone": parent.phone, "name": parent.name })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_category(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> Response {
    match state
        .families
        .add_category(&family_id, &body.name, body.active_for)
    {
        Ok(category) => (StatusCode::CREATED, Json(category_dto(&category))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_categories(State(state): State<AppState>, Path(family_id): Path<String>) -> Response {
    match state.families.get_family(&family_id) {
        Ok(family) => {
            let dtos: Vec<CategoryDto> = family.categories.iter().map(category_dto).collect();
            (StatusCode::OK, Json(dtos)).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn update_category(
    State(state): State<AppState>,
    Path((family_id, category_id)): Path<(String, String)>,
    Json(body): Json<CategoryRequest>,
) -> Response {
    match state
        .families
        .update_category(&family_id, &category_id, &body.name, body.active_for)
    {
        Ok(category) => (StatusCode::OK, Json(category_dto(&category))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_category(
    State(state): State<AppState>,
    Path((family_id, category_id)): Path<(String, String)>,
) -> Response {
    match state.families.delete_category(&family_id, &category_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_task(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(body): Json<TaskRequest>,
) -> Response {
    match state.tasks.create_task(UpsertTaskCommand {
        family_id,
        task_id: None,
        name: body.name,
        price: body.price,
        active_for: body.active_for,
    }) {
        Ok(task) => (StatusCode::CREATED, Json(task_dto(&task))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_tasks(State(state): State<AppState>, Path(family_id): Path<String>) -> Response {
    match state.families.get_family(&family_id) {
        Ok(family) => {
            let dtos: Vec<TaskDto> = family.tasks.iter().map(task_dto).collect();
            (StatusCode::OK, Json(dtos)).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn update_task(
    State(state): State<AppState>,
    Path((family_id, task_id)): Path<(String, String)>,
    Json(body): Json<TaskRequest>,
) -> Response {
    match state.tasks.update_task(UpsertTaskCommand {
        family_id,
        task_id: Some(task_id),
        name: body.name,
        price: body.price,
        active_for: body.active_for,
    }) {
        Ok(task) => (StatusCode::OK, Json(task_dto(&task))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_task(
    State(state): State<AppState>,
    Path((family_id, task_id)): Path<(String, String)>,
) -> Response {
    match state.tasks.delete_task(&family_id, &task_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn request_payment(
    State(state): State<AppState>,
    Path((family_id, task_id)): Path<(String, String)>,
    Json(body): Json<RequestPaymentRequest>,
) -> Response {
    info!(family_id, task_id, "POST request-payment");
    match state.tasks.request_payment(RequestPaymentCommand {
        family_id,
        task_id,
        child_id: body.child_id,
        note: body.note,
        image: body.image,
    }) {
        Ok(request) => (StatusCode::CREATED, Json(payment_request_dto(&request))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_payment_requests(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> Response {
    match state.families.get_family(&family_id) {
        Ok(family) => {
            let dtos: Vec<PaymentRequestDto> =
                family.payment_requests.iter().map(payment_request_dto).collect();
            (StatusCode::OK, Json(dtos)).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn approve_request(
    State(state): State<AppState>,
    Path((family_id, request_id)): Path<(String, String)>,
) -> Response {
    info!(family_id, request_id, "PUT approve");
    match state.tasks.approve(&family_id, &request_id) {
        Ok(request) => (StatusCode::OK, Json(payment_request_dto(&request))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn reject_request(
    State(state): State<AppState>,
    Path((family_id, request_id)): Path<(String, String)>,
) -> Response {
    info!(family_id, request_id, "PUT reject");
    match state.tasks.reject(&family_id, &request_id) {
        Ok(request) => (StatusCode::OK, Json(payment_request_dto(&request))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn set_request_status(
    State(state): State<AppState>,
    Path((family_id, request_id)): Path<(String, String)>,
    Json(body): Json<SetRequestStatusRequest>,
) -> Response {
    let Some(status) = PaymentRequestStatus::parse(&body.status) else {
        return error_response(DomainError::Validation(format!(
            "unknown status {}",
            body.status
        )));
    };
    match state.tasks.set_status(&family_id, &request_id, status) {
        Ok(request) => (StatusCode::OK, Json(payment_request_dto(&request))).into_response(),
        Err(e) => error_response(e),
    }
}
