use crate::error::BillingError;
use crate::models::{BillStatement, StatementQuery};
use crate::startup::AppState;
use askama::Template;
use axum::{extract::State, Form};

#[derive(Template)]
#[template(path = "bill_details.html")]
pub struct BillDetailsTemplate {
    pub statement: BillStatement,
}

pub async fn retrieve_bill(
    State(state): State<AppState>,
    Form(query): Form<StatementQuery>,
) -> Result<BillDetailsTemplate, BillingError> {
    let statement = state.statements.retrieve(&query).await?;
    Ok(BillDetailsTemplate { statement })
}
