//! PostgreSQL implementation of the billing gateway.

use crate::models::{
    AdjustmentPosting, BillBalance, ComputedCharges, FixedCharge, PaymentPosting, PreviousBill,
    StatementHeader, StatementQuery, SubsidyRate, TariffRate, TaxRate,
};
use crate::services::gateway::{BillingGateway, BillingTransaction};
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("Failed to {}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-portal"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BillingGateway for Database {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, AppError> {
        let tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
        Ok(Box::new(PgBillingTransaction { tx: Some(tx) }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("run health check"))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn original_bill_amount(&self, bill_id: i64) -> Result<Option<Decimal>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["original_bill_amount"])
            .start_timer();

        let amount = sqlx::query_scalar::<_, Decimal>(
            "SELECT total_amount_before_due_date::NUMERIC FROM bill WHERE bill_id = $1",
        )
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch original bill amount"))?;

        timer.observe_duration();
        Ok(amount)
    }

    #[instrument(skip(self, query), fields(connection_id = %query.connection_id, month = query.month, year = query.year))]
    async fn statement_header(
        &self,
        query: &StatementQuery,
    ) -> Result<Option<StatementHeader>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["statement_header"])
            .start_timer();

        let header = sqlx::query_as::<_, StatementHeader>(
            r#"
            SELECT
                c.customer_id::TEXT AS customer_id, c.first_name, c.last_name,
                c.address AS customer_address, c.phone_number AS customer_phone, c.email AS customer_email,
                con.connection_id::TEXT AS connection_id, ct.description AS connection_type,
                di.division_name, di.sub_div_name,
                con.installation_date::DATE AS installation_date, con.meter_type,
                b.bill_issue_date::TIMESTAMP AS bill_issue_date,
                b.net_peak_units::BIGINT AS net_peak_units,
                b.net_off_peak_units::BIGINT AS net_off_peak_units,
                b.total_amount_before_due_date::NUMERIC AS total_amount_before_due_date,
                b.due_date::TIMESTAMP AS due_date,
                b.total_amount_after_due_date::NUMERIC AS total_amount_after_due_date,
                b.billing_month::INTEGER AS billing_month,
                b.billing_year::INTEGER AS billing_year
            FROM customers c
            JOIN connections con ON c.customer_id = con.customer_id
            JOIN connection_types ct ON con.connection_type_code = ct.connection_type_code
            JOIN bill b ON con.connection_id = b.connection_id
            JOIN div_info di ON con.division_id = di.division_id AND con.sub_div_id = di.sub_div_id
            WHERE c.customer_id = $1
              AND con.connection_id = $2
              AND b.billing_month = $3
              AND b.billing_year = $4
            "#,
        )
        .bind(&query.customer_id)
        .bind(&query.connection_id)
        .bind(query.month)
        .bind(query.year)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch statement header"))?;

        timer.observe_duration();
        Ok(header)
    }

    #[instrument(skip(self, query), fields(connection_id = %query.connection_id))]
    async fn previous_bills(&self, query: &StatementQuery) -> Result<Vec<PreviousBill>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["previous_bills"])
            .start_timer();

        let bills = sqlx::query_as::<_, PreviousBill>(
            r#"
            SELECT
                b.billing_month::INTEGER AS billing_month,
                b.billing_year::INTEGER AS billing_year,
                b.total_amount_before_due_date::NUMERIC AS total_amount_before_due_date,
                b.due_date::TIMESTAMP AS due_date,
                pd.payment_status
            FROM bill b
            LEFT OUTER JOIN payment_details pd ON b.bill_id = pd.bill_id
            WHERE b.connection_id = $1
              AND ((b.billing_year = $3 AND b.billing_month < $2) OR b.billing_year < $3)
            ORDER BY b.billing_year DESC, b.billing_month DESC
            LIMIT 10
            "#,
        )
        .bind(&query.connection_id)
        .bind(query.month)
        .bind(query.year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch previous bills"))?;

        timer.observe_duration();
        Ok(bills)
    }

    #[instrument(skip(self, query), fields(connection_id = %query.connection_id))]
    async fn computed_charges(
        &self,
        query: &StatementQuery,
        bill_issue_date: NaiveDateTime,
    ) -> Result<ComputedCharges, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["computed_charges"])
            .start_timer();

        let connection_id = query.connection_id.as_str();
        let (month, year) = (query.month, query.year);

        let billing_days: i32 =
            sqlx::query_scalar("SELECT fun_compute_billing_days($1, $2, $3)::INTEGER")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute billing days"))?;

        let import_peak_units: i64 =
            sqlx::query_scalar("SELECT fun_compute_import_peak_units($1, $2, $3)::BIGINT")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute import peak units"))?;

        let import_off_peak_units: i64 =
            sqlx::query_scalar("SELECT fun_compute_import_off_peak_units($1, $2, $3)::BIGINT")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute import off-peak units"))?;

        let export_off_peak_units: i64 =
            sqlx::query_scalar("SELECT fun_compute_export_off_peak_units($1, $2, $3)::BIGINT")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute export off-peak units"))?;

        let peak_amount: Decimal =
            sqlx::query_scalar("SELECT fun_compute_peak_amount($1, $2, $3, $4)::NUMERIC")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .bind(bill_issue_date)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute peak amount"))?;

        let off_peak_amount: Decimal =
            sqlx::query_scalar("SELECT fun_compute_off_peak_amount($1, $2, $3, $4)::NUMERIC")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .bind(bill_issue_date)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute off-peak amount"))?;

        let tax_amount: Decimal =
            sqlx::query_scalar("SELECT fun_compute_tax_amount($1, $2, $3, $4, $5, $6)::NUMERIC")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .bind(bill_issue_date)
                .bind(peak_amount)
                .bind(off_peak_amount)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute tax amount"))?;

        let fixed_fee: Decimal =
            sqlx::query_scalar("SELECT fun_compute_fixed_fee($1, $2, $3, $4)::NUMERIC")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .bind(bill_issue_date)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute fixed fee"))?;

        let subsidy_amount: Decimal = sqlx::query_scalar(
            "SELECT fun_compute_subsidy_amount($1, $2, $3, $4, $5, $6)::NUMERIC",
        )
        .bind(connection_id)
        .bind(month)
        .bind(year)
        .bind(bill_issue_date)
        .bind(import_peak_units)
        .bind(import_off_peak_units)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("compute subsidy amount"))?;

        let arrears: Decimal =
            sqlx::query_scalar("SELECT fun_compute_arrears($1, $2, $3, $4)::NUMERIC")
                .bind(connection_id)
                .bind(month)
                .bind(year)
                .bind(bill_issue_date)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("compute arrears"))?;

        timer.observe_duration();

        Ok(ComputedCharges {
            billing_days,
            import_peak_units,
            import_off_peak_units,
            export_off_peak_units,
            peak_amount,
            off_peak_amount,
            tax_amount,
            fixed_fee,
            subsidy_amount,
            arrears,
        })
    }

    #[instrument(skip(self))]
    async fn subsidy_rates(
        &self,
        connection_id: &str,
        bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<SubsidyRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["subsidy_rates"])
            .start_timer();

        let rates = sqlx::query_as::<_, SubsidyRate>(
            r#"
            SELECT
                s.subsidy_description AS subsidy_name,
                sp.provider_name,
                s.rate_per_unit::NUMERIC AS rate_per_unit,
                s.threshold_low_per_hour::NUMERIC AS threshold_low,
                s.threshold_high_per_hour::NUMERIC AS threshold_high
            FROM subsidy s
            JOIN subsidy_provider sp ON s.provider_id = sp.provider_id
            JOIN connections con ON con.connection_type_code = s.connection_type_code
            WHERE con.connection_id = $1
              AND $2::TIMESTAMP BETWEEN s.start_date AND s.end_date
            "#,
        )
        .bind(connection_id)
        .bind(bill_issue_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch subsidy rates"))?;

        timer.observe_duration();
        Ok(rates)
    }

    #[instrument(skip(self))]
    async fn tariff_rates(
        &self,
        connection_id: &str,
        bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<TariffRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["tariff_rates"])
            .start_timer();

        let rates = sqlx::query_as::<_, TariffRate>(
            r#"
            SELECT
                tariff_code::TEXT AS tariff_code,
                rate_per_unit::NUMERIC AS rate_per_unit,
                min_amount::NUMERIC AS min_amount,
                min_unit::NUMERIC AS min_unit,
                threshold_low_per_hour::NUMERIC AS threshold_low,
                threshold_high_per_hour::NUMERIC AS threshold_high,
                tariff_description,
                tariff_type::INTEGER AS tariff_type
            FROM tariff
            WHERE connection_type_code = (
                    SELECT connection_type_code FROM connections WHERE connection_id = $1
                )
              AND start_date <= $2::TIMESTAMP
              AND end_date >= $2::TIMESTAMP
            "#,
        )
        .bind(connection_id)
        .bind(bill_issue_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch tariff rates"))?;

        timer.observe_duration();
        Ok(rates)
    }

    #[instrument(skip(self, query), fields(connection_id = %query.connection_id))]
    async fn tax_rates(&self, query: &StatementQuery) -> Result<Vec<TaxRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["tax_rates"])
            .start_timer();

        let rates = sqlx::query_as::<_, TaxRate>(
            r#"
            SELECT tr.tax_type AS tax_name, tr.rate::NUMERIC AS tax_rate
            FROM tax_rates tr
            JOIN connections con ON con.connection_type_code = tr.connection_type_code
            JOIN bill b ON b.connection_id = con.connection_id
            WHERE b.connection_id = $1
              AND b.billing_month = $2
              AND b.billing_year = $3
              AND tr.start_date <= b.bill_issue_date
              AND tr.end_date >= b.bill_issue_date
            ORDER BY tr.start_date, tr.tax_type
            "#,
        )
        .bind(&query.connection_id)
        .bind(query.month)
        .bind(query.year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch tax rates"))?;

        timer.observe_duration();
        Ok(rates)
    }

    #[instrument(skip(self))]
    async fn fixed_charges(
        &self,
        connection_id: &str,
        bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<FixedCharge>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["fixed_charges"])
            .start_timer();

        let charges = sqlx::query_as::<_, FixedCharge>(
            r#"
            SELECT fixed_charge_type AS charge_name, fixed_fee::NUMERIC AS amount
            FROM fixed_charges
            WHERE connection_type_code = (
                    SELECT connection_type_code FROM connections WHERE connection_id = $1
                )
              AND $2::TIMESTAMP BETWEEN start_date AND end_date
            "#,
        )
        .bind(connection_id)
        .bind(bill_issue_date)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch fixed charges"))?;

        timer.observe_duration();
        Ok(charges)
    }
}

/// A pooled connection inside an open transaction.
pub struct PgBillingTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgBillingTransaction {
    fn conn(&mut self) -> Result<&mut PgConnection, AppError> {
        self.tx.as_deref_mut().ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("Transaction already finished"))
        })
    }
}

#[async_trait]
impl BillingTransaction for PgBillingTransaction {
    #[instrument(skip(self))]
    async fn lock_bill(&mut self, bill_id: i64) -> Result<(), AppError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(bill_id)
            .execute(self.conn()?)
            .await
            .map_err(db_error("lock bill"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn payment_method_description(
        &mut self,
        payment_method_id: i64,
    ) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payment_method_description"])
            .start_timer();

        let description = sqlx::query_scalar::<_, String>(
            "SELECT payment_method_description FROM payment_methods WHERE payment_method_id = $1",
        )
        .bind(payment_method_id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error("fetch payment method"))?;

        timer.observe_duration();
        Ok(description)
    }

    #[instrument(skip(self))]
    async fn bill_balance(&mut self, bill_id: i64) -> Result<Option<BillBalance>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bill_balance"])
            .start_timer();

        let balance = sqlx::query_as::<_, BillBalance>(
            r#"
            SELECT
                COALESCE(SUM(pd.amount_paid), 0)::NUMERIC AS total_paid,
                b.total_amount_before_due_date::NUMERIC AS total_amount_before_due_date,
                b.total_amount_after_due_date::NUMERIC AS total_amount_after_due_date,
                b.due_date::TIMESTAMP AS due_date,
                MAX(pd.payment_status) AS payment_status
            FROM bill b
            LEFT JOIN payment_details pd ON b.bill_id = pd.bill_id
            WHERE b.bill_id = $1
            GROUP BY b.total_amount_before_due_date, b.total_amount_after_due_date, b.due_date
            "#,
        )
        .bind(bill_id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(db_error("fetch bill balance"))?;

        timer.observe_duration();
        Ok(balance)
    }

    #[instrument(skip(self, posting), fields(bill_id = posting.bill_id))]
    async fn process_payment(&mut self, posting: &PaymentPosting) -> Result<i32, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["process_payment"])
            .start_timer();

        let result: i32 = sqlx::query_scalar("SELECT fun_process_payment($1, $2, $3, $4)::INTEGER")
            .bind(posting.bill_id)
            .bind(posting.payment_date)
            .bind(posting.payment_method_id)
            .bind(posting.amount)
            .fetch_one(self.conn()?)
            .await
            .map_err(db_error("process payment"))?;

        timer.observe_duration();
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn adjustment_id_exists(&mut self, adjustment_id: i64) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bill_adjustments WHERE adjustment_id = $1)",
        )
        .bind(adjustment_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(db_error("check adjustment id"))
    }

    #[instrument(skip(self, posting), fields(bill_id = posting.bill_id, adjustment_id = posting.adjustment_id))]
    async fn adjust_bill(&mut self, posting: &AdjustmentPosting) -> Result<i32, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_bill"])
            .start_timer();

        let result: i32 =
            sqlx::query_scalar("SELECT fun_adjust_bill($1, $2, $3, $4, $5, $6, $7, $8)::INTEGER")
                .bind(posting.adjustment_id)
                .bind(posting.bill_id)
                .bind(posting.adjustment_date)
                .bind(&posting.officer_name)
                .bind(&posting.officer_designation)
                .bind(posting.original_bill_amount)
                .bind(posting.adjustment_amount)
                .bind(&posting.adjustment_reason)
                .fetch_one(self.conn()?)
                .await
                .map_err(db_error("adjust bill"))?;

        timer.observe_duration();
        Ok(result)
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(db_error("commit transaction")),
            None => Err(AppError::DatabaseError(anyhow::anyhow!(
                "Transaction already finished"
            ))),
        }
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(db_error("roll back transaction")),
            None => Ok(()),
        }
    }
}
