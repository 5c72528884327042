use crate::config::BillingConfig;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::bill::{Bill, BillRequest, BillStatus, NewBill};
use crate::models::consumer::{Consumer, ConsumerStatus};
use crate::models::disconnection::{Disconnection, DisconnectionRequest};
use crate::models::payment::{Payment, PaymentRequest};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::Rng;
use uuid::Uuid;

const RECEIPT_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Minimum charge covers the first `minimum_consumption_m3`; the excess is billed per m³.
pub fn compute_amount_due(consumption_m3: i32, rates: &BillingConfig) -> i64 {
    let excess = (consumption_m3 - rates.minimum_consumption_m3).max(0) as i64;
    rates.minimum_charge + excess * rates.rate_per_m3
}

pub fn bill_number(account_number: &str, period_end: NaiveDate) -> String {
    format!("{}-{}", account_number, period_end.format("%Y%m"))
}

pub fn prepare_bill(consumer: &Consumer, request: &BillRequest, previous_reading: i32, rates: &BillingConfig) -> Result<NewBill, AppError> {
    if request.current_reading < previous_reading {
        return Err(AppError::BadRequest(format!(
            "current reading {} is below previous reading {}",
            request.current_reading, previous_reading
        )));
    }

    let consumption_m3 = request.current_reading - previous_reading;

    Ok(NewBill {
        consumer_id: consumer.id,
        bill_number: bill_number(&consumer.account_number, request.period_end),
        period_start: request.period_start,
        period_end: request.period_end,
        previous_reading,
        current_reading: request.current_reading,
        consumption_m3,
        amount_due: compute_amount_due(consumption_m3, rates),
        due_date: request.period_end + Duration::days(rates.due_days),
    })
}

/// Returns the new paid total and status after applying `amount` to the bill.
pub fn apply_payment(bill: &Bill, amount: i64) -> Result<(i64, BillStatus), AppError> {
    if amount <= 0 {
        return Err(AppError::BadRequest("payment amount must be positive".to_string()));
    }
    if !bill.status.is_open() {
        return Err(AppError::Conflict(format!("bill {} is already paid", bill.bill_number)));
    }
    if amount > bill.outstanding() {
        return Err(AppError::BadRequest(format!(
            "payment of {} exceeds outstanding balance of {}",
            amount,
            bill.outstanding()
        )));
    }

    let amount_paid = bill.amount_paid + amount;
    let status = if amount_paid >= bill.amount_due {
        BillStatus::Paid
    } else if bill.status == BillStatus::Overdue {
        BillStatus::Overdue
    } else {
        BillStatus::PartiallyPaid
    };

    Ok((amount_paid, status))
}

/// `OR-YYYYMMDD-XXXXXXXX` with an unambiguous alphanumeric suffix.
pub fn generate_receipt_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| RECEIPT_ALPHABET[rng.random_range(0..RECEIPT_ALPHABET.len())] as char)
        .collect();

    format!("OR-{}-{}", now.format("%Y%m%d"), suffix)
}

pub fn ensure_can_schedule_disconnection(consumer: &Consumer) -> Result<(), AppError> {
    if consumer.status == ConsumerStatus::Disconnected {
        return Err(AppError::Conflict(format!("consumer {} is already disconnected", consumer.account_number)));
    }
    Ok(())
}

pub fn ensure_can_execute(disconnection: &Disconnection) -> Result<(), AppError> {
    if disconnection.disconnected_at.is_some() {
        return Err(AppError::Conflict("disconnection already executed".to_string()));
    }
    Ok(())
}

pub fn ensure_can_reconnect(disconnection: &Disconnection, outstanding_balance: i64) -> Result<(), AppError> {
    if disconnection.disconnected_at.is_none() {
        return Err(AppError::Conflict("service has not been disconnected".to_string()));
    }
    if disconnection.reconnected_at.is_some() {
        return Err(AppError::Conflict("service already reconnected".to_string()));
    }
    if outstanding_balance > 0 {
        return Err(AppError::Conflict(format!(
            "outstanding balance of {} must be settled before reconnection",
            outstanding_balance
        )));
    }
    Ok(())
}

pub struct BillingService<'a> {
    repository: &'a PostgresRepository,
    rates: &'a BillingConfig,
}

impl<'a> BillingService<'a> {
    pub fn new(repository: &'a PostgresRepository, rates: &'a BillingConfig) -> Self {
        BillingService { repository, rates }
    }

    pub async fn create_bill(&self, request: &BillRequest) -> Result<Bill, AppError> {
        let consumer = self
            .repository
            .get_consumer_by_id(&request.consumer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;

        let previous_reading = match request.previous_reading {
            Some(reading) => reading,
            None => self
                .repository
                .latest_bill_for_consumer(&consumer.id)
                .await?
                .map(|bill| bill.current_reading)
                .unwrap_or(0),
        };

        let new_bill = prepare_bill(&consumer, request, previous_reading, self.rates)?;
        let bill = self.repository.create_bill(&new_bill).await?;

        tracing::info!(
            bill_id = %bill.id,
            consumer_id = %consumer.id,
            amount_due = bill.amount_due,
            "bill issued"
        );

        Ok(bill)
    }

    pub async fn record_payment(&self, request: &PaymentRequest, recorded_by: &Uuid) -> Result<(Payment, Bill), AppError> {
        let receipt_number = generate_receipt_number(Utc::now());
        let (payment, bill) = self.repository.apply_payment(request, recorded_by, &receipt_number).await?;

        tracing::info!(
            payment_id = %payment.id,
            bill_id = %bill.id,
            amount = payment.amount,
            status = ?bill.status,
            "payment recorded"
        );

        Ok((payment, bill))
    }

    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<u64, AppError> {
        self.repository.mark_overdue_bills(today).await
    }

    pub async fn schedule_disconnection(&self, request: &DisconnectionRequest, created_by: &Uuid) -> Result<Disconnection, AppError> {
        let consumer = self
            .repository
            .get_consumer_by_id(&request.consumer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;

        ensure_can_schedule_disconnection(&consumer)?;
        self.repository.create_disconnection(request, created_by).await
    }

    pub async fn execute_disconnection(&self, id: &Uuid) -> Result<Disconnection, AppError> {
        let disconnection = self.find_disconnection(id).await?;
        ensure_can_execute(&disconnection)?;

        let disconnection = self.repository.mark_disconnected(&disconnection).await?;
        tracing::info!(disconnection_id = %disconnection.id, consumer_id = %disconnection.consumer_id, "service disconnected");

        Ok(disconnection)
    }

    pub async fn reconnect(&self, id: &Uuid) -> Result<Disconnection, AppError> {
        let disconnection = self.find_disconnection(id).await?;
        let outstanding = self.repository.outstanding_balance_for_consumer(&disconnection.consumer_id).await?;
        ensure_can_reconnect(&disconnection, outstanding)?;

        let disconnection = self.repository.mark_reconnected(&disconnection).await?;
        tracing::info!(disconnection_id = %disconnection.id, consumer_id = %disconnection.consumer_id, "service reconnected");

        Ok(disconnection)
    }

    async fn find_disconnection(&self, id: &Uuid) -> Result<Disconnection, AppError> {
        self.repository
            .get_disconnection_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Disconnection not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> BillingConfig {
        BillingConfig::default()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn consumer() -> Consumer {
        Consumer {
            id: Uuid::new_v4(),
            account_number: "ACC-0042".to_string(),
            name: "Maria Santos".to_string(),
            address: "12 Riverside Rd".to_string(),
            meter_number: "MTR-778".to_string(),
            contact_email: None,
            contact_phone: None,
            user_id: None,
            status: ConsumerStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bill(amount_due: i64, amount_paid: i64, status: BillStatus) -> Bill {
        Bill {
            id: Uuid::new_v4(),
            consumer_id: Uuid::new_v4(),
            bill_number: "ACC-0042-202603".to_string(),
            period_start: date(2026, 3, 1),
            period_end: date(2026, 3, 31),
            previous_reading: 100,
            current_reading: 120,
            consumption_m3: 20,
            amount_due,
            amount_paid,
            due_date: date(2026, 4, 15),
            status,
            created_at: Utc::now(),
        }
    }

    fn disconnection(disconnected: bool, reconnected: bool) -> Disconnection {
        Disconnection {
            id: Uuid::new_v4(),
            consumer_id: Uuid::new_v4(),
            reason: "Arrears".to_string(),
            scheduled_for: date(2026, 5, 1),
            disconnected_at: disconnected.then(Utc::now),
            reconnected_at: reconnected.then(Utc::now),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn consumption_within_minimum_pays_minimum_charge() {
        assert_eq!(compute_amount_due(0, &rates()), 15000);
        assert_eq!(compute_amount_due(10, &rates()), 15000);
    }

    #[test]
    fn excess_consumption_is_charged_per_cubic_meter() {
        assert_eq!(compute_amount_due(14, &rates()), 15000 + 4 * 2500);
    }

    #[test]
    fn prepare_bill_derives_consumption_and_due_date() {
        let request = BillRequest {
            consumer_id: Uuid::new_v4(),
            period_start: date(2026, 3, 1),
            period_end: date(2026, 3, 31),
            previous_reading: None,
            current_reading: 125,
        };

        let new_bill = prepare_bill(&consumer(), &request, 100, &rates()).unwrap();
        assert_eq!(new_bill.consumption_m3, 25);
        assert_eq!(new_bill.amount_due, 15000 + 15 * 2500);
        assert_eq!(new_bill.due_date, date(2026, 4, 15));
        assert_eq!(new_bill.bill_number, "ACC-0042-202603");
    }

    #[test]
    fn meter_rollback_is_rejected() {
        let request = BillRequest {
            consumer_id: Uuid::new_v4(),
            period_start: date(2026, 3, 1),
            period_end: date(2026, 3, 31),
            previous_reading: None,
            current_reading: 90,
        };

        assert!(matches!(prepare_bill(&consumer(), &request, 100, &rates()), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn partial_then_full_payment() {
        let open = bill(10000, 0, BillStatus::Unpaid);
        assert_eq!(apply_payment(&open, 4000).unwrap(), (4000, BillStatus::PartiallyPaid));

        let partial = bill(10000, 4000, BillStatus::PartiallyPaid);
        assert_eq!(apply_payment(&partial, 6000).unwrap(), (10000, BillStatus::Paid));
    }

    #[test]
    fn overdue_bill_stays_overdue_until_settled() {
        let overdue = bill(10000, 0, BillStatus::Overdue);
        assert_eq!(apply_payment(&overdue, 1000).unwrap(), (1000, BillStatus::Overdue));
        assert_eq!(apply_payment(&overdue, 10000).unwrap(), (10000, BillStatus::Paid));
    }

    #[test]
    fn overpayment_and_paid_bills_are_rejected() {
        assert!(matches!(apply_payment(&bill(10000, 9000, BillStatus::PartiallyPaid), 2000), Err(AppError::BadRequest(_))));
        assert!(matches!(apply_payment(&bill(10000, 10000, BillStatus::Paid), 1), Err(AppError::Conflict(_))));
        assert!(matches!(apply_payment(&bill(10000, 0, BillStatus::Unpaid), 0), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn receipt_number_format() {
        let now = DateTime::parse_from_rfc3339("2026-04-02T10:00:00Z").unwrap().with_timezone(&Utc);
        let receipt = generate_receipt_number(now);

        assert!(receipt.starts_with("OR-20260402-"));
        assert_eq!(receipt.len(), "OR-20260402-".len() + 8);
        assert!(receipt[12..].bytes().all(|b| RECEIPT_ALPHABET.contains(&b)));
    }

    #[test]
    fn disconnected_consumer_cannot_be_scheduled_again() {
        let mut disconnected = consumer();
        disconnected.status = ConsumerStatus::Disconnected;
        assert!(ensure_can_schedule_disconnection(&consumer()).is_ok());
        assert!(ensure_can_schedule_disconnection(&disconnected).is_err());
    }

    #[test]
    fn reconnection_requires_settled_balance() {
        assert!(ensure_can_reconnect(&disconnection(true, false), 0).is_ok());
        assert!(ensure_can_reconnect(&disconnection(true, false), 500).is_err());
        assert!(ensure_can_reconnect(&disconnection(false, false), 0).is_err());
        assert!(ensure_can_reconnect(&disconnection(true, true), 0).is_err());
    }

    #[test]
    fn disconnection_executes_once() {
        assert!(ensure_can_execute(&disconnection(false, false)).is_ok());
        assert!(ensure_can_execute(&disconnection(true, false)).is_err());
    }
}
