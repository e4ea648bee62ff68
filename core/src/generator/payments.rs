//! Payment behaviour for an issued bill.

use crate::config::PaymentConfig;
use crate::records::{BillRecord, PaymentRecord, PaymentStatus};
use crate::rng::StreamRng;
use crate::types::Money;
use chrono::Duration;

pub fn settle(bill: &BillRecord, rules: &PaymentConfig, rng: &mut StreamRng) -> PaymentRecord {
    let mut payment = PaymentRecord {
        payment_id: format!("PAY-{}", bill.bill_id),
        bill_id: bill.bill_id.clone(),
        consumer_id: bill.consumer_id.clone(),
        meter_number: bill.meter_number.clone(),
        billing_month: bill.billing_month.clone(),
        bill_amount: bill.total_amount,
        due_date: bill.due_date,
        payment_status: PaymentStatus::Unpaid,
        payment_date: None,
        paid_amount: Money::ZERO,
        payment_method: None,
        transaction_id: None,
        outstanding_amount: bill.total_amount,
    };
    if !rng.chance(rules.paid_probability) {
        return payment;
    }

    let weights: Vec<f64> = rules.timing_bands.iter().map(|b| b.probability).collect();
    let band = rules.timing_bands[rng.pick_weighted(&weights)];
    let offset = rng.range_inclusive(band.offset_days.0, band.offset_days.1);
    let mut paid_on = bill.due_date + Duration::days(offset);
    if paid_on < bill.issue_date {
        let (lo, hi) = rules.early_floor_days;
        paid_on = bill.issue_date + Duration::days(rng.range_inclusive(lo, hi));
    }

    let mut paid = if paid_on <= bill.due_date {
        bill.amount_within_due_date
    } else if band.premium_max > 1.0 {
        bill.amount_after_due_date.scale(rng.uniform(1.0, band.premium_max))
    } else {
        bill.amount_after_due_date
    };

    let mut status = PaymentStatus::Paid;
    if rng.chance(rules.partial_probability) {
        paid = paid.scale(rng.uniform(rules.partial_fraction.0, rules.partial_fraction.1));
        status = PaymentStatus::Partial;
    }

    let method_weights: Vec<f64> = rules.methods.iter().map(|m| m.weight).collect();
    let method = &rules.methods[rng.pick_weighted(&method_weights)];
    let (prefix, digits) = method.channel.transaction_format();
    let serial = rng.next_u64_below(10u64.pow(digits));

    payment.payment_status = status;
    payment.payment_date = Some(paid_on);
    payment.paid_amount = paid;
    payment.payment_method = Some(method.name.clone());
    payment.transaction_id = Some(format!("{prefix}{serial:0width$}", width = digits as usize));
    payment.outstanding_amount = (bill.total_amount - paid).max(Money::ZERO);
    payment
}
