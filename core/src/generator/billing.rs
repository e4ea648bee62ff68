//! Monthly bill pricing.
//!
//! Every component is rounded to paisa once; the total is the sum of the
//! rounded components.

use crate::clock::YearMonth;
use crate::config::{BillingConfig, FixedCharge, Slab, TariffConfig};
use crate::records::{BillRecord, MeterRecord};
use crate::types::{round_to, Money};
use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillBreakdown {
    pub variable: Money,
    pub fixed: Money,
    pub gst: Money,
    pub electricity_duty: Money,
    pub tv_fee: Money,
    pub late_surcharge: Money,
    pub total: Money,
}

/// Charge for `units` walking the brackets in order.
pub fn slab_charge(units: f64, slabs: &[Slab]) -> f64 {
    let mut charge = 0.0;
    let mut floor = 0.0;
    for slab in slabs {
        let ceiling = slab.upto_units.unwrap_or(f64::INFINITY);
        let in_bracket = (units.min(ceiling) - floor).max(0.0);
        charge += in_bracket * slab.rate;
        if units <= ceiling {
            break;
        }
        floor = ceiling;
    }
    charge
}

pub fn fixed_charge(rule: FixedCharge, connected_load_kw: f64) -> f64 {
    match rule {
        FixedCharge::Stepped { threshold_kw, below, at_or_above } => {
            if connected_load_kw < threshold_kw {
                below
            } else {
                at_or_above
            }
        }
        FixedCharge::PerKw { rate } => rate * connected_load_kw,
    }
}

pub fn price(
    units: f64,
    tariff: &TariffConfig,
    connected_load_kw: f64,
    billing: &BillingConfig,
    late: bool,
) -> BillBreakdown {
    let variable = Money::from_rupees(slab_charge(units, &tariff.slabs));
    let fixed = Money::from_rupees(fixed_charge(tariff.fixed_charge, connected_load_kw));
    let gst = (variable + fixed).scale(billing.gst_rate);
    let electricity_duty = variable.scale(billing.electricity_duty_rate);
    let tv_fee = Money::from_rupees(billing.tv_fee);
    let late_surcharge = if late {
        (variable + fixed).scale(billing.late_surcharge_rate)
    } else {
        Money::ZERO
    };
    let total = variable + fixed + gst + electricity_duty + tv_fee + late_surcharge;
    BillBreakdown { variable, fixed, gst, electricity_duty, tv_fee, late_surcharge, total }
}

/// Build the bill for `month`. `late` applies the surcharge.
pub fn issue_bill(
    meter: &MeterRecord,
    month: YearMonth,
    units: f64,
    tariff: &TariffConfig,
    billing: &BillingConfig,
    late: bool,
) -> BillRecord {
    let units = round_to(units.max(0.0), 2);
    let b = price(units, tariff, meter.connected_load_kw, billing, late);
    let issue_date = month.last_day() + Duration::days(billing.issue_offset_days);
    let due_date = issue_date + Duration::days(billing.due_after_issue_days);

    BillRecord {
        bill_id: format!("BILL-{}-{:04}{:02}", meter.meter_number, month.year, month.month),
        meter_number: meter.meter_number.clone(),
        consumer_id: meter.consumer_id.clone(),
        billing_month: month.to_string(),
        issue_date,
        due_date,
        units_consumed: units,
        variable_charges: b.variable,
        fixed_charges: b.fixed,
        gst: b.gst,
        electricity_duty: b.electricity_duty,
        tv_fee: b.tv_fee,
        late_payment_surcharge: b.late_surcharge,
        total_amount: b.total,
        amount_within_due_date: b.total,
        amount_after_due_date: b.total.scale(1.0 + billing.after_due_rate),
        tariff_applied: tariff.code,
        reference_no: meter.reference_no.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TariffTable;
    use crate::records::TariffCategory;

    #[test]
    fn residential_slabs_accumulate_per_bracket() {
        let table = TariffTable::default();
        let a1a = table.get(TariffCategory::A1a).unwrap();
        // 100 × 5.79 + 50 × 8.11
        assert!((slab_charge(150.0, &a1a.slabs) - 984.5).abs() < 1e-9);
        // 100 × 5.79 + 100 × 8.11 + 100 × 10.20 + 100 × 16 + 100 × 18 + 50 × 21
        assert!((slab_charge(550.0, &a1a.slabs) - 6860.0).abs() < 1e-9);
        assert_eq!(slab_charge(0.0, &a1a.slabs), 0.0);
    }

    #[test]
    fn fixed_charge_rules() {
        let stepped = FixedCharge::Stepped { threshold_kw: 5.0, below: 50.0, at_or_above: 100.0 };
        assert_eq!(fixed_charge(stepped, 4.99), 50.0);
        assert_eq!(fixed_charge(stepped, 5.0), 100.0);
        assert_eq!(fixed_charge(FixedCharge::PerKw { rate: 250.0 }, 2.0), 500.0);
    }

    #[test]
    fn breakdown_matches_hand_computation() {
        let table = TariffTable::default();
        let a1a = table.get(TariffCategory::A1a).unwrap();
        let b = price(200.0, a1a, 3.0, &BillingConfig::default(), true);
        assert_eq!(b.variable, Money::from_rupees(1390.0));
        assert_eq!(b.fixed, Money::from_rupees(50.0));
        assert_eq!(b.gst, Money::from_rupees(259.20));
        assert_eq!(b.electricity_duty, Money::from_rupees(20.85));
        assert_eq!(b.tv_fee, Money::from_rupees(35.0));
        assert_eq!(b.late_surcharge, Money::from_rupees(72.0));
        assert_eq!(b.total, b.variable + b.fixed + b.gst + b.electricity_duty + b.tv_fee + b.late_surcharge);
    }
}
