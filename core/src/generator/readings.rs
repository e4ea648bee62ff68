//! Interval reading synthesis and fault injection.

use crate::clock::is_weekend;
use crate::config::{ConsumptionConfig, FaultTable};
use crate::records::{MeterRecord, QualityFlag, ReadingRecord};
use crate::rng::StreamRng;
use crate::types::round_to;
use chrono::{Datelike, NaiveDateTime, Timelike};

pub struct ReadingSynth<'a> {
    consumption: &'a ConsumptionConfig,
    faults: &'a FaultTable,
    /// Energy scale relative to the 15-minute baselines.
    interval_scale: f64,
    interval_hours: f64,
}

impl<'a> ReadingSynth<'a> {
    pub fn new(consumption: &'a ConsumptionConfig, faults: &'a FaultTable, frequency_minutes: u32) -> Self {
        Self {
            consumption,
            faults,
            interval_scale: f64::from(frequency_minutes) / 15.0,
            interval_hours: f64::from(frequency_minutes) / 60.0,
        }
    }

    /// Expected energy for one interval before faults.
    fn base_energy(&self, meter: &MeterRecord, at: NaiveDateTime, rng: &mut StreamRng) -> f64 {
        let Some(profile) = self.consumption.profile(meter.tariff_category.family()) else {
            return 0.0;
        };
        let (lo, hi) = if self.consumption.is_peak_hour(at.hour()) {
            profile.peak_kwh
        } else {
            profile.base_kwh
        };
        let mut energy = rng.uniform(lo, hi);
        energy *= self.consumption.seasonal[at.month0() as usize];
        if is_weekend(at.date()) {
            energy *= self.consumption.weekend_multiplier;
        }
        energy *= rng.uniform(self.consumption.variation.0, self.consumption.variation.1);
        energy * self.interval_scale
    }

    /// Produce the reading at `at` and advance the meter's cumulative register.
    pub fn next_reading(
        &self,
        meter: &MeterRecord,
        at: NaiveDateTime,
        cumulative: &mut f64,
        rng: &mut StreamRng,
    ) -> ReadingRecord {
        let c = self.consumption;
        let mut energy = self.base_energy(meter, at, rng);
        let mut voltage = rng.gauss(c.voltage.mean, c.voltage.sd);
        let mut frequency = rng.gauss(c.frequency.mean, c.frequency.sd);
        let power_factor = rng.gauss(c.power_factor.mean, c.power_factor.sd);
        let mut temperature = rng.gauss(c.temperature.mean, c.temperature.sd);
        if at.hour() > 12 {
            temperature += c.afternoon_heat_c;
        }
        let mut signal = rng.gauss(c.signal_dbm.mean, c.signal_dbm.sd);
        let mut battery = rng.gauss(c.battery_v.mean, c.battery_v.sd);

        let flag = self.faults.select(rng.next_f64());
        let f = self.faults;
        match flag {
            QualityFlag::MissingReading => {
                return ReadingRecord {
                    timestamp: at,
                    meter_number: meter.meter_number.clone(),
                    consumer_id: meter.consumer_id.clone(),
                    reading_kwh: None,
                    energy_consumed_kwh: None,
                    voltage_v: None,
                    current_a: None,
                    frequency_hz: None,
                    power_factor: None,
                    temperature_c: None,
                    signal_strength_dbm: None,
                    battery_voltage_v: None,
                    data_quality_flag: flag,
                };
            }
            QualityFlag::NegativeReading => energy = -energy,
            QualityFlag::ZeroReading => energy = 0.0,
            QualityFlag::AbnormalSpike => energy *= rng.uniform(f.spike_factor.0, f.spike_factor.1),
            QualityFlag::VoltageSag => voltage = rng.uniform(f.sag_voltage.0, f.sag_voltage.1),
            QualityFlag::FrequencyVariation => {
                frequency = rng.uniform(f.frequency_drift_hz.0, f.frequency_drift_hz.1)
            }
            QualityFlag::SignalDrop => signal = rng.uniform(f.signal_drop_dbm.0, f.signal_drop_dbm.1),
            QualityFlag::BatteryFault => battery = rng.uniform(f.battery_fault_v.0, f.battery_fault_v.1),
            QualityFlag::Normal => {}
        }

        let energy = round_to(energy, 3);
        *cumulative += energy;
        let power_kw = energy / self.interval_hours;
        let current = if voltage.abs() > f64::EPSILON { power_kw * 1000.0 / voltage } else { 0.0 };

        ReadingRecord {
            timestamp: at,
            meter_number: meter.meter_number.clone(),
            consumer_id: meter.consumer_id.clone(),
            reading_kwh: Some(round_to(*cumulative, 3)),
            energy_consumed_kwh: Some(energy),
            voltage_v: Some(round_to(voltage, 1)),
            current_a: Some(round_to(current, 2)),
            frequency_hz: Some(round_to(frequency, 2)),
            power_factor: Some(round_to(power_factor, 3)),
            temperature_c: Some(round_to(temperature, 1)),
            signal_strength_dbm: Some(round_to(signal, 1)),
            battery_voltage_v: Some(round_to(battery, 2)),
            data_quality_flag: flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FaultRule, GeneratorConfig};
    use crate::generator::population::build_population;
    use crate::rng::RngBank;
    use chrono::NaiveDate;

    fn fixture() -> (GeneratorConfig, MeterRecord) {
        let config = GeneratorConfig::default_test();
        let meter = build_population(&config, &RngBank::new(1)).remove(0);
        (config, meter)
    }

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn clean_readings_stay_in_plausible_band() {
        let (config, meter) = fixture();
        let faults = FaultTable::none();
        let synth = ReadingSynth::new(&config.tables.consumption, &faults, 15);
        let (lo, hi) = config
            .tables
            .consumption
            .plausible_band(meter.tariff_category.family(), 1.0)
            .unwrap();
        let mut rng = RngBank::new(2).for_meter(0);
        let mut cumulative = 0.0;
        for hour in 0..24 {
            let r = synth.next_reading(&meter, at(hour), &mut cumulative, &mut rng);
            let e = r.energy_consumed_kwh.unwrap();
            assert!(e >= lo - 1e-3 && e <= hi + 1e-3, "energy {e} outside [{lo}, {hi}]");
            assert_eq!(r.data_quality_flag, QualityFlag::Normal);
        }
    }

    #[test]
    fn missing_rows_carry_no_values_and_hold_the_register() {
        let (config, meter) = fixture();
        let faults = FaultTable {
            rules: vec![FaultRule { fault: QualityFlag::MissingReading, probability: 1.0 }],
            ..FaultTable::default()
        };
        let synth = ReadingSynth::new(&config.tables.consumption, &faults, 60);
        let mut rng = RngBank::new(2).for_meter(0);
        let mut cumulative = 12.5;
        let r = synth.next_reading(&meter, at(9), &mut cumulative, &mut rng);
        assert_eq!(r.data_quality_flag, QualityFlag::MissingReading);
        assert!(r.energy_consumed_kwh.is_none() && r.voltage_v.is_none() && r.reading_kwh.is_none());
        assert_eq!(cumulative, 12.5);
    }

    #[test]
    fn negative_fault_lowers_the_register() {
        let (config, meter) = fixture();
        let faults = FaultTable {
            rules: vec![FaultRule { fault: QualityFlag::NegativeReading, probability: 1.0 }],
            ..FaultTable::default()
        };
        let synth = ReadingSynth::new(&config.tables.consumption, &faults, 60);
        let mut rng = RngBank::new(2).for_meter(0);
        let mut cumulative = 100.0;
        let r = synth.next_reading(&meter, at(3), &mut cumulative, &mut rng);
        assert!(r.energy_consumed_kwh.unwrap() < 0.0);
        assert!(cumulative < 100.0);
    }
}
