use serde::Serialize;
use std::collections::BTreeMap;

use crate::climate::meteostat_client::MonthlyRecord;

/// Climate values for one calendar month; `None` when no station reported it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClimateMonth {
    pub tavg: Option<f64>,
    pub prcp: Option<f64>,
}

/// Calendar month (1-12) to climate values, averaged across stations and years
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimateSeries {
    months: BTreeMap<u32, ClimateMonth>,
}

#[derive(Default)]
struct Accumulator {
    tavg_sum: f64,
    tavg_count: u32,
    prcp_sum: f64,
    prcp_count: u32,
}

impl Accumulator {
    fn add(&mut self, record: &MonthlyRecord) {
        if let Some(tavg) = record.tavg {
            self.tavg_sum += tavg;
            self.tavg_count += 1;
        }
        if let Some(prcp) = record.prcp {
            self.prcp_sum += prcp;
            self.prcp_count += 1;
        }
    }

    fn mean(&self) -> ClimateMonth {
        ClimateMonth {
            tavg: (self.tavg_count > 0).then(|| self.tavg_sum / f64::from(self.tavg_count)),
            prcp: (self.prcp_count > 0).then(|| self.prcp_sum / f64::from(self.prcp_count)),
        }
    }
}

impl ClimateSeries {
    /// Reindexes every station's rows by calendar month and averages per month.
    ///
    /// Missing values are left out of the mean rather than counted as zero. A
    /// month shows up when at least one station has a row for it.
    pub fn average_by_month(stations: &[Vec<MonthlyRecord>]) -> Self {
        let mut accumulators: BTreeMap<u32, Accumulator> = BTreeMap::new();

        for record in stations.iter().flatten() {
            if !(1..=12).contains(&record.month) {
                continue;
            }
            accumulators.entry(record.month).or_default().add(record);
        }

        Self {
            months: accumulators
                .into_iter()
                .map(|(month, acc)| (month, acc.mean()))
                .collect(),
        }
    }

    pub fn from_months(months: impl IntoIterator<Item = (u32, ClimateMonth)>) -> Self {
        Self {
            months: months.into_iter().collect(),
        }
    }

    pub fn get(&self, month: u32) -> Option<&ClimateMonth> {
        self.months.get(&month)
    }

    pub fn months(&self) -> impl Iterator<Item = (u32, &ClimateMonth)> {
        self.months.iter().map(|(month, values)| (*month, values))
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }
}
