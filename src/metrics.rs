use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{DelinquencyRecord, MetricsRow, SalespersonMetrics, SummaryStats, TitleRow};
use crate::util::{format_brl, format_int, format_percent, report_period, round2, DelinquencyBand};

/// `open / total * 100`, or `None` when nothing was invoiced or the ratio
/// does not fit a decimal.
pub fn delinquency_percent(open: Decimal, total: Decimal) -> Option<Decimal> {
    if total.is_zero() {
        return None;
    }
    open.checked_div(total)?.checked_mul(dec!(100)).map(round2)
}

/// Group by unified identity and compute per-salesperson figures, sorted
/// by mean overdue days ascending. Ties keep first-encounter order.
pub fn aggregate(records: &[DelinquencyRecord]) -> Vec<SalespersonMetrics> {
    #[derive(Default)]
    struct Acc {
        code: String,
        name: String,
        total: Decimal,
        paid: Decimal,
        days: i64,
        count: usize,
    }

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Acc> = Vec::new();
    for r in records {
        let key = (
            r.unified_salesperson_code.as_str(),
            r.unified_salesperson_name.as_str(),
        );
        let idx = *index.entry(key).or_insert_with(|| {
            groups.push(Acc {
                code: r.unified_salesperson_code.clone(),
                name: r.unified_salesperson_name.clone(),
                ..Acc::default()
            });
            groups.len() - 1
        });
        let e = &mut groups[idx];
        e.total += r.invoice_value;
        e.paid += r.paid_value;
        e.days += r.overdue_days;
        e.count += 1;
    }

    let mut rows: Vec<SalespersonMetrics> = groups
        .into_iter()
        .map(|acc| {
            let total = round2(acc.total);
            let paid = round2(acc.paid);
            let open = total - paid;
            SalespersonMetrics {
                unified_salesperson_code: acc.code,
                unified_salesperson_name: acc.name,
                total_delinquent_value: total,
                title_count: acc.count,
                total_paid_value: paid,
                mean_overdue_days: round2(Decimal::from(acc.days) / Decimal::from(acc.count)),
                open_value: open,
                delinquency_percent: delinquency_percent(open, total),
            }
        })
        .collect();

    // `sort_by` is stable, so equal means stay in encounter order.
    rows.sort_by(|a, b| a.mean_overdue_days.cmp(&b.mean_overdue_days));
    rows
}

/// Records of one salesperson, matched on unified or raw code.
pub fn records_for_salesperson<'a>(
    records: &'a [DelinquencyRecord],
    code: &str,
) -> Vec<&'a DelinquencyRecord> {
    let code = code.trim();
    records
        .iter()
        .filter(|r| r.unified_salesperson_code == code || r.salesperson_code == code)
        .collect()
}

pub fn generate_summary(records: &[DelinquencyRecord], today: NaiveDate) -> SummaryStats {
    let salespeople: HashSet<&str> = records
        .iter()
        .map(|r| r.unified_salesperson_code.as_str())
        .collect();
    let clients: HashSet<&str> = records.iter().map(|r| r.client_code.as_str()).collect();
    let total: Decimal = records.iter().map(|r| r.invoice_value).sum();
    let paid: Decimal = records.iter().map(|r| r.paid_value).sum();
    let days: i64 = records.iter().map(|r| r.overdue_days).sum();
    let mean_overdue_days = if records.is_empty() {
        Decimal::ZERO
    } else {
        round2(Decimal::from(days) / Decimal::from(records.len()))
    };
    let total = round2(total);
    let paid = round2(paid);
    SummaryStats {
        period: report_period(today),
        total_titles: records.len(),
        total_salespeople: salespeople.len(),
        total_clients: clients.len(),
        total_delinquent_value: total,
        total_paid_value: paid,
        total_open_value: total - paid,
        delinquency_percent: delinquency_percent(total - paid, total),
        mean_overdue_days,
    }
}

pub fn metrics_rows(metrics: &[SalespersonMetrics]) -> Vec<MetricsRow> {
    metrics
        .iter()
        .map(|m| {
            let band = DelinquencyBand::from_percent(m.delinquency_percent);
            MetricsRow {
                code: m.unified_salesperson_code.clone(),
                name: m.unified_salesperson_name.clone(),
                titles: format_int(m.title_count),
                total: format_brl(m.total_delinquent_value),
                paid: format_brl(m.total_paid_value),
                open: format_brl(m.open_value),
                mean_days: format!("{:.2}", m.mean_overdue_days),
                percent: format_percent(m.delinquency_percent),
                band: band.label().to_string(),
                color: band.color().to_string(),
            }
        })
        .collect()
}

pub fn title_rows(records: &[&DelinquencyRecord]) -> Vec<TitleRow> {
    records
        .iter()
        .map(|r| TitleRow {
            client_code: r.client_code.clone(),
            client_name: r.client_name.clone(),
            value: format_brl(r.invoice_value),
            paid: format_brl(r.paid_value),
            overdue_days: r.overdue_days,
            due_date: r.due_date.clone(),
            status: r.title_status.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(code: &str, value: Decimal, paid: Decimal, days: i64) -> DelinquencyRecord {
        DelinquencyRecord {
            salesperson_code: code.to_string(),
            salesperson_name: format!("Name {code}"),
            unified_salesperson_code: code.to_string(),
            unified_salesperson_name: format!("Name {code}"),
            client_code: format!("C{days}"),
            client_name: "Client".to_string(),
            invoice_value: value,
            paid_value: paid,
            overdue_days: days,
            due_date: String::new(),
            payment_date: None,
            title_status: "OPEN".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn group_arithmetic() {
        let rows = aggregate(&[
            record("1", dec!(100), dec!(50), 10),
            record("1", dec!(200), dec!(0), 20),
        ]);
        assert_eq!(rows.len(), 1);
        let m = &rows[0];
        assert_eq!(m.total_delinquent_value, dec!(300));
        assert_eq!(m.title_count, 2);
        assert_eq!(m.total_paid_value, dec!(50));
        assert_eq!(m.open_value, dec!(250));
        assert_eq!(m.delinquency_percent, Some(dec!(83.33)));
        assert_eq!(m.mean_overdue_days, dec!(15));
    }

    #[test]
    fn zero_total_has_no_percentage() {
        let rows = aggregate(&[
            record("1", dec!(0), dec!(0), 3),
            record("1", dec!(0), dec!(0), 4),
        ]);
        assert_eq!(rows[0].delinquency_percent, None);
        assert_eq!(rows[0].open_value, dec!(0));
    }

    #[test]
    fn sorted_by_mean_overdue_days() {
        let rows = aggregate(&[
            record("a", dec!(1), dec!(0), 30),
            record("b", dec!(1), dec!(0), 5),
            record("c", dec!(1), dec!(0), 20),
        ]);
        let means: Vec<Decimal> = rows.iter().map(|r| r.mean_overdue_days).collect();
        assert_eq!(means, vec![dec!(5), dec!(20), dec!(30)]);
    }

    #[test]
    fn ties_keep_encounter_order() {
        let rows = aggregate(&[
            record("z", dec!(1), dec!(0), 7),
            record("a", dec!(1), dec!(0), 7),
            record("m", dec!(1), dec!(0), 1),
        ]);
        let codes: Vec<&str> = rows.iter().map(|r| r.unified_salesperson_code.as_str()).collect();
        assert_eq!(codes, vec!["m", "z", "a"]);
    }

    #[test]
    fn mean_rounds_half_to_even() {
        let mut records = vec![record("1", dec!(1), dec!(0), 1)];
        records.extend((0..7).map(|_| record("1", dec!(1), dec!(0), 0)));
        // 1 / 8 = 0.125
        assert_eq!(aggregate(&records)[0].mean_overdue_days, dec!(0.12));
    }

    #[test]
    fn same_code_different_unified_name_is_a_separate_group() {
        let mut other = record("1", dec!(10), dec!(0), 1);
        other.unified_salesperson_name = "Someone else".to_string();
        let rows = aggregate(&[record("1", dec!(10), dec!(0), 1), other]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unrepresentable_ratio_has_no_percentage() {
        assert_eq!(delinquency_percent(Decimal::MAX, dec!(0.01)), None);
        assert_eq!(delinquency_percent(dec!(1), dec!(3)), Some(dec!(33.33)));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        assert!(aggregate(&[]).is_empty());
        let summary = generate_summary(&[], NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(summary.total_titles, 0);
        assert_eq!(summary.delinquency_percent, None);
    }

    #[test]
    fn filter_matches_unified_or_raw_code() {
        let mut merged = record("102", dec!(5), dec!(0), 2);
        merged.unified_salesperson_code = "101".to_string();
        let records = vec![record("101", dec!(1), dec!(0), 1), merged, record("7", dec!(1), dec!(0), 1)];
        assert_eq!(records_for_salesperson(&records, "101").len(), 2);
        assert_eq!(records_for_salesperson(&records, " 102 ").len(), 1);
        assert!(records_for_salesperson(&records, "404").is_empty());
    }

    #[test]
    fn summary_totals() {
        let records = vec![
            record("1", dec!(100), dec!(50), 10),
            record("2", dec!(300), dec!(0), 20),
        ];
        let summary = generate_summary(&records, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(summary.total_salespeople, 2);
        assert_eq!(summary.total_clients, 2);
        assert_eq!(summary.total_open_value, dec!(350));
        assert_eq!(summary.delinquency_percent, Some(dec!(87.50)));
        assert_eq!(summary.mean_overdue_days, dec!(15));
    }

    #[test]
    fn display_rows_are_formatted() {
        let rows = metrics_rows(&aggregate(&[record("1", dec!(1000), dec!(0), 3)]));
        assert_eq!(rows[0].total, "R$ 1.000,00");
        assert_eq!(rows[0].percent, "100.00%");
        assert_eq!(rows[0].band, "critical");
        assert_eq!(rows[0].color, "#FF0000");
        assert_eq!(rows[0].mean_days, "3.00");
    }
}
