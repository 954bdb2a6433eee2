//! Text exposition rendering.
//!
//! Emits `# HELP` / `# TYPE` headers followed by one line per series for
//! counters and gauges, or cumulative `_bucket` lines, `_count` and `_sum` for
//! histograms. Each metric block ends with a blank line.

use super::{Family, SeriesValue};
use crate::models::{HistogramData, LabelSet, MetricDefinition};
use std::fmt::Write;

pub(super) fn render(service: &str, families: &[Family]) -> String {
    let mut out = String::new();
    for family in families {
        write_family(&mut out, service, family);
    }
    out
}

fn write_family(out: &mut String, service: &str, family: &Family) {
    let def = &family.definition;
    let name = format!("{}_{}", def.name, service);

    let _ = writeln!(out, "# HELP {name} {}", def.help);
    let _ = writeln!(out, "# TYPE {name} {}", def.metric_type);

    for series in &family.series {
        let labels = ordered_labels(def, &series.labels);
        match &series.value {
            SeriesValue::Scalar(value) => {
                let _ = writeln!(out, "{name}{} {value}", format_labels(&labels, None));
            }
            SeriesValue::Samples(samples) => {
                let data = HistogramData::from_samples(&def.buckets, samples);
                for bucket in &data.buckets {
                    let le = bucket.upper_bound.to_string();
                    let _ = writeln!(
                        out,
                        "{name}_bucket{} {}",
                        format_labels(&labels, Some(&le)),
                        bucket.count
                    );
                }
                let _ = writeln!(
                    out,
                    "{name}_bucket{} {}",
                    format_labels(&labels, Some("+Inf")),
                    data.count
                );
                let plain = format_labels(&labels, None);
                let _ = writeln!(out, "{name}_count{plain} {}", data.count);
                let _ = writeln!(out, "{name}_sum{plain} {}", data.sum);
            }
        }
    }

    out.push('\n');
}

/// Orders a series' labels by the definition's declared label order.
fn ordered_labels<'a>(def: &'a MetricDefinition, labels: &'a LabelSet) -> Vec<(&'a str, &'a str)> {
    def.label_names
        .iter()
        .filter_map(|name| labels.get(name).map(|value| (name.as_str(), value)))
        .collect()
}

fn format_labels(labels: &[(&str, &str)], le: Option<&str>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{le}\""));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}
